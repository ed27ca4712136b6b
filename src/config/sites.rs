//! Monitored site registry
//!
//! The registry is built once at startup from the JSON site document and is
//! read-only afterwards. It answers two questions for every inbound request:
//! which site (if any) the request belongs to, and whether the caller address
//! falls inside one of the suppressed networks.
//!
//! Site declaration order matters: the first site with a matching allowed
//! origin wins.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not load site configuration: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("could not parse ignored network {net}: {source}")]
    InvalidIgnoreNet {
        net: String,
        #[source]
        source: ipnet::AddrParseError,
    },
    #[error("site #{index} has an empty host")]
    EmptyHost { index: usize },
    #[error("site {host} lists an empty allowed origin")]
    EmptyOrigin { host: String },
    #[error("site {host} lists an empty allowed referer")]
    EmptyReferer { host: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredSite {
    /// Canonical host used as the `site` label and storage key
    pub host: String,

    /// Origin prefixes accepted for CORS requests
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Exact Referer values accepted from clients that send no Origin
    #[serde(default)]
    pub allowed_referers: Vec<String>,

    /// Recipients for contact form submissions
    #[serde(default)]
    pub contacts: Vec<String>,
}

impl MonitoredSite {
    pub fn new(host: impl Into<String>, allowed_origins: &[&str]) -> Self {
        Self {
            host: host.into(),
            allowed_origins: allowed_origins.iter().map(|o| o.to_string()).collect(),
            allowed_referers: Vec::new(),
            contacts: Vec::new(),
        }
    }

    pub fn with_referers(mut self, referers: &[&str]) -> Self {
        self.allowed_referers = referers.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_contacts(mut self, contacts: &[&str]) -> Self {
        self.contacts = contacts.iter().map(|c| c.to_string()).collect();
        self
    }

    fn accepts_origin(&self, origin: &str) -> bool {
        self.allowed_origins
            .iter()
            .any(|allowed| origin.starts_with(allowed.as_str()))
    }

    fn accepts_referer(&self, referer: &str) -> bool {
        self.allowed_referers.iter().any(|allowed| allowed == referer)
    }
}

/// Shape of the site document on disk
#[derive(Debug, Deserialize)]
struct SiteDocument {
    #[serde(default)]
    database_url: Option<String>,
    #[serde(default)]
    sites: Vec<MonitoredSite>,
    #[serde(default)]
    ignore_nets: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SiteRegistry {
    sites: Vec<MonitoredSite>,
    ignored_nets: Vec<IpNet>,
    database_url: Option<String>,
}

impl SiteRegistry {
    /// Load the registry from a JSON document.
    ///
    /// Scalar keys can be overridden from the environment with a `BEACON_`
    /// prefix (e.g. `BEACON_DATABASE_URL`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_string_lossy().into_owned();
        let document: SiteDocument = ::config::Config::builder()
            .add_source(::config::File::new(&path, ::config::FileFormat::Json))
            .add_source(::config::Environment::with_prefix("BEACON"))
            .build()?
            .try_deserialize()?;

        let mut registry = Self::new(document.sites, &document.ignore_nets)?;
        registry.database_url = document.database_url.filter(|url| !url.is_empty());
        Ok(registry)
    }

    /// Build a registry from already-parsed sites and CIDR strings.
    pub fn new<S: AsRef<str>>(
        sites: Vec<MonitoredSite>,
        ignore_nets: &[S],
    ) -> Result<Self, ConfigError> {
        for (index, site) in sites.iter().enumerate() {
            if site.host.is_empty() {
                return Err(ConfigError::EmptyHost { index });
            }
            if site.allowed_origins.iter().any(|o| o.is_empty()) {
                return Err(ConfigError::EmptyOrigin {
                    host: site.host.clone(),
                });
            }
            if site.allowed_referers.iter().any(|r| r.is_empty()) {
                return Err(ConfigError::EmptyReferer {
                    host: site.host.clone(),
                });
            }
        }

        let ignored_nets = ignore_nets
            .iter()
            .map(|net| {
                let net = net.as_ref().trim();
                net.parse::<IpNet>()
                    .map_err(|source| ConfigError::InvalidIgnoreNet {
                        net: net.to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            sites,
            ignored_nets,
            database_url: None,
        })
    }

    pub fn sites(&self) -> &[MonitoredSite] {
        &self.sites
    }

    pub fn ignored_nets(&self) -> &[IpNet] {
        &self.ignored_nets
    }

    pub fn database_url(&self) -> Option<&str> {
        self.database_url.as_deref()
    }

    /// Look up a site by its canonical host
    pub fn site(&self, host: &str) -> Option<&MonitoredSite> {
        self.sites.iter().find(|site| site.host == host)
    }

    /// First site (in declaration order) whose allowed origin prefixes `origin`
    pub fn site_for_origin(&self, origin: &str) -> Option<&MonitoredSite> {
        if origin.is_empty() {
            return None;
        }
        self.sites.iter().find(|site| site.accepts_origin(origin))
    }

    /// First site (in declaration order) listing `referer` verbatim
    pub fn site_for_referer(&self, referer: &str) -> Option<&MonitoredSite> {
        if referer.is_empty() {
            return None;
        }
        self.sites.iter().find(|site| site.accepts_referer(referer))
    }

    /// Whether the caller address falls in a suppressed network.
    ///
    /// Anything that does not parse as an IP address is never suppressed.
    pub fn is_ignored_ip(&self, ip: &str) -> bool {
        let Ok(addr) = ip.trim().parse::<IpAddr>() else {
            return false;
        };

        // IPv4-mapped IPv6 addresses are checked against IPv4 ranges too
        let mapped = match addr {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4),
            IpAddr::V4(_) => None,
        };

        self.ignored_nets.iter().any(|net| {
            net.contains(&addr) || mapped.map(|v4| net.contains(&v4)).unwrap_or(false)
        })
    }
}
