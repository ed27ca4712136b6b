pub mod sites;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub use sites::{ConfigError, MonitoredSite, SiteRegistry};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path of the JSON site document (sites, ignored networks, database)
    pub site_config_path: String,
    pub public_server: ServerConfig,
    pub admin_server: ServerConfig,
    pub ingest: IngestConfig,
    pub contact: ContactConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Header set by the fronting proxy with the real caller address
    pub client_ip_header: String,
    pub max_body_bytes: usize,
}

impl IngestConfig {
    const DEFAULT_CLIENT_IP_HEADER: &'static str = "fly-client-ip";
    const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            client_ip_header: Self::DEFAULT_CLIENT_IP_HEADER.to_string(),
            max_body_bytes: Self::DEFAULT_MAX_BODY_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactConfig {
    /// Sender address used for contact form notifications
    pub from_address: String,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            from_address: "web-contact@localhost".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let site_config_path =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.json".to_string());

        let public_host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let public_port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let admin_host = std::env::var("ADMIN_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let admin_port = std::env::var("ADMIN_PORT")
            .unwrap_or_else(|_| "9090".to_string())
            .parse::<u16>()
            .context("ADMIN_PORT must be a valid port number")?;

        let client_ip_header = std::env::var("CLIENT_IP_HEADER")
            .map(|v| v.trim().to_lowercase())
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| IngestConfig::DEFAULT_CLIENT_IP_HEADER.to_string());

        let max_body_bytes = match std::env::var("MAX_BODY_BYTES") {
            Ok(v) => v
                .parse::<usize>()
                .context("MAX_BODY_BYTES must be a byte count")?,
            Err(_) => IngestConfig::DEFAULT_MAX_BODY_BYTES,
        };

        let contact = match std::env::var("CONTACT_FROM") {
            Ok(from_address) if !from_address.is_empty() => ContactConfig { from_address },
            _ => ContactConfig::default(),
        };

        Ok(Config {
            site_config_path,
            public_server: ServerConfig {
                host: public_host,
                port: public_port,
            },
            admin_server: ServerConfig {
                host: admin_host,
                port: admin_port,
            },
            ingest: IngestConfig {
                client_ip_header,
                max_body_bytes,
            },
            contact,
        })
    }
}
