//! Request classification
//!
//! Every request on the public listener is first attributed to a monitored
//! site. CORS requests are matched by Origin prefix; requests without an
//! Origin (plain beacons from older clients) fall back to an exact Referer
//! match. Unknown callers get a 404 and no CORS headers, so browsers refuse
//! to expose the response.

use axum::{
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
            ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_HEADERS, ORIGIN, REFERER,
        },
        HeaderMap, HeaderValue, Method,
    },
    response::{IntoResponseParts, ResponseParts},
};
use std::convert::Infallible;
use tracing::warn;

use super::rejection::IngestRejection;
use crate::config::{MonitoredSite, SiteRegistry};

/// CORS response headers negotiated from the request
#[derive(Debug, Clone)]
pub struct CorsHeaders {
    allow_origin: HeaderValue,
    allow_headers: HeaderValue,
}

impl CorsHeaders {
    /// Echo the caller's Origin and requested headers, or `*` when absent
    pub fn from_request(headers: &HeaderMap) -> Self {
        let wildcard = HeaderValue::from_static("*");
        Self {
            allow_origin: non_empty(headers.get(ORIGIN)).unwrap_or_else(|| wildcard.clone()),
            allow_headers: non_empty(headers.get(ACCESS_CONTROL_REQUEST_HEADERS))
                .unwrap_or(wildcard),
        }
    }
}

impl IntoResponseParts for CorsHeaders {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        let headers = res.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin);
        headers.insert(
            ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers);
        Ok(res)
    }
}

fn non_empty(value: Option<&HeaderValue>) -> Option<HeaderValue> {
    value.filter(|v| !v.is_empty()).cloned()
}

/// A request attributed to a monitored site
#[derive(Debug, Clone)]
pub struct Classified<'a> {
    pub site: &'a MonitoredSite,
    /// Origin the site was resolved from (the Referer in legacy mode)
    pub origin: String,
    pub cors: CorsHeaders,
    /// CORS preflight: answer with headers only, run nothing else
    pub preflight: bool,
}

/// Resolve the site a request belongs to.
///
/// Fails with [`IngestRejection::UnknownOrigin`] when neither the Origin
/// prefix nor the legacy Referer match any configured site.
pub fn classify<'a>(
    registry: &'a SiteRegistry,
    method: &Method,
    headers: &HeaderMap,
) -> Result<Classified<'a>, IngestRejection> {
    // A present Origin that is not valid text never falls back to legacy mode
    let origin = match headers.get(ORIGIN) {
        None => "",
        Some(value) => match value.to_str() {
            Ok(origin) => origin,
            Err(_) => {
                let origin = String::from_utf8_lossy(value.as_bytes()).into_owned();
                warn!(origin = %origin, "Ignoring request with malformed origin");
                return Err(IngestRejection::UnknownOrigin(origin));
            }
        },
    };

    let resolved = if origin.is_empty() {
        let referer = header_str(headers, REFERER.as_str()).unwrap_or_default();
        registry
            .site_for_referer(referer)
            .map(|site| (site, referer))
    } else {
        registry.site_for_origin(origin).map(|site| (site, origin))
    };

    let Some((site, origin)) = resolved else {
        warn!(origin = %origin, "Ignoring request from unknown origin");
        return Err(IngestRejection::UnknownOrigin(origin.to_string()));
    };

    Ok(Classified {
        site,
        origin: origin.to_string(),
        cors: CorsHeaders::from_request(headers),
        preflight: *method == Method::OPTIONS,
    })
}

/// Header value as UTF-8 text, if present and valid
pub fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
