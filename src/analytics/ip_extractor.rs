//! Caller IP resolution
//!
//! The collector normally runs behind a proxy that reports the real client
//! address in a dedicated header (`Fly-Client-IP` by default). That header
//! is trusted verbatim when present; otherwise the socket peer address is
//! used. When neither is available the caller IP is empty, which never
//! matches a suppression range.

use axum::extract::ConnectInfo;
use axum::http::{Extensions, HeaderMap};
use std::net::SocketAddr;

/// Resolve the caller IP for a request
///
/// # Arguments
/// * `headers` - HTTP request headers
/// * `socket_addr` - The socket remote address, when the listener recorded it
/// * `trusted_header` - Name of the proxy-supplied client IP header
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: Option<SocketAddr>,
    trusted_header: &str,
) -> String {
    if let Some(ip) = extract_header_ip(headers, trusted_header) {
        return ip;
    }

    socket_addr
        .map(|addr| addr.ip().to_string())
        .unwrap_or_default()
}

/// Socket peer address recorded by `into_make_service_with_connect_info`
pub fn socket_addr(extensions: &Extensions) -> Option<SocketAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

fn extract_header_ip(headers: &HeaderMap, trusted_header: &str) -> Option<String> {
    headers
        .get(trusted_header)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}
