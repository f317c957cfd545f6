//! Client address resolution from proxy headers.

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Placeholder used when no address can be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Resolve the client address: first `X-Forwarded-For` entry, then
/// `X-Real-IP`, then the peer address, else `"unknown"`.
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    header_str(headers, X_FORWARDED_FOR)
        .and_then(|list| list.split(',').map(str::trim).find(|entry| !entry.is_empty()))
        .or_else(|| header_str(headers, X_REAL_IP))
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Every address claimed by the forwarding headers.
pub fn forwarded_addresses(headers: &HeaderMap) -> Vec<&str> {
    let mut addresses: Vec<&str> = header_str(headers, X_FORWARDED_FOR)
        .map(|list| list.split(',').map(str::trim).filter(|e| !e.is_empty()).collect())
        .unwrap_or_default();
    if let Some(real_ip) = header_str(headers, X_REAL_IP) {
        addresses.push(real_ip);
    }
    addresses
}

/// Whether a forwarded address is loopback, private, link-local,
/// unspecified or not an address at all.
///
/// Deployments behind a proxy on a private network legitimately forward
/// private addresses and will trip this check.
pub fn is_suspicious_address(value: &str) -> bool {
    let ip: IpAddr = match value.parse() {
        Ok(ip) => ip,
        Err(_) => return true,
    };
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified() || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_suspicious_address(&mapped.to_string());
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00 // unique local
                || (first & 0xffc0) == 0xfe80 // link local
        }
    }
}
