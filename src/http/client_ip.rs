//! Client address resolution.

use std::net::SocketAddr;

use axum::http::HeaderMap;

/// Forwarding headers consulted in order when the proxy is trusted.
const FORWARD_HEADERS: [&str; 3] = ["cf-connecting-ip", "true-client-ip", "x-forwarded-for"];

/// Resolve the caller's address.
///
/// With `trust_proxy` set, the first populated forwarding header wins
/// (first hop only for X-Forwarded-For); otherwise the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr, trust_proxy: bool) -> String {
    if trust_proxy {
        for name in FORWARD_HEADERS {
            if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
                let first = value.split(',').next().unwrap_or("").trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
    }
    peer.ip().to_string()
}

/// Display label for the requesting device: the X-Device-Name header
/// when present, else the leading User-Agent product token.
pub fn device_label(headers: &HeaderMap) -> String {
    if let Some(name) = headers.get("x-device-name").and_then(|v| v.to_str().ok()) {
        let name = name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
    }

    headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .and_then(|ua| ua.split_whitespace().next())
        .filter(|token| !token.is_empty())
        .unwrap_or("unknown")
        .to_string()
}
