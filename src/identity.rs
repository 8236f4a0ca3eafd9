//! Client identity normalization.
//!
//! # Responsibilities
//! - Canonicalize raw client addresses into comparable identity keys
//! - Reject loopback and malformed input
//! - Widen IPv6 addresses to their /64 routing prefix
//!
//! # Design Decisions
//! - Widening is string-based on colon groups, so an already-widened
//!   prefix normalizes to itself (normalization is idempotent)
//! - IPv6 is widened to /64 because residential ISPs rotate the low
//!   64 bits; a host-exact grant would go stale within hours

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde::Serialize;
use thiserror::Error;

/// Normalized identity key for a client address.
///
/// Once constructed the inner string never changes; it is used as the
/// join key across the failure, ban, and liveness maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rejection reasons for raw client addresses.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("empty address")]
    Empty,

    #[error("loopback address is not a valid grant target")]
    Loopback,

    #[error("malformed address: {0}")]
    Malformed(String),
}

/// Normalize a raw client address into a [`ClientIdentity`].
///
/// IPv4 addresses pass through unchanged. IPv6 addresses with more than
/// four colon groups are collapsed to their /64 prefix; shorter forms
/// (including already-widened `a:b:c:d::/64` keys) pass through.
pub fn normalize(raw: &str) -> Result<ClientIdentity, IdentityError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(IdentityError::Empty);
    }

    if let Ok(addr) = raw.parse::<IpAddr>() {
        if addr.is_loopback() {
            return Err(IdentityError::Loopback);
        }
    }

    if raw.contains(':') {
        normalize_v6(raw)
    } else {
        raw.parse::<Ipv4Addr>()
            .map_err(|_| IdentityError::Malformed(raw.to_string()))?;
        Ok(ClientIdentity(raw.to_string()))
    }
}

fn normalize_v6(raw: &str) -> Result<ClientIdentity, IdentityError> {
    let groups: Vec<&str> = raw.split(':').collect();

    if groups.len() > 4 {
        let mut quads = Vec::with_capacity(4);
        for group in &groups[..4] {
            if !valid_quad(group, false) {
                return Err(IdentityError::Malformed(raw.to_string()));
            }
            quads.push(if group.is_empty() { "0" } else { *group });
        }
        return Ok(ClientIdentity(format!(
            "{}:{}:{}:{}::/64",
            quads[0], quads[1], quads[2], quads[3]
        )));
    }

    // Short IPv6 forms (incl. IPv4-mapped) pass through when they parse.
    if raw.parse::<Ipv6Addr>().is_ok() {
        return Ok(ClientIdentity(raw.to_string()));
    }

    // Remaining legal shape: a /64-or-shorter prefix such as "2001:db8::/64".
    for (i, group) in groups.iter().enumerate() {
        if !valid_quad(group, i == groups.len() - 1) {
            return Err(IdentityError::Malformed(raw.to_string()));
        }
    }
    Ok(ClientIdentity(raw.to_string()))
}

/// A colon group: empty or 1-4 hex digits, with an optional `/len`
/// suffix permitted only on the final group.
fn valid_quad(group: &str, allow_prefix_len: bool) -> bool {
    let head = match group.split_once('/') {
        Some((head, len)) => {
            if !allow_prefix_len || len.is_empty() || !len.bytes().all(|b| b.is_ascii_digit()) {
                return false;
            }
            head
        }
        None => group,
    };
    head.len() <= 4 && head.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_passes_through() {
        assert_eq!(normalize("10.0.0.5").unwrap().as_str(), "10.0.0.5");
        assert_eq!(normalize("  203.0.113.9 ").unwrap().as_str(), "203.0.113.9");
    }

    #[test]
    fn test_loopback_rejected() {
        assert_eq!(normalize("127.0.0.1"), Err(IdentityError::Loopback));
        assert_eq!(normalize("::1"), Err(IdentityError::Loopback));
        // Expanded loopback still parses to ::1.
        assert_eq!(
            normalize("0:0:0:0:0:0:0:1"),
            Err(IdentityError::Loopback)
        );
    }

    #[test]
    fn test_malformed_rejected() {
        assert_eq!(normalize(""), Err(IdentityError::Empty));
        assert_eq!(normalize("   "), Err(IdentityError::Empty));
        assert!(matches!(normalize("not-an-ip"), Err(IdentityError::Malformed(_))));
        assert!(matches!(normalize("999.1.1.1"), Err(IdentityError::Malformed(_))));
        assert!(matches!(
            normalize("zzzz:db8:0:0:1:2:3:4"),
            Err(IdentityError::Malformed(_))
        ));
    }

    #[test]
    fn test_ipv6_widened_to_64() {
        assert_eq!(
            normalize("2001:db8:0:0:1:2:3:4").unwrap().as_str(),
            "2001:db8:0:0::/64"
        );
        // Empty groups in the prefix become "0".
        assert_eq!(
            normalize("2001:db8::1:2:3:4").unwrap().as_str(),
            "2001:db8:0:1::/64"
        );
    }

    #[test]
    fn test_short_ipv6_passes_through() {
        assert_eq!(normalize("2001:db8::").unwrap().as_str(), "2001:db8::");
        assert_eq!(
            normalize("::ffff:10.0.0.5").unwrap().as_str(),
            "::ffff:10.0.0.5"
        );
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let first = normalize("2001:db8:aa:bb:1:2:3:4").unwrap();
        let second = normalize(first.as_str()).unwrap();
        assert_eq!(first, second);

        let prefix = normalize("2001:db8::/64").unwrap();
        assert_eq!(prefix.as_str(), "2001:db8::/64");
    }
}
