//! Credential extraction from request headers.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use base64::prelude::{Engine, BASE64_STANDARD};

use crate::admission::Credential;

/// Parse the Authorization header into a [`Credential`].
///
/// A header that is absent, uses an unknown scheme, or carries
/// undecodable basic-auth payload reads as `Missing`, which lets the
/// gate decide between prompting and counting a failure.
pub fn extract_credential(headers: &HeaderMap) -> Credential {
    let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return Credential::Missing;
    };

    if let Some(token) = value.strip_prefix("Bearer ") {
        return Credential::Bearer(token.trim().to_string());
    }

    if let Some(encoded) = value.strip_prefix("Basic ") {
        if let Ok(decoded) = BASE64_STANDARD.decode(encoded.trim()) {
            if let Ok(text) = String::from_utf8(decoded) {
                if let Some((user, password)) = text.split_once(':') {
                    return Credential::Basic {
                        user: user.to_string(),
                        password: password.to_string(),
                    };
                }
            }
        }
    }

    Credential::Missing
}
