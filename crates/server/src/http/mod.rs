pub mod error;
pub mod handlers;
pub mod router;

use crate::state::AppState;
use axum::http::{header, HeaderMap};

/// The admin email carried by a valid, unexpired bearer token, or None.
pub(crate) fn bearer_admin_email(state: &AppState, headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;
    let claims = state.tokens.verify(token)?;
    if state.admins.is_admin(&claims.email) {
        Some(claims.email)
    } else {
        None
    }
}

/// Client IP for rate limiting and moderation. Trusts the proxy headers the
/// deployment sits behind, falling back to loopback.
pub(crate) fn client_ip(headers: &HeaderMap) -> String {
    if let Some(ip) = headers.get("cf-connecting-ip").and_then(|v| v.to_str().ok()) {
        return ip.trim().to_string();
    }
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    "127.0.0.1".to_string()
}
