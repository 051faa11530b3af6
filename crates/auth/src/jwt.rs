//! Expiry inspection for JWT access tokens.
//!
//! Only the `exp` claim is read, for scheduling refreshes. Signatures are
//! never checked here; the server remains the authority on token validity.

use std::time::Duration;

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde::Deserialize;

/// Tokens are refreshed this long before they actually expire.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(300);

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: f64,
}

/// Decodes the `exp` claim (seconds since the epoch) from a token's payload.
///
/// Only the second dot-separated segment is read. Returns `None` when there
/// is no such segment, it is not base64, or it holds no numeric `exp`.
pub fn token_expiry(token: &str) -> Option<f64> {
    let payload = token.split('.').nth(1)?;

    let payload = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .ok()?;

    let claim: ExpiryClaim = serde_json::from_slice(&bytes).ok()?;
    claim.exp.is_finite().then_some(claim.exp)
}

/// Fails closed: a missing or undecodable token counts as expired.
pub fn is_token_expired(token: Option<&str>, now_millis: i64, margin: Duration) -> bool {
    let token = match token {
        Some(token) if !token.is_empty() => token,
        _ => return true,
    };

    match token_expiry(token) {
        Some(exp) => exp * 1000.0 < now_millis as f64 + margin.as_millis() as f64,
        None => true,
    }
}
