//! Earthdata Login token claims.
//!
//! EDL user tokens are JWTs. The payload carries:
//! - `exp`: expiry as a Unix timestamp
//! - `uid`: the Earthdata username
//!
//! Signatures are not verified here; the servers do that. The claims only
//! let us fail early on a token that has already expired.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Warn when a token expires within this margin
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(24 * 3600);

/// Claims decoded from a token payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub uid: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct RawClaims {
    uid: Option<String>,
    exp: Option<i64>,
}

/// Decode the claims of a JWT.
///
/// Returns `None` if the token is not a three-part JWT with a JSON payload.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let mut parts = token.trim().split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let raw: RawClaims = serde_json::from_slice(&bytes).ok()?;
    Some(TokenClaims {
        uid: raw.uid,
        expires_at: raw.exp.and_then(|ts| DateTime::from_timestamp(ts, 0)),
    })
}

/// Expired at `now`. Unknown expiry counts as valid.
pub fn is_expired(claims: &TokenClaims, now: DateTime<Utc>) -> bool {
    claims.expires_at.is_some_and(|exp| exp <= now)
}

/// Expires within `margin` of `now` (but not yet expired).
pub fn is_expiring_soon(claims: &TokenClaims, now: DateTime<Utc>, margin: Duration) -> bool {
    match (claims.expires_at, chrono::Duration::from_std(margin)) {
        (Some(exp), Ok(margin)) => exp > now && exp <= now + margin,
        _ => false,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build an unsigned JWT-shaped token around a JSON payload
    pub(crate) fn fake_token(payload: &str) -> String {
        format!("eyJhbGciOiJSUzI1NiJ9.{}.c2ln", URL_SAFE_NO_PAD.encode(payload))
    }

    #[test]
    fn decode_claims_reads_uid_and_exp() {
        let token = fake_token(r#"{"type":"User","uid":"jdoe","exp":1767225600,"iat":1761955200}"#);
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.uid.as_deref(), Some("jdoe"));
        assert_eq!(
            claims.expires_at,
            DateTime::from_timestamp(1_767_225_600, 0)
        );
    }

    #[test]
    fn decode_claims_tolerates_padding() {
        let payload = URL_SAFE_NO_PAD.encode(r#"{"uid":"ab"}"#);
        let token = format!("h.{payload}==.s");
        assert_eq!(decode_claims(&token).unwrap().uid.as_deref(), Some("ab"));
    }

    #[test]
    fn decode_claims_not_a_jwt() {
        assert!(decode_claims("plain-opaque-token").is_none());
        assert!(decode_claims("a.b.c.d").is_none());
        assert!(decode_claims(&format!("x.{}.y", "not json!")).is_none());
    }

    #[test]
    fn expired_and_expiring() {
        let now = DateTime::from_timestamp(1_000_000, 0).unwrap();
        let past = TokenClaims {
            uid: None,
            expires_at: DateTime::from_timestamp(999_999, 0),
        };
        let soon = TokenClaims {
            uid: None,
            expires_at: DateTime::from_timestamp(1_000_060, 0),
        };
        let unknown = TokenClaims {
            uid: None,
            expires_at: None,
        };

        assert!(is_expired(&past, now));
        assert!(!is_expired(&soon, now));
        assert!(!is_expired(&unknown, now));

        assert!(is_expiring_soon(&soon, now, Duration::from_secs(3600)));
        assert!(!is_expiring_soon(&past, now, Duration::from_secs(3600)));
        assert!(!is_expiring_soon(&unknown, now, Duration::from_secs(3600)));
    }
}
