//! Bearer credentials.
//!
//! A token is `base64url(claims-json) . base64url(hmac-sha256(secret, payload))`.
//! Claims carry the principal id, role names, and expiry; verification
//! rejects bad signatures, malformed payloads, and expired tokens.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Token lifetime in seconds.
const TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;

/// Signed token claims.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    /// Subject: the user id.
    pub sub: String,
    /// Role names at issue time.
    pub roles: Vec<String>,
    /// Expiry as a unix timestamp.
    pub exp: i64,
}

fn sign(secret: &str, payload: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

/// Issue a bearer token for the principal.
pub fn issue_token(secret: &str, user_id: &str, roles: &[String]) -> String {
    let claims = TokenClaims {
        sub: user_id.to_string(),
        roles: roles.to_vec(),
        exp: Utc::now().timestamp() + TOKEN_TTL_SECONDS,
    };
    let payload =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).expect("claims serialize cleanly"));
    let signature = sign(secret, &payload);
    format!("{}.{}", payload, signature)
}

/// Verify a bearer token and return its claims.
pub fn verify_token(secret: &str, token: &str) -> Result<TokenClaims> {
    let denied = || Error::denied("invalid or expired credential");

    let (payload, signature) = token.split_once('.').ok_or_else(denied)?;
    let expected = sign(secret, payload);
    let matches = expected.len() == signature.len()
        && expected
            .bytes()
            .zip(signature.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0;
    if !matches {
        return Err(denied());
    }

    let raw = URL_SAFE_NO_PAD.decode(payload).map_err(|_| denied())?;
    let claims: TokenClaims = serde_json::from_slice(&raw).map_err(|_| denied())?;
    if claims.exp <= Utc::now().timestamp() {
        return Err(denied());
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_and_verify() {
        let token = issue_token("secret", "user-1", &["volunteer".to_string()]);
        let claims = verify_token("secret", &token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.roles, vec!["volunteer"]);
    }

    #[test]
    fn wrong_secret_is_denied() {
        let token = issue_token("secret", "user-1", &[]);
        assert!(verify_token("other", &token).is_err());
    }

    #[test]
    fn tampered_payload_is_denied() {
        let token = issue_token("secret", "user-1", &[]);
        let tampered = format!("x{}", token);
        assert!(verify_token("secret", &tampered).is_err());
    }
}
