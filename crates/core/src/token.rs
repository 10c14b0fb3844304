//! Three-segment bearer token codec
//!
//! Tokens look like JWTs: `header.payload.signature`, each segment base64.
//! The signature is a fixed placeholder; the codec only guarantees structure
//! and expiry, which is all the client and the simulated backend rely on.

use crate::error::{AuthError, Result};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

/// Header segment of every issued token
pub const TOKEN_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Signature segment of every issued token
pub const SIGNATURE_PLACEHOLDER: &str = "mock-signature";

/// Purpose of a token, carried in the payload's `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Refresh,
}

/// Token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    /// Subject
    pub user_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Expiration time, milliseconds since the Unix epoch
    pub exp: i64,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TokenKind>,
}

impl TokenClaims {
    /// Claims for an access token living `ttl` from now
    pub fn access(user_id: u64, email: &str, role: &str, ttl: Duration) -> Self {
        Self {
            user_id,
            email: Some(email.to_string()),
            role: Some(role.to_string()),
            exp: now_millis() + ttl.num_milliseconds(),
            kind: None,
        }
    }

    /// Claims for a refresh token living `ttl` from now
    pub fn refresh(user_id: u64, ttl: Duration) -> Self {
        Self {
            user_id,
            email: None,
            role: None,
            exp: now_millis() + ttl.num_milliseconds(),
            kind: Some(TokenKind::Refresh),
        }
    }

    pub fn is_refresh(&self) -> bool {
        self.kind == Some(TokenKind::Refresh)
    }

    /// Expired when `exp` is not strictly in the future
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.exp <= now_ms
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }
}

/// Current wall clock in milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Encode claims into a `header.payload.signature` token
pub fn encode(claims: &TokenClaims) -> Result<String> {
    let payload = serde_json::to_vec(claims)?;
    Ok(format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(TOKEN_HEADER),
        URL_SAFE_NO_PAD.encode(payload),
        SIGNATURE_PLACEHOLDER
    ))
}

/// Decode the payload of a token without checking expiry
pub fn decode(token: &str) -> Result<TokenClaims> {
    let parts: Vec<&str> = token.split('.').collect();
    let [_, payload, _] = parts.as_slice() else {
        return Err(AuthError::TokenInvalid(format!(
            "expected 3 segments, found {}",
            parts.len()
        )));
    };

    // Tolerate padded standard base64 as produced by browser `btoa`.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD.decode(payload))
        .map_err(|e| AuthError::TokenInvalid(format!("payload is not base64: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::TokenInvalid(format!("payload is not a claim set: {e}")))
}

/// Decode a token and reject it when expired
pub fn validate(token: &str) -> Result<TokenClaims> {
    validate_at(token, now_millis())
}

/// Like [`validate`] against an explicit clock
pub fn validate_at(token: &str, now_ms: i64) -> Result<TokenClaims> {
    let claims = decode(token)?;
    if claims.is_expired_at(now_ms) {
        return Err(AuthError::TokenExpired("Token has expired".to_string()));
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_preserves_claims() {
        let claims = TokenClaims {
            user_id: 1,
            email: None,
            role: Some("admin".to_string()),
            exp: now_millis() + 900_000,
            kind: None,
        };

        let token = encode(&claims).unwrap();
        assert_eq!(token.split('.').count(), 3);
        assert!(token.ends_with(SIGNATURE_PLACEHOLDER));

        let decoded = decode(&token).unwrap();
        assert_eq!(decoded, claims);
        assert!(validate(&token).is_ok());
    }

    #[test]
    fn test_past_exp_is_expired() {
        let claims = TokenClaims {
            user_id: 1,
            email: None,
            role: Some("admin".to_string()),
            exp: now_millis() - 1_000,
            kind: None,
        };
        let token = encode(&claims).unwrap();

        assert!(decode(&token).unwrap().is_expired());
        assert!(matches!(validate(&token), Err(AuthError::TokenExpired(_))));
    }

    #[test]
    fn test_refresh_claims_carry_type() {
        let claims = TokenClaims::refresh(2, Duration::days(7));
        let token = encode(&claims).unwrap();

        let payload = token.split('.').nth(1).unwrap();
        let raw = URL_SAFE_NO_PAD.decode(payload).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json["type"], "refresh");
        assert_eq!(json["userId"], 2);
        assert!(json.get("email").is_none());

        assert!(decode(&token).unwrap().is_refresh());
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        assert!(matches!(decode(""), Err(AuthError::TokenInvalid(_))));
        assert!(matches!(decode("a.b"), Err(AuthError::TokenInvalid(_))));
        assert!(matches!(decode("a.b.c.d"), Err(AuthError::TokenInvalid(_))));
        assert!(matches!(
            decode("x.!!!not-base64!!!.y"),
            Err(AuthError::TokenInvalid(_))
        ));

        let not_claims = format!("x.{}.y", URL_SAFE_NO_PAD.encode(b"[1,2,3]"));
        assert!(matches!(decode(&not_claims), Err(AuthError::TokenInvalid(_))));
    }

    #[test]
    fn test_accepts_padded_standard_payload() {
        let payload = STANDARD.encode(br#"{"userId":7,"exp":4102444800000}"#);
        let token = format!("h.{payload}.sig");

        let claims = decode(&token).unwrap();
        assert_eq!(claims.user_id, 7);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_boundary_exp_counts_as_expired() {
        let claims = TokenClaims {
            user_id: 1,
            email: None,
            role: None,
            exp: 1_000,
            kind: None,
        };
        assert!(claims.is_expired_at(1_000));
        assert!(!claims.is_expired_at(999));
    }
}
