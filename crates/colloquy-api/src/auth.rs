//! Session tokens, webhook signatures and the auth extractor.
//!
//! Session tokens are issued by the identity integration and have the form
//! `v1.<user_id>.<expires_unix>.<hex hmac-sha256>`, where the MAC covers
//! everything before the last dot.

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use colloquy_core::{Error, Result};

use crate::error::ApiError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_VERSION: &str = "v1";

/// Verifies bearer session tokens against `SESSION_SECRET`.
#[derive(Clone)]
pub struct SessionVerifier {
    secret: Vec<u8>,
}

impl std::fmt::Debug for SessionVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionVerifier").finish_non_exhaustive()
    }
}

impl SessionVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Read the signing secret from `SESSION_SECRET`.
    pub fn from_env() -> Result<Self> {
        match std::env::var("SESSION_SECRET") {
            Ok(secret) if !secret.is_empty() => Ok(Self::new(secret)),
            _ => Err(Error::Config("SESSION_SECRET is not set".to_string())),
        }
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| Error::Internal(e.to_string()))
    }

    /// Issue a token for `user_id` valid until `expires_at`.
    pub fn sign(&self, user_id: &str, expires_at: DateTime<Utc>) -> Result<String> {
        let payload = format!("{}.{}.{}", TOKEN_VERSION, user_id, expires_at.timestamp());
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        Ok(format!(
            "{}.{}",
            payload,
            hex::encode(mac.finalize().into_bytes())
        ))
    }

    /// Check the signature and expiry of `token`, returning the user id.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<String> {
        let invalid = || Error::Unauthorized("Invalid session token".to_string());

        let rest = token
            .strip_prefix(TOKEN_VERSION)
            .and_then(|r| r.strip_prefix('.'))
            .ok_or_else(invalid)?;
        // User ids may contain dots, so split from the right.
        let mut parts = rest.rsplitn(3, '.');
        let signature = parts.next().ok_or_else(invalid)?;
        let expires = parts.next().ok_or_else(invalid)?;
        let user_id = parts.next().ok_or_else(invalid)?;
        if user_id.is_empty() {
            return Err(invalid());
        }

        let signature = hex::decode(signature).map_err(|_| invalid())?;
        let mut mac = self.mac()?;
        mac.update(format!("{}.{}.{}", TOKEN_VERSION, user_id, expires).as_bytes());
        mac.verify_slice(&signature).map_err(|_| invalid())?;

        let expires: i64 = expires.parse().map_err(|_| invalid())?;
        if expires <= now.timestamp() {
            return Err(Error::Unauthorized("Session expired".to_string()));
        }

        Ok(user_id.to_string())
    }
}

/// Check an `X-Webhook-Signature` header value (hex HMAC-SHA256 of `body`,
/// optionally prefixed with `sha256=`).
pub fn verify_webhook_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let signature = signature.trim();
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Compute the hex signature the identity provider sends for `body`.
pub fn sign_webhook_body(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Extractor that requires a valid bearer session.
#[derive(Debug, Clone)]
pub struct RequireAuth {
    pub user_id: String,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

        let user_id = state.sessions.verify(token, Utc::now()).map_err(|e| {
            debug!(subsystem = "api", component = "auth", error = %e, "Session rejected");
            ApiError::from(e)
        })?;

        Ok(RequireAuth { user_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_sign_then_verify() {
        let verifier = SessionVerifier::new("secret");
        let now = Utc::now();
        let token = verifier.sign("user_42", now + Duration::hours(1)).unwrap();
        assert!(token.starts_with("v1.user_42."));
        assert_eq!(verifier.verify(&token, now).unwrap(), "user_42");
    }

    #[test]
    fn test_user_id_with_dots() {
        let verifier = SessionVerifier::new("secret");
        let now = Utc::now();
        let token = verifier.sign("a.b.c", now + Duration::minutes(5)).unwrap();
        assert_eq!(verifier.verify(&token, now).unwrap(), "a.b.c");
    }

    #[test]
    fn test_expired_token_rejected() {
        let verifier = SessionVerifier::new("secret");
        let now = Utc::now();
        let token = verifier.sign("u", now - Duration::seconds(1)).unwrap();
        assert!(matches!(
            verifier.verify(&token, now),
            Err(Error::Unauthorized(msg)) if msg.contains("expired")
        ));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let verifier = SessionVerifier::new("secret");
        let now = Utc::now();
        let token = verifier.sign("alice", now + Duration::hours(1)).unwrap();
        let forged = token.replacen("alice", "mallory", 1);
        assert!(verifier.verify(&forged, now).is_err());

        let other = SessionVerifier::new("other-secret");
        assert!(other.verify(&token, now).is_err());
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        let verifier = SessionVerifier::new("secret");
        let now = Utc::now();
        for token in ["", "v1", "v1.", "v2.u.1.ab", "v1.u.notanumber", "v1..123.abcd", "garbage"] {
            assert!(verifier.verify(token, now).is_err(), "accepted {:?}", token);
        }
    }

    #[test]
    fn test_webhook_signature() {
        let body = br#"{"type":"user.created"}"#;
        let sig = sign_webhook_body("whsec", body).unwrap();
        assert!(verify_webhook_signature("whsec", body, &sig));
        assert!(verify_webhook_signature("whsec", body, &format!("sha256={}", sig)));
        assert!(!verify_webhook_signature("other", body, &sig));
        assert!(!verify_webhook_signature("whsec", b"{}", &sig));
        assert!(!verify_webhook_signature("whsec", body, "not-hex"));
    }
}
