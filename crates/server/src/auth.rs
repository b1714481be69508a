//! Request-scoped auth context
//!
//! Identity is extracted per request from a compact signed bearer token
//! (SHA-256 over the shared secret and the claims) and passed into
//! handlers — never held in process-wide state, so concurrent requests
//! cannot cross-contaminate identity.

use crate::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Founder,
    Admin,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "founder" => Some(Self::Founder),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Founder => "founder",
            Self::Admin => "admin",
        }
    }
}

/// Verified identity for one request
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub user_id: i64,
    pub role: Role,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// `Some` when a valid token is presented, `None` otherwise.
/// Routes that merely *upgrade* on identity (the leaderboard) use this;
/// a bad token degrades to anonymous instead of failing the request.
pub struct OptionalAuth(pub Option<AuthContext>);

fn signature(secret: &str, user_id: i64, role: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b".");
    hasher.update(user_id.to_string().as_bytes());
    hasher.update(b".");
    hasher.update(role.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// `{user_id}.{role}.{hex signature}`
pub fn issue_token(secret: &str, user_id: i64, role: Role) -> String {
    format!(
        "{user_id}.{}.{}",
        role.as_str(),
        signature(secret, user_id, role.as_str())
    )
}

pub fn verify_token(secret: &str, token: &str) -> Option<AuthContext> {
    let mut parts = token.splitn(3, '.');
    let user_id: i64 = parts.next()?.parse().ok()?;
    let role_str = parts.next()?;
    let sig = parts.next()?;

    if sig != signature(secret, user_id, role_str) {
        return None;
    }
    let role = Role::parse(role_str)?;

    Some(AuthContext { user_id, role })
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthContext {
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        bearer_token(parts)
            .and_then(|token| verify_token(&state.auth_secret, token))
            .ok_or((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "Missing or invalid token" })),
            ))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(
            bearer_token(parts).and_then(|token| verify_token(&state.auth_secret, token)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let token = issue_token("s3cret", 42, Role::Admin);
        let ctx = verify_token("s3cret", &token).unwrap();
        assert_eq!(ctx.user_id, 42);
        assert!(ctx.is_admin());
    }

    #[test]
    fn test_bad_signature_rejected() {
        let token = issue_token("s3cret", 42, Role::Founder);
        assert!(verify_token("other-secret", &token).is_none());

        // Claim tampering invalidates the signature
        let tampered = token.replacen("42.", "7.", 1);
        assert!(verify_token("s3cret", &tampered).is_none());
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        for bad in ["", "42", "42.founder", "abc.founder.00", "42.ceo.00"] {
            assert!(verify_token("s3cret", bad).is_none(), "accepted {bad:?}");
        }
    }
}
