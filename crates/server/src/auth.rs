use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use chrono::Utc;
use thiserror::Error;

use soberly_core::domain::user::UserId;
use soberly_core::errors::ApplicationError;
use soberly_db::repositories::{AuthSessionRepository, RepositoryError};
use soberly_db::hash_token;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("malformed authorization header")]
    MalformedHeader,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("identity lookup failed: {0}")]
    Lookup(#[from] RepositoryError),
}

impl From<AuthError> for ApplicationError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::Lookup(error) => Self::Persistence(error.to_string()),
            other => Self::Unauthenticated(other.to_string()),
        }
    }
}

/// Resolves an opaque bearer token to the user it was issued for.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<UserId, AuthError>;
}

/// Looks tokens up by SHA-256 digest in the session store.
pub struct SessionIdentityProvider {
    sessions: Arc<dyn AuthSessionRepository>,
}

impl SessionIdentityProvider {
    pub fn new(sessions: Arc<dyn AuthSessionRepository>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl IdentityProvider for SessionIdentityProvider {
    async fn authenticate(&self, token: &str) -> Result<UserId, AuthError> {
        let session = self
            .sessions
            .find_active(&hash_token(token), Utc::now())
            .await?
            .ok_or(AuthError::InvalidToken)?;
        Ok(session.user_id)
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthError::MissingToken)?;
    let value = value.to_str().map_err(|_| AuthError::MalformedHeader)?.trim();
    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MalformedHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedHeader);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}
