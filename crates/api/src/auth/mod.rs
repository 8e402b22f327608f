//! Authentication module for Helplink
//!
//! Validates bearer credentials presented at connection time and
//! resolves them to an [`Identity`] via the user store. A failed
//! authentication terminates the connection attempt before any presence
//! mutation happens; there are no retries.

pub mod jwt;
pub mod middleware;

pub use jwt::{Claims, JwtError, JwtManager};
pub use middleware::require_auth;

use std::sync::Arc;

use helplink_shared::{ChatStore, Identity, StoreError, UserId};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication token required")]
    MissingToken,
    #[error("Invalid authentication token")]
    InvalidToken,
    #[error("Authentication token expired")]
    Expired,
    #[error("Unknown subject")]
    UnknownSubject,
    #[error("User account is disabled")]
    Disabled,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolves a bearer credential to an authenticated identity.
#[derive(Clone)]
pub struct Authenticator {
    jwt: JwtManager,
    store: Arc<dyn ChatStore>,
}

impl Authenticator {
    pub fn new(jwt: JwtManager, store: Arc<dyn ChatStore>) -> Self {
        Self { jwt, store }
    }

    /// Validate `token` and resolve its subject against the user store.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<Identity, AuthError> {
        let token = token.ok_or(AuthError::MissingToken)?;

        let claims = self.jwt.validate_token(token).map_err(|e| match e {
            JwtError::Expired => AuthError::Expired,
            _ => AuthError::InvalidToken,
        })?;

        let user = self
            .store
            .user_by_id(UserId(claims.sub))
            .await?
            .ok_or(AuthError::UnknownSubject)?;

        if !user.active {
            return Err(AuthError::Disabled);
        }

        Ok(Identity {
            id: user.id,
            username: user.username,
            role: user.role,
        })
    }
}
