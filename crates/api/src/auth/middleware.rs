//! Bearer authentication middleware for REST routes
//!
//! Extracts the `Authorization: Bearer` header, resolves it through the
//! [`Authenticator`](super::Authenticator), and injects the resulting
//! [`Identity`] as a request extension.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::{error::ApiError, state::AppState};

/// Require a valid bearer token; inserts `Identity` into extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let identity = state.authenticator.authenticate(token).await?;

    tracing::debug!(user_id = %identity.id, role = ?identity.role, "Request authenticated");
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
