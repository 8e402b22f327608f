//! Message routes
//!
//! Thin REST surface over the message relay. User routes address the
//! assigned admin implicitly; admin routes name the target user and are
//! role-gated.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use helplink_shared::{Identity, Message, Role, UserId};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

fn validate_text(text: &str) -> ApiResult<()> {
    if text.trim().is_empty() {
        return Err(ApiError::BadRequest("message text is required".to_string()));
    }
    Ok(())
}

fn require_admin(identity: &Identity) -> ApiResult<()> {
    match identity.role {
        Role::Admin => Ok(()),
        Role::User => Err(ApiError::Forbidden),
    }
}

/// GET /api/me/messages - the caller's conversation history
pub async fn my_messages(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<Message>>> {
    let messages = state.relay.history(identity.id).await?;
    Ok(Json(messages))
}

/// POST /api/me/messages - user sends a message to support
pub async fn send_to_support(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    validate_text(&body.text)?;

    let message = state.relay.send(&identity, None, &body.text).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /api/admin/conversations/{user_id}/messages - admin view of a
/// user's conversation
pub async fn user_messages(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Message>>> {
    require_admin(&identity)?;

    let messages = state.relay.history(UserId(user_id)).await?;
    Ok(Json(messages))
}

/// POST /api/admin/messages/{user_id} - admin sends a message to a user
pub async fn send_to_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    require_admin(&identity)?;
    validate_text(&body.text)?;

    let message = state
        .relay
        .send(&identity, Some(UserId(user_id)), &body.text)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Allow unwrap() in tests for cleaner test code
mod tests {
    use super::*;

    #[test]
    fn test_validate_text_rejects_blank() {
        assert!(validate_text("  ").is_err());
        assert!(validate_text("hello").is_ok());
    }

    #[test]
    fn test_require_admin() {
        let admin = Identity {
            id: UserId::new(),
            username: "op".to_string(),
            role: Role::Admin,
        };
        let user = Identity {
            id: UserId::new(),
            username: "alice".to_string(),
            role: Role::User,
        };
        assert!(require_admin(&admin).is_ok());
        assert!(matches!(require_admin(&user), Err(ApiError::Forbidden)));
    }
}
