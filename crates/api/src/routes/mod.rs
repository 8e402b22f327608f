//! API routes

pub mod health;
pub mod messages;

use axum::{
    middleware,
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{auth::require_auth, state::AppState, websocket::ws_handler};

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Authenticated REST surface
    let api_routes = Router::new()
        .route(
            "/me/messages",
            get(messages::my_messages).post(messages::send_to_support),
        )
        .route(
            "/admin/conversations/:user_id/messages",
            get(messages::user_messages),
        )
        .route(
            "/admin/messages/:user_id",
            axum::routing::post(messages::send_to_user),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .route("/health", get(health::health))
        // WebSocket authenticates via its token query parameter
        .route("/ws", get(ws_handler))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
