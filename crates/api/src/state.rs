//! Shared application state

use std::sync::Arc;

use helplink_shared::ChatStore;

use crate::{
    auth::{Authenticator, JwtManager},
    config::Config,
    relay::MessageRelay,
    websocket::WebSocketState,
};

/// Application state shared across all routes and connection tasks
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn ChatStore>,
    pub authenticator: Authenticator,
    pub ws: WebSocketState,
    pub relay: MessageRelay,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn ChatStore>) -> Self {
        let jwt = JwtManager::new(&config.jwt_secret, config.jwt_expiry_hours);
        let authenticator = Authenticator::new(jwt, Arc::clone(&store));
        let ws = WebSocketState::new(Arc::clone(&store));
        let relay = MessageRelay::new(Arc::clone(&store), ws.clone());

        Self {
            config: Arc::new(config),
            store,
            authenticator,
            ws,
            relay,
        }
    }
}
