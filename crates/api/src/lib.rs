//! Helplink API Library
//!
//! This crate contains the relay server: connection authentication,
//! presence tracking, room-addressed fan-out, message relay, and the
//! call signaling relay.

pub mod auth;
pub mod config;
pub mod error;
pub mod relay;
pub mod routes;
pub mod state;
pub mod store;
pub mod websocket;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use relay::MessageRelay;
pub use state::AppState;
