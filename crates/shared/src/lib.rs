//! Helplink Shared Types and Contracts
//!
//! This crate contains the types, wire events, and store contract shared
//! between the relay server and the call client.

pub mod events;
pub mod store;
pub mod types;

pub use events::*;
pub use store::{ChatStore, StoreError};
pub use types::*;
