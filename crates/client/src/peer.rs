//! Peer negotiation seam
//!
//! Wraps the platform's real-time transport (an RTCPeerConnection or
//! equivalent). The state machine only drives the offer/answer/candidate
//! exchange; media payload bytes never pass through this crate.

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("Negotiation failed: {0}")]
    Negotiation(String),
    #[error("Invalid remote description: {0}")]
    InvalidDescription(String),
    #[error("Invalid ICE candidate: {0}")]
    InvalidCandidate(String),
}

/// One peer negotiation object, owned by a single call.
#[async_trait]
pub trait PeerLink: Send {
    /// Produce the local SDP offer (caller side).
    async fn create_offer(&mut self) -> Result<Value, PeerError>;

    /// Apply the remote offer and produce the local answer (callee side).
    async fn accept_offer(&mut self, offer: Value) -> Result<Value, PeerError>;

    /// Apply the remote answer (caller side).
    async fn apply_answer(&mut self, answer: Value) -> Result<(), PeerError>;

    /// Add a remote ICE candidate.
    async fn add_remote_candidate(&mut self, candidate: Value) -> Result<(), PeerError>;

    /// Tear the connection down. Must be idempotent.
    fn close(&mut self);
}

/// Factory for peer negotiation objects.
pub trait PeerConnector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn PeerLink>, PeerError>;
}
