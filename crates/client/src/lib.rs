//! Helplink Call Client
//!
//! The per-participant call life-cycle state machine. One
//! [`CallMachine`](session::CallMachine) instance lives in each
//! endpoint's connection task; it owns the local media and the peer
//! negotiation object and is never touched by another task.
//!
//! The machine is written against three seams so it can run on any
//! platform (native or wasm) and be driven deterministically in tests:
//! [`media::MediaSource`] for capture devices, [`peer::PeerConnector`]
//! for the underlying negotiation transport, and [`signal::SignalSink`]
//! for outbound signaling events.

pub mod media;
pub mod peer;
pub mod session;
pub mod signal;

pub use media::{LocalMedia, MediaError, MediaSource};
pub use peer::{PeerConnector, PeerError, PeerLink};
pub use session::{CallConfig, CallError, CallMachine, CallState, ResponseOutcome};
pub use signal::{SignalError, SignalSink};
