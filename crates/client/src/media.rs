//! Local media capture seam
//!
//! Acquisition is user-permission gated and may wait indefinitely; it
//! suspends only the owning connection task.

use async_trait::async_trait;

use helplink_shared::CallKind;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Camera/microphone access denied")]
    PermissionDenied,
    #[error("No capture device available")]
    NoDevice,
    #[error("Media device error: {0}")]
    Device(String),
}

/// A live set of local capture tracks (audio always, video if the call
/// requested it).
pub trait LocalMedia: Send {
    /// Stop all tracks and release the devices. Must be idempotent.
    fn stop(&mut self);
}

/// Platform capture device access.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Acquire local tracks for a call: audio always, video iff `kind`
    /// is [`CallKind::Video`].
    async fn acquire(&self, kind: CallKind) -> Result<Box<dyn LocalMedia>, MediaError>;
}
