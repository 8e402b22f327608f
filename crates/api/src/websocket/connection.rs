//! WebSocket connection management
//!
//! Represents an authenticated live connection. Events queued on the
//! sender are drained by the connection's writer task in FIFO order, so
//! delivery to a single recipient preserves the emitter's call order.

use tokio::sync::mpsc;

use helplink_shared::{Identity, ServerEvent, SessionId};

/// An active, authenticated WebSocket connection
#[derive(Debug)]
pub struct Connection {
    /// Unique session ID for this connection
    pub session_id: SessionId,

    /// Authenticated identity, immutable for the connection's lifetime
    pub identity: Identity,

    /// Channel to send events to this connection
    pub sender: mpsc::UnboundedSender<ServerEvent>,
}

impl Connection {
    /// Create a new connection
    pub fn new(identity: Identity, sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            session_id: SessionId::new(),
            identity,
            sender,
        }
    }

    /// Send an event to this connection
    ///
    /// Returns Ok(()) if queued successfully, Err if the connection is
    /// closed. Callers treat a closed recipient as best-effort loss.
    #[allow(clippy::result_large_err)] // Error type is from tokio mpsc, containing the failed event
    pub fn send(&self, event: ServerEvent) -> Result<(), mpsc::error::SendError<ServerEvent>> {
        self.sender.send(event)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Allow unwrap() in tests for cleaner test code
mod tests {
    use super::*;
    use helplink_shared::{Role, UserId};

    fn identity(role: Role) -> Identity {
        Identity {
            id: UserId::new(),
            username: "tester".to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn test_send_preserves_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = Connection::new(identity(Role::User), tx);

        conn.send(ServerEvent::Pong).unwrap();
        conn.send(ServerEvent::Connected {
            session_id: conn.session_id,
        })
        .unwrap();

        assert!(matches!(rx.try_recv().unwrap(), ServerEvent::Pong));
        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerEvent::Connected { .. }
        ));
    }

    #[tokio::test]
    async fn test_send_to_closed_connection_errors() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let conn = Connection::new(identity(Role::Admin), tx);

        assert!(conn.send(ServerEvent::Pong).is_err());
    }
}
