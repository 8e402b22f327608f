//! Call signaling relay
//!
//! A stateless forwarder for the five call-negotiation event kinds. The
//! relay keeps no call-session record and performs no call-state
//! validation: correctness lives in the two endpoints' state machines,
//! which also makes out-of-order or orphaned signaling something the
//! endpoints, not the relay, must tolerate. `from` is always rewritten
//! to the authenticated sender, so a client can never spoof it.
//!
//! Routing rules:
//! - `call:request` from a user is broadcast to the admins room (first
//!   responder semantics are left to the admin UI); from an admin it
//!   goes to the explicit target user, presented under the aggregate
//!   name "Admin".
//! - `call:respond` and the `webrtc:*` events are point-to-point,
//!   delivered to the `to` identity's own room only.
//!
//! Delivery to an empty room is a silent no-op ("peer unreachable" is
//! not distinguishable from "transiently slow" without an ack protocol,
//! which this system does not have).

use std::sync::Arc;

use helplink_shared::{ClientEvent, Role, ServerEvent};

use super::connection::Connection;
use super::room::RoomId;
use super::state::WebSocketState;

/// Display name used for admin-originated calls: support is presented to
/// end-users as a single service, not as individual operators.
const ADMIN_DISPLAY_NAME: &str = "Admin";

/// Route one inbound call-signaling event to its addressee(s).
pub async fn route_call_event(event: ClientEvent, conn: &Arc<Connection>, ws: &WebSocketState) {
    let from = conn.identity.id;

    match event {
        ClientEvent::CallRequest { kind, to } => match (conn.identity.role, to) {
            (Role::User, _) => {
                // `to` from a plain user is ignored: users can only call support
                ws.rooms
                    .emit(
                        RoomId::Admins,
                        ServerEvent::CallIncoming {
                            from,
                            username: conn.identity.username.clone(),
                            kind,
                        },
                    )
                    .await;
                tracing::debug!(from = %from, ?kind, "Call request relayed to admins");
            }
            (Role::Admin, Some(target)) => {
                ws.rooms
                    .emit(
                        RoomId::User(target),
                        ServerEvent::CallIncoming {
                            from,
                            username: ADMIN_DISPLAY_NAME.to_string(),
                            kind,
                        },
                    )
                    .await;
                tracing::debug!(from = %from, to = %target, ?kind, "Call request relayed to user");
            }
            (Role::Admin, None) => {
                let _ = conn.send(ServerEvent::Error {
                    message: "call:request from an admin requires a target".to_string(),
                });
            }
        },

        ClientEvent::CallRespond { to, accepted } => {
            ws.rooms
                .emit(RoomId::User(to), ServerEvent::CallResponse { accepted, from })
                .await;
        }

        ClientEvent::WebrtcOffer { to, offer } => {
            ws.rooms
                .emit(RoomId::User(to), ServerEvent::WebrtcOffer { from, offer })
                .await;
        }

        ClientEvent::WebrtcAnswer { to, answer } => {
            ws.rooms
                .emit(RoomId::User(to), ServerEvent::WebrtcAnswer { from, answer })
                .await;
        }

        ClientEvent::WebrtcIce { to, candidate } => {
            ws.rooms
                .emit(RoomId::User(to), ServerEvent::WebrtcIce { from, candidate })
                .await;
        }

        // Not a call event; handled by the socket loop
        ClientEvent::Ping => {
            let _ = conn.send(ServerEvent::Pong);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Allow unwrap() in tests for cleaner test code
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use helplink_shared::{CallKind, ChatStore, Identity};
    use serde_json::json;
    use tokio::sync::mpsc;

    struct Fixture {
        ws: WebSocketState,
        store: Arc<MemoryStore>,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let ws = WebSocketState::new(Arc::clone(&store) as Arc<dyn ChatStore>);
            Self { ws, store }
        }

        async fn connect(
            &self,
            username: &str,
            role: Role,
        ) -> (
            Arc<Connection>,
            mpsc::UnboundedReceiver<ServerEvent>,
        ) {
            let user = self.store.add_user(username, role);
            let (tx, rx) = mpsc::unbounded_channel();
            let conn = Arc::new(Connection::new(
                Identity {
                    id: user.id,
                    username: user.username,
                    role,
                },
                tx,
            ));
            self.ws.presence.register(Arc::clone(&conn)).await;
            (conn, rx)
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_request_respond_offer_round_trip() {
        let fx = Fixture::new();
        let (admin, mut admin_rx) = fx.connect("op", Role::Admin).await;
        let (user, mut user_rx) = fx.connect("alice", Role::User).await;
        let (bystander, mut bystander_rx) = fx.connect("bob", Role::User).await;
        drain(&mut admin_rx);
        drain(&mut user_rx);
        drain(&mut bystander_rx);

        // User requests a call: call:incoming must reach admins only
        route_call_event(
            ClientEvent::CallRequest {
                kind: CallKind::Video,
                to: None,
            },
            &user,
            &fx.ws,
        )
        .await;
        let admin_events = drain(&mut admin_rx);
        assert!(admin_events.iter().any(|e| matches!(
            e,
            ServerEvent::CallIncoming { from, kind: CallKind::Video, .. } if *from == user.identity.id
        )));
        assert!(drain(&mut bystander_rx).is_empty());

        // Admin accepts: call:response must reach the original caller only
        route_call_event(
            ClientEvent::CallRespond {
                to: user.identity.id,
                accepted: true,
            },
            &admin,
            &fx.ws,
        )
        .await;
        let user_events = drain(&mut user_rx);
        assert!(user_events.iter().any(|e| matches!(
            e,
            ServerEvent::CallResponse { accepted: true, from } if *from == admin.identity.id
        )));
        assert!(drain(&mut bystander_rx).is_empty());

        // Caller sends the offer: webrtc:offer must reach the admin's own room only
        route_call_event(
            ClientEvent::WebrtcOffer {
                to: admin.identity.id,
                offer: json!({"sdp": "v=0..."}),
            },
            &user,
            &fx.ws,
        )
        .await;
        let admin_events = drain(&mut admin_rx);
        assert!(admin_events.iter().any(|e| matches!(
            e,
            ServerEvent::WebrtcOffer { from, .. } if *from == user.identity.id
        )));
        assert!(drain(&mut bystander_rx).is_empty());
        assert!(drain(&mut user_rx).is_empty());
    }

    #[tokio::test]
    async fn test_admin_call_request_targets_one_user() {
        let fx = Fixture::new();
        let (admin, _admin_rx) = fx.connect("op", Role::Admin).await;
        let (user, mut user_rx) = fx.connect("alice", Role::User).await;
        let (other, mut other_rx) = fx.connect("bob", Role::User).await;
        drain(&mut user_rx);
        drain(&mut other_rx);

        route_call_event(
            ClientEvent::CallRequest {
                kind: CallKind::Audio,
                to: Some(user.identity.id),
            },
            &admin,
            &fx.ws,
        )
        .await;

        let events = drain(&mut user_rx);
        assert!(events.iter().any(|e| matches!(
            e,
            ServerEvent::CallIncoming { username, kind: CallKind::Audio, .. } if username == "Admin"
        )));
        assert!(drain(&mut other_rx).is_empty());
    }

    #[tokio::test]
    async fn test_admin_call_request_without_target_errors_to_sender() {
        let fx = Fixture::new();
        let (admin, mut admin_rx) = fx.connect("op", Role::Admin).await;
        drain(&mut admin_rx);

        route_call_event(
            ClientEvent::CallRequest {
                kind: CallKind::Audio,
                to: None,
            },
            &admin,
            &fx.ws,
        )
        .await;

        let events = drain(&mut admin_rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, ServerEvent::Error { .. })));
    }

    #[tokio::test]
    async fn test_signaling_to_offline_target_is_noop() {
        let fx = Fixture::new();
        let (user, mut user_rx) = fx.connect("alice", Role::User).await;
        drain(&mut user_rx);

        // Target was never connected: silent no-op, nothing echoes back
        route_call_event(
            ClientEvent::WebrtcIce {
                to: helplink_shared::UserId::new(),
                candidate: json!({"candidate": "candidate:0"}),
            },
            &user,
            &fx.ws,
        )
        .await;
        assert!(drain(&mut user_rx).is_empty());
    }

    #[tokio::test]
    async fn test_user_call_request_ignores_explicit_target() {
        let fx = Fixture::new();
        let (admin, mut admin_rx) = fx.connect("op", Role::Admin).await;
        let (user, _user_rx) = fx.connect("alice", Role::User).await;
        let (other, mut other_rx) = fx.connect("bob", Role::User).await;
        drain(&mut admin_rx);
        drain(&mut other_rx);

        // A user addressing another user directly still goes to support
        route_call_event(
            ClientEvent::CallRequest {
                kind: CallKind::Audio,
                to: Some(other.identity.id),
            },
            &user,
            &fx.ws,
        )
        .await;

        assert!(drain(&mut other_rx).is_empty());
        assert!(drain(&mut admin_rx)
            .iter()
            .any(|e| matches!(e, ServerEvent::CallIncoming { .. })));
    }
}
