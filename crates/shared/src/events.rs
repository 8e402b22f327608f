//! Wire event types and serialization
//!
//! Defines all client-to-server and server-to-client event types with
//! type-safe serde serialization. SDP offers/answers and ICE candidates
//! are carried as opaque JSON: the relay forwards them without ever
//! interpreting their contents.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::types::{CallKind, Message, SessionId, UserId, UserProfile};

// =============================================================================
// Client-to-Server Events
// =============================================================================

/// Events sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Start a call. `to` is required iff the caller is an admin;
    /// user calls are broadcast to all connected admins.
    ///
    /// The media kind is named `kind` on the wire because `type` is the
    /// envelope tag.
    #[serde(rename = "call:request")]
    CallRequest {
        kind: CallKind,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        to: Option<UserId>,
    },

    /// Accept or reject an incoming call
    #[serde(rename = "call:respond")]
    CallRespond { to: UserId, accepted: bool },

    /// Forward an SDP offer to the remote party
    #[serde(rename = "webrtc:offer")]
    WebrtcOffer { to: UserId, offer: Value },

    /// Forward an SDP answer to the remote party
    #[serde(rename = "webrtc:answer")]
    WebrtcAnswer { to: UserId, answer: Value },

    /// Forward an ICE candidate to the remote party
    #[serde(rename = "webrtc:ice")]
    WebrtcIce { to: UserId, candidate: Value },

    /// Heartbeat ping to keep the connection alive
    #[serde(rename = "ping")]
    Ping,
}

// =============================================================================
// Server-to-Client Events
// =============================================================================

/// Online/offline presence status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// Kind of change on the admin management side channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserUpdateKind {
    Created,
    Updated,
}

/// Events sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Incoming call notification
    #[serde(rename = "call:incoming")]
    CallIncoming {
        from: UserId,
        username: String,
        kind: CallKind,
    },

    /// Callee's accept/reject decision, delivered to the caller
    #[serde(rename = "call:response")]
    CallResponse { accepted: bool, from: UserId },

    /// SDP offer from the remote party
    #[serde(rename = "webrtc:offer")]
    WebrtcOffer { from: UserId, offer: Value },

    /// SDP answer from the remote party
    #[serde(rename = "webrtc:answer")]
    WebrtcAnswer { from: UserId, answer: Value },

    /// ICE candidate from the remote party
    #[serde(rename = "webrtc:ice")]
    WebrtcIce { from: UserId, candidate: Value },

    /// New chat message
    #[serde(rename = "message:new")]
    MessageNew { message: Message },

    /// Per-user presence change (delivered to the admins room only)
    #[serde(rename = "user:status")]
    UserStatus {
        user_id: UserId,
        status: PresenceStatus,
        #[serde(
            with = "time::serde::rfc3339::option",
            skip_serializing_if = "Option::is_none",
            default
        )]
        last_seen: Option<OffsetDateTime>,
    },

    /// Aggregate support availability. Admin presence is reported as a
    /// singleton service: online while at least one operator is connected.
    #[serde(rename = "admin:status")]
    AdminStatus {
        status: PresenceStatus,
        #[serde(
            with = "time::serde::rfc3339::option",
            skip_serializing_if = "Option::is_none",
            default
        )]
        last_seen: Option<OffsetDateTime>,
    },

    /// Admin management side channel (user created/updated)
    #[serde(rename = "user:updated")]
    UserUpdated {
        kind: UserUpdateKind,
        user: UserProfile,
    },

    /// Connection acknowledged
    #[serde(rename = "connected")]
    Connected { session_id: SessionId },

    /// Heartbeat response
    #[serde(rename = "pong")]
    Pong,

    /// Error message
    #[serde(rename = "error")]
    Error { message: String },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Allow unwrap() in tests for cleaner test code
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_request_deserialization() {
        let json = r#"{"type":"call:request","kind":"video"}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::CallRequest { kind, to } => {
                assert_eq!(kind, CallKind::Video);
                assert!(to.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_call_request_with_target() {
        let to = UserId::new();
        let json = format!(r#"{{"type":"call:request","kind":"audio","to":"{to}"}}"#);
        let event: ClientEvent = serde_json::from_str(&json).unwrap();
        match event {
            ClientEvent::CallRequest { kind, to: t } => {
                assert_eq!(kind, CallKind::Audio);
                assert_eq!(t, Some(to));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_call_respond_roundtrip() {
        let to = UserId::new();
        let event = ClientEvent::CallRespond { to, accepted: true };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"call:respond""#));
        let back: ClientEvent = serde_json::from_str(&json).unwrap();
        match back {
            ClientEvent::CallRespond { to: t, accepted } => {
                assert_eq!(t, to);
                assert!(accepted);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_webrtc_ice_carries_opaque_payload() {
        let to = UserId::new();
        let candidate = json!({"candidate": "candidate:1 1 UDP 2122252543 10.0.0.1 54321 typ host"});
        let event = ClientEvent::WebrtcIce {
            to,
            candidate: candidate.clone(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: ClientEvent = serde_json::from_str(&json).unwrap();
        match back {
            ClientEvent::WebrtcIce { candidate: c, .. } => assert_eq!(c, candidate),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_admin_status_serialization() {
        let event = ServerEvent::AdminStatus {
            status: PresenceStatus::Online,
            last_seen: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"admin:status","status":"online"}"#);
    }

    #[test]
    fn test_user_status_with_last_seen() {
        let event = ServerEvent::UserStatus {
            user_id: UserId::new(),
            status: PresenceStatus::Offline,
            last_seen: Some(OffsetDateTime::UNIX_EPOCH),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"user:status""#));
        assert!(json.contains(r#""status":"offline""#));
        assert!(json.contains("1970-01-01"));
    }

    #[test]
    fn test_pong_serialization() {
        let json = serde_json::to_string(&ServerEvent::Pong).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);
    }
}
