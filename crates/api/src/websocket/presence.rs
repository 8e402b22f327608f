//! Presence registry
//!
//! Process-wide table of currently connected identities and the source
//! of truth for online/offline queries. Registration joins the
//! own-identity room (plus `admins` for operators) and emits the
//! presence notifications:
//!
//! - user connect/disconnect -> `user:status` to the admins room
//! - zero-to-one admin transition -> `admin:status {online}` to everyone
//! - one-to-zero admin transition -> `admin:status {offline}` to everyone
//!
//! Admin presence is a pooled signal: end-users care whether support is
//! reachable, not which operator is connected.
//!
//! All mutations and the broadcast decisions they trigger happen under a
//! single write lock, so two admins disconnecting at the same time can
//! never both emit (or both suppress) the offline broadcast. Lock order
//! is registry before rooms; no path takes the registry lock while
//! holding a room lock.

use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use helplink_shared::{
    ChatStore, Identity, PresenceStatus, Role, ServerEvent, SessionId, UserId,
};

use super::connection::Connection;
use super::room::{RoomId, RoomManager};

/// One live connection's presence record
#[derive(Clone)]
pub struct PresenceEntry {
    pub identity: Identity,
    pub conn: Arc<Connection>,
    pub joined_at: OffsetDateTime,
}

#[derive(Default)]
struct Inner {
    /// All live entries, keyed by session
    entries: HashMap<SessionId, PresenceEntry>,
    /// Plain users only: reconnects replace, not append
    user_sessions: HashMap<UserId, SessionId>,
}

/// Process-wide presence table
pub struct PresenceRegistry {
    inner: RwLock<Inner>,
    rooms: Arc<RoomManager>,
    store: Arc<dyn ChatStore>,
}

impl PresenceRegistry {
    pub fn new(rooms: Arc<RoomManager>, store: Arc<dyn ChatStore>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            rooms,
            store,
        }
    }

    /// Record a connection as online and emit the resulting presence
    /// notifications. Idempotent per session; a plain user reconnect
    /// replaces the previous entry.
    pub async fn register(&self, conn: Arc<Connection>) {
        let identity = conn.identity.clone();
        let session_id = conn.session_id;

        let mut inner = self.inner.write().await;
        if inner.entries.contains_key(&session_id) {
            return;
        }

        // Reconnect replaces: drop the previous entry for this user
        if identity.role == Role::User {
            if let Some(stale) = inner.user_sessions.insert(identity.id, session_id) {
                inner.entries.remove(&stale);
                self.rooms.remove_connection(stale).await;
                tracing::debug!(user_id = %identity.id, stale_session = %stale, "Replaced stale presence entry");
            }
        }

        let was_admin_online = admin_online(&inner);
        inner.entries.insert(
            session_id,
            PresenceEntry {
                identity: identity.clone(),
                conn: Arc::clone(&conn),
                joined_at: OffsetDateTime::now_utc(),
            },
        );

        self.rooms.join(RoomId::User(identity.id), Arc::clone(&conn)).await;

        tracing::info!(
            session_id = %session_id,
            user_id = %identity.id,
            username = %identity.username,
            role = ?identity.role,
            total_connections = inner.entries.len(),
            "Connection registered"
        );

        match identity.role {
            Role::Admin => {
                self.rooms.join(RoomId::Admins, Arc::clone(&conn)).await;
                // Broadcast only on the zero-to-one transition
                if !was_admin_online {
                    self.rooms
                        .broadcast_all(ServerEvent::AdminStatus {
                            status: PresenceStatus::Online,
                            last_seen: None,
                        })
                        .await;
                }
            }
            Role::User => {
                self.rooms
                    .emit(
                        RoomId::Admins,
                        ServerEvent::UserStatus {
                            user_id: identity.id,
                            status: PresenceStatus::Online,
                            last_seen: None,
                        },
                    )
                    .await;

                // Tell just this user the current aggregate support status
                if was_admin_online {
                    let _ = conn.send(ServerEvent::AdminStatus {
                        status: PresenceStatus::Online,
                        last_seen: None,
                    });
                }
            }
        }
    }

    /// Remove a connection and emit the resulting presence notifications.
    /// Idempotent: unregistering an unknown or already-removed session is
    /// a no-op. `last_seen` is persisted after the lock is released;
    /// persistence failure never blocks cleanup.
    pub async fn unregister(&self, session_id: SessionId) {
        let last_seen = OffsetDateTime::now_utc();
        let identity;

        {
            let mut inner = self.inner.write().await;
            let Some(entry) = inner.entries.remove(&session_id) else {
                return;
            };
            identity = entry.identity;

            if identity.role == Role::User {
                // Only clear the index if it still points at this session
                if inner.user_sessions.get(&identity.id) == Some(&session_id) {
                    inner.user_sessions.remove(&identity.id);
                }
            }

            self.rooms.remove_connection(session_id).await;

            tracing::info!(
                session_id = %session_id,
                user_id = %identity.id,
                remaining_connections = inner.entries.len(),
                "Connection unregistered"
            );

            match identity.role {
                Role::User => {
                    self.rooms
                        .emit(
                            RoomId::Admins,
                            ServerEvent::UserStatus {
                                user_id: identity.id,
                                status: PresenceStatus::Offline,
                                last_seen: Some(last_seen),
                            },
                        )
                        .await;
                }
                Role::Admin => {
                    // Broadcast only on the one-to-zero transition
                    if !admin_online(&inner) {
                        self.rooms
                            .broadcast_all(ServerEvent::AdminStatus {
                                status: PresenceStatus::Offline,
                                last_seen: Some(last_seen),
                            })
                            .await;
                    }
                }
            }
        }

        // Durability point, outside the lock: best-effort only
        if let Err(e) = self.store.persist_last_seen(identity.id, last_seen).await {
            tracing::warn!(
                error = %e,
                user_id = %identity.id,
                "Failed to persist last_seen on disconnect"
            );
        }
    }

    /// Whether any connection exists for this identity
    pub async fn is_online(&self, user_id: UserId) -> bool {
        let inner = self.inner.read().await;
        inner.entries.values().any(|e| e.identity.id == user_id)
    }

    /// Identities of all currently connected admins
    pub async fn online_admins(&self) -> Vec<Identity> {
        let inner = self.inner.read().await;
        inner
            .entries
            .values()
            .filter(|e| e.identity.role == Role::Admin)
            .map(|e| e.identity.clone())
            .collect()
    }

    /// Total number of live connections
    pub async fn connection_count(&self) -> usize {
        let inner = self.inner.read().await;
        inner.entries.len()
    }
}

fn admin_online(inner: &Inner) -> bool {
    inner
        .entries
        .values()
        .any(|e| e.identity.role == Role::Admin)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Allow unwrap() in tests for cleaner test code
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use tokio::sync::mpsc;

    fn registry() -> (Arc<PresenceRegistry>, Arc<MemoryStore>) {
        let rooms = Arc::new(RoomManager::new());
        let store = Arc::new(MemoryStore::new());
        (
            Arc::new(PresenceRegistry::new(rooms, Arc::clone(&store) as Arc<dyn ChatStore>)),
            store,
        )
    }

    fn connect(
        store: &MemoryStore,
        username: &str,
        role: Role,
    ) -> (Arc<Connection>, mpsc::UnboundedReceiver<ServerEvent>) {
        let user = store.add_user(username, role);
        let (tx, rx) = mpsc::unbounded_channel();
        let identity = Identity {
            id: user.id,
            username: user.username,
            role,
        };
        (Arc::new(Connection::new(identity, tx)), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn admin_status_count(events: &[ServerEvent], status: PresenceStatus) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, ServerEvent::AdminStatus { status: s, .. } if *s == status))
            .count()
    }

    #[tokio::test]
    async fn test_admin_online_broadcast_exactly_once_per_transition() {
        let (registry, store) = registry();
        let (user_conn, mut user_rx) = connect(&store, "alice", Role::User);
        registry.register(Arc::clone(&user_conn)).await;
        drain(&mut user_rx);

        let (admin1, _a1rx) = connect(&store, "op1", Role::Admin);
        let (admin2, _a2rx) = connect(&store, "op2", Role::Admin);

        // zero -> one: broadcast
        registry.register(Arc::clone(&admin1)).await;
        let events = drain(&mut user_rx);
        assert_eq!(admin_status_count(&events, PresenceStatus::Online), 1);

        // one -> two: silent
        registry.register(Arc::clone(&admin2)).await;
        assert_eq!(
            admin_status_count(&drain(&mut user_rx), PresenceStatus::Online),
            0
        );

        // two -> one: silent
        registry.unregister(admin1.session_id).await;
        assert_eq!(
            admin_status_count(&drain(&mut user_rx), PresenceStatus::Offline),
            0
        );

        // one -> zero: broadcast, with last_seen
        registry.unregister(admin2.session_id).await;
        let events = drain(&mut user_rx);
        assert_eq!(admin_status_count(&events, PresenceStatus::Offline), 1);
        assert!(events.iter().any(|e| matches!(
            e,
            ServerEvent::AdminStatus {
                status: PresenceStatus::Offline,
                last_seen: Some(_),
            }
        )));
    }

    #[tokio::test]
    async fn test_user_status_goes_to_admins_only() {
        let (registry, store) = registry();
        let (admin, mut admin_rx) = connect(&store, "op", Role::Admin);
        let (observer, mut observer_rx) = connect(&store, "bob", Role::User);
        registry.register(Arc::clone(&admin)).await;
        registry.register(Arc::clone(&observer)).await;
        drain(&mut admin_rx);
        drain(&mut observer_rx);

        let (user, _user_rx) = connect(&store, "alice", Role::User);
        registry.register(Arc::clone(&user)).await;

        let admin_events = drain(&mut admin_rx);
        assert!(admin_events.iter().any(|e| matches!(
            e,
            ServerEvent::UserStatus {
                status: PresenceStatus::Online,
                ..
            }
        )));
        let observer_events = drain(&mut observer_rx);
        assert!(!observer_events
            .iter()
            .any(|e| matches!(e, ServerEvent::UserStatus { .. })));
    }

    #[tokio::test]
    async fn test_new_user_learns_current_admin_status() {
        let (registry, store) = registry();
        let (admin, _admin_rx) = connect(&store, "op", Role::Admin);
        registry.register(admin).await;

        let (user, mut user_rx) = connect(&store, "alice", Role::User);
        registry.register(user).await;

        let events = drain(&mut user_rx);
        assert_eq!(admin_status_count(&events, PresenceStatus::Online), 1);
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let (registry, store) = registry();
        let (admin, _rx) = connect(&store, "op", Role::Admin);
        let (user, mut user_rx) = connect(&store, "alice", Role::User);
        registry.register(Arc::clone(&admin)).await;
        registry.register(Arc::clone(&user)).await;
        drain(&mut user_rx);

        registry.unregister(admin.session_id).await;
        let first = drain(&mut user_rx);
        assert_eq!(admin_status_count(&first, PresenceStatus::Offline), 1);

        // Second unregister of the same session must emit nothing
        registry.unregister(admin.session_id).await;
        let second = drain(&mut user_rx);
        assert_eq!(admin_status_count(&second, PresenceStatus::Offline), 0);
    }

    #[tokio::test]
    async fn test_user_reconnect_replaces_entry() {
        let (registry, store) = registry();
        let user = store.add_user("alice", Role::User);
        let identity = Identity {
            id: user.id,
            username: user.username.clone(),
            role: Role::User,
        };

        let (tx1, _rx1) = mpsc::unbounded_channel();
        let first = Arc::new(Connection::new(identity.clone(), tx1));
        let (tx2, _rx2) = mpsc::unbounded_channel();
        let second = Arc::new(Connection::new(identity, tx2));

        registry.register(Arc::clone(&first)).await;
        registry.register(Arc::clone(&second)).await;

        assert_eq!(registry.connection_count().await, 1);
        assert!(registry.is_online(user.id).await);

        // Late disconnect of the stale socket must not knock the user offline
        registry.unregister(first.session_id).await;
        assert!(registry.is_online(user.id).await);
    }

    #[tokio::test]
    async fn test_register_is_idempotent_per_session() {
        let (registry, store) = registry();
        let (admin, _rx) = connect(&store, "op", Role::Admin);

        registry.register(Arc::clone(&admin)).await;
        registry.register(Arc::clone(&admin)).await;
        assert_eq!(registry.connection_count().await, 1);
        assert_eq!(registry.online_admins().await.len(), 1);
    }

    #[tokio::test]
    async fn test_last_seen_persisted_on_disconnect() {
        let (registry, store) = registry();
        let (user, _rx) = connect(&store, "alice", Role::User);
        let user_id = user.identity.id;
        registry.register(Arc::clone(&user)).await;

        assert!(store.last_seen(user_id).is_none());
        registry.unregister(user.session_id).await;
        assert!(store.last_seen(user_id).is_some());
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_block_cleanup() {
        let (registry, store) = registry();
        let (user, _rx) = connect(&store, "alice", Role::User);
        registry.register(Arc::clone(&user)).await;

        store.fail_writes(true);
        registry.unregister(user.session_id).await;
        assert_eq!(registry.connection_count().await, 0);
    }
}
