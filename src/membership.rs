//! Membership tracking
//!
//! Maps connections to the room they are joined to and keeps room member
//! sets and transport broadcast groups in step. Room existence is always
//! answered by the registry; this module only holds back-references.
//!
//! Lock order: connection session → room(s, ascending by code) → transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, error, info};

use crate::error::AppError;
use crate::registry::{RoomHandle, RoomRegistry};
use crate::room::{FileMetadata, Room};
use crate::transport::Transport;
use crate::types::{ClientId, RoomCode};

/// Per-connection state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, not in any room
    Unjoined,
    /// Member of exactly one room
    Joined(RoomCode),
    /// Disconnected; terminal
    Closed,
}

/// Member count of a room, computed under the room lock
///
/// `seq` comes from a process-wide counter and increases with every
/// membership change, so later updates for the same room always compare
/// greater.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceUpdate {
    pub room: RoomCode,
    pub count: usize,
    pub seq: u64,
}

/// Result of a successful join
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    /// Presence of the joined room
    pub joined: PresenceUpdate,
    /// Presence of the room the connection left, if it switched rooms
    pub left: Option<PresenceUpdate>,
    /// Files in the joined room at the moment of joining
    pub files: Vec<FileMetadata>,
}

type SessionSlot = Arc<Mutex<SessionState>>;

/// Connection ↔ room membership
pub struct MembershipTracker {
    registry: Arc<RoomRegistry>,
    transport: Arc<dyn Transport>,
    sessions: RwLock<HashMap<ClientId, SessionSlot>>,
    sequence: AtomicU64,
}

impl MembershipTracker {
    pub fn new(registry: Arc<RoomRegistry>, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry,
            transport,
            sessions: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Start tracking a newly connected client
    pub async fn register(&self, client_id: ClientId) {
        self.sessions
            .write()
            .await
            .entry(client_id)
            .or_insert_with(|| Arc::new(Mutex::new(SessionState::Unjoined)));
    }

    /// Current state of a connection; unknown connections read as closed
    pub async fn state(&self, client_id: ClientId) -> SessionState {
        match self.slot(client_id).await {
            Some(slot) => slot.lock().await.clone(),
            None => SessionState::Closed,
        }
    }

    /// Room the connection is joined to, if any
    pub async fn room_of(&self, client_id: ClientId) -> Option<RoomCode> {
        match self.state(client_id).await {
            SessionState::Joined(code) => Some(code),
            SessionState::Unjoined | SessionState::Closed => None,
        }
    }

    /// Join a connection to a room
    ///
    /// A connection already in another room is moved atomically: both rooms
    /// are locked (in code order) and updated together. Joining the same room
    /// again does not change the count. Fails with `RoomNotFound` without
    /// touching any state when the room is not live.
    pub async fn join(&self, client_id: ClientId, code: &RoomCode) -> Result<JoinOutcome, AppError> {
        let slot = self.slot(client_id).await.ok_or(AppError::ConnectionClosed)?;
        let mut session = slot.lock().await;

        let previous_code = match &*session {
            SessionState::Closed => return Err(AppError::ConnectionClosed),
            SessionState::Joined(prev) if prev != code => Some(prev.clone()),
            SessionState::Joined(_) | SessionState::Unjoined => None,
        };

        let target = self.registry.handle(code).await?;
        let previous: Option<(RoomCode, RoomHandle)> = match previous_code {
            Some(prev) => match self.registry.handle(&prev).await {
                Ok(handle) => Some((prev, handle)),
                Err(_) => {
                    // Occupied rooms are never evicted
                    error!(
                        client = %client_id,
                        room = %prev,
                        "Joined room missing from registry"
                    );
                    None
                }
            },
            None => None,
        };

        let (mut target_room, previous_room) = lock_pair(code, &target, previous.as_ref()).await;

        if target_room.is_expired() {
            return Err(AppError::RoomNotFound(code.clone()));
        }

        let left = match (previous.as_ref(), previous_room) {
            (Some((prev_code, _)), Some(mut prev_room)) => {
                if !prev_room.remove_member(client_id) {
                    debug_assert!(false, "session pointed at a room without the member");
                    error!(client = %client_id, room = %prev_code, "Member set out of sync");
                }
                self.transport.unsubscribe(client_id, prev_code).await;
                info!(client = %client_id, room = %prev_code, "Client left room");
                Some(self.presence(prev_code, &prev_room))
            }
            _ => None,
        };

        if target_room.add_member(client_id) {
            info!(client = %client_id, room = %code, "Client joined room");
        } else {
            debug!(client = %client_id, room = %code, "Client already in room");
        }
        self.transport.subscribe(client_id, code).await;
        let joined = self.presence(code, &target_room);
        // Shares landing after this point see the new member in their recipients
        let files = target_room.files().to_vec();

        *session = SessionState::Joined(code.clone());
        Ok(JoinOutcome {
            joined,
            left,
            files,
        })
    }

    /// Remove a disconnected client from its room, if any
    ///
    /// The connection becomes terminal; later joins for it are rejected with
    /// `ConnectionClosed`. Returns the room's new presence when it was joined.
    pub async fn leave(&self, client_id: ClientId) -> Option<PresenceUpdate> {
        let slot = self.sessions.write().await.remove(&client_id)?;
        let mut session = slot.lock().await;

        let state = std::mem::replace(&mut *session, SessionState::Closed);
        let SessionState::Joined(code) = state else {
            return None;
        };

        let handle = match self.registry.handle(&code).await {
            Ok(handle) => handle,
            Err(_) => {
                error!(client = %client_id, room = %code, "Joined room missing from registry");
                return None;
            }
        };

        let mut room = handle.lock().await;
        if !room.remove_member(client_id) {
            debug_assert!(false, "session pointed at a room without the member");
            error!(client = %client_id, room = %code, "Member set out of sync");
        }
        self.transport.unsubscribe(client_id, &code).await;
        info!(client = %client_id, room = %code, "Client left room");

        Some(self.presence(&code, &room))
    }

    /// Number of tracked connections
    pub async fn connection_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn slot(&self, client_id: ClientId) -> Option<SessionSlot> {
        self.sessions.read().await.get(&client_id).cloned()
    }

    fn presence(&self, code: &RoomCode, room: &Room) -> PresenceUpdate {
        PresenceUpdate {
            room: code.clone(),
            count: room.member_count(),
            seq: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
        }
    }
}

/// Lock the target room and, if present, the previous room in code order
async fn lock_pair<'a>(
    code: &RoomCode,
    target: &'a RoomHandle,
    previous: Option<&'a (RoomCode, RoomHandle)>,
) -> (MutexGuard<'a, Room>, Option<MutexGuard<'a, Room>>) {
    match previous {
        Some((prev_code, prev_handle)) if prev_code < code => {
            let prev = prev_handle.lock().await;
            let target = target.lock().await;
            (target, Some(prev))
        }
        Some((_, prev_handle)) => {
            let target = target.lock().await;
            let prev = prev_handle.lock().await;
            (target, Some(prev))
        }
        None => (target.lock().await, None),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::code::CodeGenerator;
    use crate::transport::ChannelTransport;

    struct Fixture {
        registry: Arc<RoomRegistry>,
        transport: Arc<ChannelTransport>,
        tracker: Arc<MembershipTracker>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(RoomRegistry::new(
            CodeGenerator::default(),
            Duration::from_secs(60),
        ));
        let transport = Arc::new(ChannelTransport::new());
        let tracker = Arc::new(MembershipTracker::new(
            Arc::clone(&registry),
            transport.clone(),
        ));
        Fixture {
            registry,
            transport,
            tracker,
        }
    }

    async fn connect(f: &Fixture) -> ClientId {
        let id = ClientId::new();
        // Nothing is sent at this layer
        let (tx, _rx) = mpsc::unbounded_channel();
        f.transport.register(id, tx).await;
        f.tracker.register(id).await;
        id
    }

    #[tokio::test]
    async fn test_join_counts_members() {
        let f = fixture();
        let code = f.registry.create_room().await.unwrap().code;
        let a = connect(&f).await;
        let b = connect(&f).await;

        let first = f.tracker.join(a, &code).await.unwrap();
        assert_eq!(first.joined.count, 1);
        assert!(first.left.is_none());

        let second = f.tracker.join(b, &code).await.unwrap();
        assert_eq!(second.joined.count, 2);
        assert!(second.joined.seq > first.joined.seq);

        assert_eq!(f.tracker.state(a).await, SessionState::Joined(code.clone()));
        assert_eq!(f.transport.group_members(&code).await.len(), 2);
    }

    #[tokio::test]
    async fn test_rejoin_same_room_is_idempotent() {
        let f = fixture();
        let code = f.registry.create_room().await.unwrap().code;
        let a = connect(&f).await;

        f.tracker.join(a, &code).await.unwrap();
        let again = f.tracker.join(a, &code).await.unwrap();

        assert_eq!(again.joined.count, 1);
        assert!(again.left.is_none());
        assert_eq!(f.registry.get_room(&code).await.unwrap().member_count, 1);
    }

    #[tokio::test]
    async fn test_join_other_room_moves_membership() {
        let f = fixture();
        let first = f.registry.create_room().await.unwrap().code;
        let second = f.registry.create_room().await.unwrap().code;
        let a = connect(&f).await;
        let b = connect(&f).await;
        f.tracker.join(a, &first).await.unwrap();
        f.tracker.join(b, &first).await.unwrap();

        let outcome = f.tracker.join(a, &second).await.unwrap();

        assert_eq!(outcome.joined.room, second);
        assert_eq!(outcome.joined.count, 1);
        let left = outcome.left.unwrap();
        assert_eq!(left.room, first);
        assert_eq!(left.count, 1);

        assert_eq!(f.registry.get_room(&first).await.unwrap().member_count, 1);
        assert_eq!(f.tracker.room_of(a).await, Some(second.clone()));
        assert!(!f.transport.group_members(&first).await.contains(&a));
        assert!(f.transport.group_members(&second).await.contains(&a));
    }

    #[tokio::test]
    async fn test_join_unknown_room_changes_nothing() {
        let f = fixture();
        let code = f.registry.create_room().await.unwrap().code;
        let a = connect(&f).await;
        f.tracker.join(a, &code).await.unwrap();

        let missing = RoomCode::parse("ZZZZZZ").unwrap();
        let result = f.tracker.join(a, &missing).await;

        assert!(matches!(result, Err(AppError::RoomNotFound(c)) if c == missing));
        assert_eq!(f.tracker.room_of(a).await, Some(code.clone()));
        assert_eq!(f.registry.get_room(&code).await.unwrap().member_count, 1);
    }

    #[tokio::test]
    async fn test_leave_decrements_once() {
        let f = fixture();
        let code = f.registry.create_room().await.unwrap().code;
        let a = connect(&f).await;
        let b = connect(&f).await;
        f.tracker.join(a, &code).await.unwrap();
        f.tracker.join(b, &code).await.unwrap();

        let update = f.tracker.leave(a).await.unwrap();
        assert_eq!(update.count, 1);
        assert_eq!(update.room, code);

        // Second disconnect notification is a no-op
        assert!(f.tracker.leave(a).await.is_none());
        assert_eq!(f.registry.get_room(&code).await.unwrap().member_count, 1);
        assert_eq!(f.tracker.state(a).await, SessionState::Closed);
    }

    #[tokio::test]
    async fn test_leave_unjoined_is_noop() {
        let f = fixture();
        let a = connect(&f).await;

        assert!(f.tracker.leave(a).await.is_none());
        assert_eq!(f.tracker.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_join_after_disconnect_rejected() {
        let f = fixture();
        let code = f.registry.create_room().await.unwrap().code;
        let a = connect(&f).await;
        f.tracker.leave(a).await;

        let result = f.tracker.join(a, &code).await;
        assert!(matches!(result, Err(AppError::ConnectionClosed)));
        assert_eq!(f.registry.get_room(&code).await.unwrap().member_count, 0);
    }

    #[tokio::test]
    async fn test_join_racing_disconnect_settles_once() {
        let f = fixture();
        let code = f.registry.create_room().await.unwrap().code;

        for _ in 0..50 {
            let a = connect(&f).await;
            let join = {
                let tracker = Arc::clone(&f.tracker);
                let code = code.clone();
                tokio::spawn(async move { tracker.join(a, &code).await })
            };
            let leave = {
                let tracker = Arc::clone(&f.tracker);
                tokio::spawn(async move { tracker.leave(a).await })
            };
            let _ = join.await.unwrap();
            let _ = leave.await.unwrap();

            assert_eq!(f.tracker.state(a).await, SessionState::Closed);
            assert_eq!(f.registry.get_room(&code).await.unwrap().member_count, 0);
        }
    }

    #[tokio::test]
    async fn test_concurrent_joins_reach_full_count() {
        let f = fixture();
        let code = f.registry.create_room().await.unwrap().code;
        let mut clients = Vec::new();
        for _ in 0..32 {
            clients.push(connect(&f).await);
        }

        let tasks: Vec<_> = clients
            .iter()
            .map(|&id| {
                let tracker = Arc::clone(&f.tracker);
                let code = code.clone();
                tokio::spawn(async move { tracker.join(id, &code).await.unwrap() })
            })
            .collect();

        let mut updates = Vec::new();
        for task in tasks {
            updates.push(task.await.unwrap().joined);
        }

        // Ordered by sequence, counts go 1..=32 with no gaps
        updates.sort_by_key(|u| u.seq);
        let counts: Vec<usize> = updates.iter().map(|u| u.count).collect();
        assert_eq!(counts, (1..=32).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_crossing_room_switches_do_not_deadlock() {
        let f = fixture();
        let first = f.registry.create_room().await.unwrap().code;
        let second = f.registry.create_room().await.unwrap().code;
        let a = connect(&f).await;
        let b = connect(&f).await;
        f.tracker.join(a, &first).await.unwrap();
        f.tracker.join(b, &second).await.unwrap();

        for _ in 0..100 {
            let ta = {
                let tracker = Arc::clone(&f.tracker);
                let (from, to) = (first.clone(), second.clone());
                tokio::spawn(async move {
                    tracker.join(a, &to).await.unwrap();
                    tracker.join(a, &from).await.unwrap();
                })
            };
            let tb = {
                let tracker = Arc::clone(&f.tracker);
                let (from, to) = (second.clone(), first.clone());
                tokio::spawn(async move {
                    tracker.join(b, &to).await.unwrap();
                    tracker.join(b, &from).await.unwrap();
                })
            };
            tokio::time::timeout(Duration::from_secs(5), async {
                ta.await.unwrap();
                tb.await.unwrap();
            })
            .await
            .unwrap();
        }

        assert_eq!(f.registry.get_room(&first).await.unwrap().member_count, 1);
        assert_eq!(f.registry.get_room(&second).await.unwrap().member_count, 1);
    }
}
