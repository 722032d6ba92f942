//! Room — membership, sequencing, and throttled persistence for one room.
//!
//! DESIGN
//! ======
//! A room binds one drawing state to one id and owns the only mutable
//! references to it. Everything mutable lives behind a single tokio mutex:
//! that mutex *is* the room's serialization domain, totally ordering ops,
//! membership changes, and sequence assignment. Envelope fan-out happens
//! under the lock with non-blocking `try_send`, so the order every client
//! observes on its channel equals `seq` order.
//!
//! Snapshot writes never hold the lock: the throttle check and the
//! structural copy happen under it, the disk write after release.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use inkroom_wire::types::{ClientOp, Envelope, SyncState, UserInfo, UserMode};
use inkroom_wire::{now_ms, Frame, EVENT_OP};

use crate::services::drawing::{DrawError, DrawingState, RoomSnapshot};
use crate::services::store::SnapshotStore;

// =============================================================================
// TYPES
// =============================================================================

/// Fixed assignment palette: ten distinct colors, swept first-unused.
const COLOR_PALETTE: [&str; 10] = [
    "#e6194b", "#3cb44b", "#ffe119", "#4363d8", "#f58231", "#911eb4", "#46f0f0", "#f032e6",
    "#bcf60c", "#008080",
];

/// Result of a successfully applied client op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// An envelope was broadcast at this sequence number.
    Broadcast(u64),
    /// No-op undo/redo: nothing broadcast, `seq` unchanged.
    NoOp,
}

/// One live room: drawing state, membership, and the broadcast counter.
pub struct Room {
    id: String,
    store: SnapshotStore,
    persist_interval: Duration,
    inner: Mutex<RoomInner>,
}

struct RoomInner {
    drawing: DrawingState,
    /// Connected members keyed by connection id.
    users: HashMap<Uuid, UserInfo>,
    /// Outgoing frame channel per connection.
    clients: HashMap<Uuid, mpsc::Sender<Frame>>,
    /// Last sequence number broadcast by this room.
    seq: u64,
    last_persist: Instant,
}

// =============================================================================
// LIFECYCLE
// =============================================================================

impl Room {
    /// Create an empty room.
    #[must_use]
    pub fn new(id: impl Into<String>, store: SnapshotStore, persist_interval: Duration) -> Self {
        Self::with_state(id, DrawingState::new(), 0, store, persist_interval)
    }

    /// Rehydrate a room from a persisted snapshot, restoring its `seq`.
    #[must_use]
    pub fn from_snapshot(
        id: impl Into<String>,
        snapshot: &RoomSnapshot,
        store: SnapshotStore,
        persist_interval: Duration,
    ) -> Self {
        Self::with_state(id, DrawingState::restore(snapshot), snapshot.seq, store, persist_interval)
    }

    fn with_state(
        id: impl Into<String>,
        drawing: DrawingState,
        seq: u64,
        store: SnapshotStore,
        persist_interval: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            store,
            persist_interval,
            inner: Mutex::new(RoomInner {
                drawing,
                users: HashMap::new(),
                clients: HashMap::new(),
                seq,
                last_persist: Instant::now(),
            }),
        }
    }

    /// Room id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

// =============================================================================
// MEMBERSHIP
// =============================================================================

impl Room {
    /// Add a member and assign a color: first palette entry not in use, or a
    /// random entry once all ten are taken.
    pub async fn add_user(
        &self,
        conn_id: Uuid,
        user_id: impl Into<String>,
        name: impl Into<String>,
        mode: UserMode,
        tx: mpsc::Sender<Frame>,
    ) -> UserInfo {
        let mut inner = self.inner.lock().await;

        let color = pick_color(&inner.users);
        let user = UserInfo { user_id: user_id.into(), name: name.into(), color, mode };

        inner.users.insert(conn_id, user.clone());
        inner.clients.insert(conn_id, tx);
        info!(room_id = %self.id, %conn_id, user_id = %user.user_id, members = inner.users.len(), "user joined room");
        user
    }

    /// Remove a member. Returns the removed record so the caller can notify
    /// the rest of the room.
    pub async fn remove_user(&self, conn_id: Uuid) -> Option<UserInfo> {
        let mut inner = self.inner.lock().await;
        inner.clients.remove(&conn_id);
        let user = inner.users.remove(&conn_id);
        if let Some(user) = &user {
            info!(room_id = %self.id, %conn_id, user_id = %user.user_id, remaining = inner.users.len(), "user left room");
        }
        user
    }

    /// Number of connected members.
    pub async fn user_count(&self) -> usize {
        self.inner.lock().await.users.len()
    }

    /// Current members, unordered.
    pub async fn users(&self) -> Vec<UserInfo> {
        self.inner.lock().await.users.values().cloned().collect()
    }
}

fn pick_color(users: &HashMap<Uuid, UserInfo>) -> String {
    for color in COLOR_PALETTE {
        if !users.values().any(|u| u.color == color) {
            return color.to_owned();
        }
    }
    use rand::Rng;
    let idx = rand::thread_rng().gen_range(0..COLOR_PALETTE.len());
    COLOR_PALETTE[idx].to_owned()
}

// =============================================================================
// OPS & BROADCAST
// =============================================================================

impl Room {
    /// Apply a validated client op under the room lock.
    ///
    /// On a broadcastable result: bump `seq`, build the envelope, and fan it
    /// out to every member including the sender before releasing the lock.
    /// No-op undo/redo bumps nothing and emits nothing, so every assigned
    /// `seq` corresponds to exactly one observable envelope.
    ///
    /// # Errors
    ///
    /// Propagates [`DrawError`] from the drawing state; the room is
    /// unchanged on error.
    pub async fn apply_op(&self, user_id: &str, op: ClientOp) -> Result<Applied, DrawError> {
        let mut inner = self.inner.lock().await;

        let Some(server_op) = inner.drawing.apply_client_op(user_id, op)? else {
            return Ok(Applied::NoOp);
        };

        inner.seq += 1;
        let envelope = Envelope { seq: inner.seq, op: server_op, by: user_id.to_owned(), ts: now_ms() };
        let frame = Frame::request(EVENT_OP, serde_json::to_value(&envelope).unwrap_or_default())
            .with_room_id(&self.id);

        send_to_members(&self.id, &inner.clients, &frame, None);
        Ok(Applied::Broadcast(inner.seq))
    }

    /// Fan a frame out to members, optionally excluding one connection.
    /// Used for the unsequenced side-channels (cursor, membership events).
    pub async fn broadcast(&self, frame: &Frame, exclude: Option<Uuid>) {
        let inner = self.inner.lock().await;
        send_to_members(&self.id, &inner.clients, frame, exclude);
    }

    /// Full state for a joining client: scene, membership, and `seq`.
    pub async fn sync_state(&self) -> SyncState {
        let inner = self.inner.lock().await;
        let scene = inner.drawing.scene();
        SyncState {
            room_id: self.id.clone(),
            seq: inner.seq,
            users: inner.users.values().cloned().collect(),
            strokes: scene.committed,
            undone: scene.undone,
            in_progress: scene.in_progress,
        }
    }
}

fn send_to_members(
    room_id: &str,
    clients: &HashMap<Uuid, mpsc::Sender<Frame>>,
    frame: &Frame,
    exclude: Option<Uuid>,
) {
    for (conn_id, tx) in clients {
        if exclude == Some(*conn_id) {
            continue;
        }
        // Best-effort: a client whose channel is full loses the frame and
        // recovers via resync.
        if tx.try_send(frame.clone()).is_err() {
            warn!(%room_id, %conn_id, event = %frame.event, "dropping frame for slow client");
        }
    }
}

// =============================================================================
// PERSISTENCE
// =============================================================================

impl Room {
    /// Persist if the throttle window has elapsed. Called after every
    /// successfully broadcast op.
    pub async fn maybe_persist(&self) {
        self.persist(false).await;
    }

    /// Persist unconditionally. Used on last-leave and shutdown so the tail
    /// of committed work is not lost to the throttle window.
    pub async fn persist_now(&self) {
        self.persist(true).await;
    }

    async fn persist(&self, force: bool) {
        // Materialize under the lock, write after release.
        let snapshot = {
            let mut inner = self.inner.lock().await;
            if !force && inner.last_persist.elapsed() < self.persist_interval {
                return;
            }
            inner.last_persist = Instant::now();
            let seq = inner.seq;
            inner.drawing.snapshot(seq)
        };

        if let Err(e) = self.store.save(&self.id, &snapshot).await {
            // Swallowed: the op already succeeded. The next tick retries.
            error!(room_id = %self.id, error = %e, "room snapshot write failed");
        }
    }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
