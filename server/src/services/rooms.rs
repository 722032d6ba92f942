//! Rooms manager — the process-wide directory of live rooms.
//!
//! DESIGN
//! ======
//! Rooms are created on first join, hydrated from any on-disk snapshot, and
//! evicted from memory when the last user disconnects. A single mutex
//! guards the directory; per-room work happens on the room's own lock, so
//! rooms never serialize against each other.
//!
//! ERROR HANDLING
//! ==============
//! A snapshot that fails to load starts the room empty rather than failing
//! the join. Eviction forces one final persist first, so the tail of
//! committed work survives even when the last user leaves inside the
//! throttle window.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::services::room::Room;
use crate::services::store::SnapshotStore;

pub struct RoomsManager {
    store: SnapshotStore,
    persist_interval: Duration,
    rooms: Mutex<HashMap<String, Arc<Room>>>,
}

impl RoomsManager {
    #[must_use]
    pub fn new(store: SnapshotStore, persist_interval: Duration) -> Self {
        Self { store, persist_interval, rooms: Mutex::new(HashMap::new()) }
    }

    /// Resolve a room, creating it on first join. A fresh room is seeded
    /// from its on-disk snapshot when one exists and parses.
    pub async fn get_or_create(&self, room_id: &str) -> Arc<Room> {
        let mut rooms = self.rooms.lock().await;
        if let Some(room) = rooms.get(room_id) {
            return Arc::clone(room);
        }

        let room = match self.store.load(room_id).await {
            Ok(Some(snapshot)) => {
                info!(%room_id, seq = snapshot.seq, strokes = snapshot.strokes.len(), "rehydrated room from snapshot");
                Room::from_snapshot(room_id, &snapshot, self.store.clone(), self.persist_interval)
            }
            Ok(None) => Room::new(room_id, self.store.clone(), self.persist_interval),
            Err(e) => {
                error!(%room_id, error = %e, "snapshot load failed; starting room empty");
                Room::new(room_id, self.store.clone(), self.persist_interval)
            }
        };

        let room = Arc::new(room);
        rooms.insert(room_id.to_owned(), Arc::clone(&room));
        info!(%room_id, "room created");
        room
    }

    /// Evict a room from memory iff its user set is empty, flushing its
    /// state to disk first. The snapshot remains for the next join.
    pub async fn cleanup(&self, room_id: &str) {
        let room = {
            let rooms = self.rooms.lock().await;
            let Some(room) = rooms.get(room_id) else {
                return;
            };
            Arc::clone(room)
        };

        if room.user_count().await > 0 {
            return;
        }

        // Final flush outside the directory lock.
        room.persist_now().await;

        // Re-check after the write: a new user may have joined meanwhile.
        let mut rooms = self.rooms.lock().await;
        if room.user_count().await == 0 {
            rooms.remove(room_id);
            info!(%room_id, "evicted room from memory");
        }
    }

    /// Persist every live room. Shutdown path.
    pub async fn flush_all(&self) {
        let rooms: Vec<Arc<Room>> = {
            let rooms = self.rooms.lock().await;
            rooms.values().map(Arc::clone).collect()
        };

        for room in rooms {
            room.persist_now().await;
        }
    }

    /// Number of rooms currently held in memory.
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }
}

#[cfg(test)]
#[path = "rooms_test.rs"]
mod tests;
