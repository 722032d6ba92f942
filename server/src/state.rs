//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into axum handlers via the `State` extractor. It
//! holds the rooms directory and the snapshot store; per-room mutable state
//! lives inside the rooms themselves, each behind its own lock.

use std::sync::Arc;
use std::time::Duration;

use crate::services::rooms::RoomsManager;
use crate::services::store::SnapshotStore;

/// Default throttle window between room snapshot writes.
pub const DEFAULT_PERSIST_INTERVAL: Duration = Duration::from_millis(2000);

/// Shared application state. Clone is required by axum; the rooms directory
/// is Arc-wrapped, the store handle is a cheap path clone.
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RoomsManager>,
    pub store: SnapshotStore,
}

impl AppState {
    #[must_use]
    pub fn new(store: SnapshotStore, persist_interval: Duration) -> Self {
        Self {
            rooms: Arc::new(RoomsManager::new(store.clone(), persist_interval)),
            store,
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
