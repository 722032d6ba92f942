//! Reorder buffer — gap-tolerant envelope intake.
//!
//! DESIGN
//! ======
//! Tracks the next expected sequence number and parks early envelopes in a
//! sparse map. When the expected envelope arrives it is applied to the
//! mirror, then any contiguous run already buffered drains after it. Late
//! envelopes (duplicates or pre-sync leftovers) are discarded. A sync
//! snapshot resets everything: missing ranges are never replayed, a full
//! resync takes their place.

use std::collections::BTreeMap;

use tracing::debug;

use inkroom_wire::types::{Envelope, SyncState};

use crate::mirror::SceneMirror;

/// Per-room envelope intake: reorders by `seq` and applies to the mirror.
#[derive(Debug, Default)]
pub struct ReorderBuffer {
    expected_seq: u64,
    pending: BTreeMap<u64, Envelope>,
    mirror: SceneMirror,
}

impl ReorderBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset from a sync snapshot: the mirror is rebuilt, pending envelopes
    /// are dropped, and the next expected seq becomes `sync.seq + 1`.
    pub fn reset_from_sync(&mut self, sync: &SyncState) {
        self.expected_seq = sync.seq + 1;
        self.pending.clear();
        self.mirror.reset_from_sync(sync);
    }

    /// Accept one envelope in any order. Returns how many envelopes were
    /// applied to the mirror as a result (0 when buffered or discarded).
    pub fn on_envelope(&mut self, env: Envelope) -> usize {
        if env.seq < self.expected_seq {
            debug!(seq = env.seq, expected = self.expected_seq, "discarding stale envelope");
            return 0;
        }
        if env.seq > self.expected_seq {
            self.pending.insert(env.seq, env);
            return 0;
        }

        self.mirror.apply(&env);
        self.expected_seq += 1;
        let mut applied = 1;

        // Drain the contiguous run that was waiting on this gap.
        while let Some(next) = self.pending.remove(&self.expected_seq) {
            self.mirror.apply(&next);
            self.expected_seq += 1;
            applied += 1;
        }
        applied
    }

    /// Next sequence number the mirror is waiting for.
    #[must_use]
    pub fn expected_seq(&self) -> u64 {
        self.expected_seq
    }

    /// Envelopes parked ahead of the current gap.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// The replicated scene.
    #[must_use]
    pub fn mirror(&self) -> &SceneMirror {
        &self.mirror
    }
}

#[cfg(test)]
#[path = "buffer_test.rs"]
mod tests;
