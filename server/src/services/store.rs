//! Snapshot store — atomic per-room snapshot files under a data directory.
//!
//! DESIGN
//! ======
//! One JSON file per room, keyed by a sanitized room id. Writes go to a
//! sibling temp path and are renamed over the final path, so readers never
//! observe a torn file. Reads treat both missing and malformed files as "no
//! prior state": a corrupt snapshot must never prevent a room from booting.
//!
//! Room ids that differ only in characters outside `[A-Za-z0-9_-]` sanitize
//! to the same file name and will share a snapshot. There is no collision
//! check.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::warn;

use crate::services::drawing::RoomSnapshot;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("snapshot i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Handle to the on-disk snapshot directory. Cheap to clone.
#[derive(Clone, Debug)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    /// Create a store rooted at `data_dir`. The directory itself is created
    /// lazily on the first write.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { root: data_dir.into() }
    }

    /// Write a room snapshot atomically (temp file + rename).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on serialization or filesystem failure. The
    /// caller logs and continues; the next persist tick retries.
    pub async fn save(&self, room_id: &str, snapshot: &RoomSnapshot) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).await?;

        let path = self.path_for(room_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(snapshot)?;

        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Read a room snapshot. Missing and malformed files both yield
    /// `Ok(None)`; only unexpected I/O failures surface as errors.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] for filesystem failures other than
    /// "not found".
    pub async fn load(&self, room_id: &str) -> Result<Option<RoomSnapshot>, StoreError> {
        let path = self.path_for(room_id);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!(%room_id, path = %path.display(), error = %e, "discarding malformed room snapshot");
                Ok(None)
            }
        }
    }

    /// Resolved snapshot path for a room id.
    #[must_use]
    pub fn path_for(&self, room_id: &str) -> PathBuf {
        self.root.join(format!("room_{}.json", sanitize_room_id(room_id)))
    }

    /// Root data directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
fn sanitize_room_id(room_id: &str) -> String {
    room_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
