//! Drawing state — the per-room state machine over committed stroke history.
//!
//! DESIGN
//! ======
//! All mutation funnels through [`DrawingState::apply_client_op`], so every
//! invariant is enforced in one place: committed order is append-only, undo
//! tombstones never leave the committed set, and the redo stack only holds
//! ids that are both committed and undone. The caller (the room) owns
//! sequencing; this module decides only *what* happens and *what* to
//! broadcast.
//!
//! ERROR HANDLING
//! ==============
//! Every check runs before the first mutation for that op, so a rejected op
//! leaves the state exactly as it was. Undo/redo with no eligible target is
//! not an error: it returns `Ok(None)` and the caller suppresses the
//! broadcast entirely.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use inkroom_wire::now_ms;
use inkroom_wire::types::{ClientOp, ServerOp, Stroke};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DrawError {
    #[error("stroke id already exists: {0}")]
    DuplicateStroke(String),
    #[error("unknown stroke id: {0}")]
    UnknownStroke(String),
    #[error("stroke is already committed: {0}")]
    AlreadyCommitted(String),
    #[error("stroke {0} belongs to another user")]
    NotOwner(String),
}

impl inkroom_wire::ErrorCode for DrawError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::DuplicateStroke(_) => "E_DUPLICATE_STROKE",
            Self::UnknownStroke(_) => "E_UNKNOWN_STROKE",
            Self::AlreadyCommitted(_) => "E_STROKE_COMMITTED",
            Self::NotOwner(_) => "E_NOT_OWNER",
        }
    }
}

/// Per-room drawing aggregate: stroke registry, committed history, undo
/// tombstones, and the redo stack.
#[derive(Debug, Default)]
pub struct DrawingState {
    /// Every known stroke, in-progress and committed, keyed by id.
    strokes: HashMap<String, Stroke>,
    /// Ids of committed strokes (fast membership).
    committed: HashSet<String>,
    /// Canonical history: ids in commit order. Append-only.
    committed_order: Vec<String>,
    /// Committed strokes currently excluded from the rendered scene.
    undone: HashSet<String>,
    /// Most-recently undone on top; eligible for redo.
    redo_stack: Vec<String>,
}

/// Copy of the drawable scene handed to the sync path.
#[derive(Clone, Debug)]
pub struct SceneView {
    /// Committed strokes, any order.
    pub committed: Vec<Stroke>,
    /// Strokes started but not yet ended.
    pub in_progress: Vec<Stroke>,
    /// Ids of committed strokes currently tombstoned.
    pub undone: Vec<String>,
}

/// On-disk snapshot of a room's committed history.
///
/// In-progress strokes are deliberately omitted: they are owned by live
/// connections and do not survive a restart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub seq: u64,
    /// Committed strokes, in committed order.
    pub strokes: Vec<Stroke>,
    pub undone: Vec<String>,
    pub committed_order: Vec<String>,
    pub redo_stack: Vec<String>,
}

// =============================================================================
// MUTATION
// =============================================================================

impl DrawingState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one validated client op.
    ///
    /// Returns the server op to broadcast, or `None` when the op was a
    /// no-op undo/redo (the caller must then suppress the envelope and
    /// leave `seq` untouched).
    ///
    /// # Errors
    ///
    /// Returns a [`DrawError`] when the op violates stroke lifecycle or
    /// ownership rules; the state is unchanged on error.
    pub fn apply_client_op(
        &mut self,
        user_id: &str,
        op: ClientOp,
    ) -> Result<Option<ServerOp>, DrawError> {
        match op {
            ClientOp::StrokeStart { stroke_id, tool, color, width, x, y } => {
                self.stroke_start(user_id, stroke_id, tool, color, width, x, y)
            }
            ClientOp::StrokePoints { stroke_id, points } => {
                self.stroke_points(user_id, stroke_id, points)
            }
            ClientOp::StrokeEnd { stroke_id } => self.stroke_end(user_id, stroke_id),
            ClientOp::Undo => Ok(self.undo()),
            ClientOp::Redo => Ok(self.redo()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn stroke_start(
        &mut self,
        user_id: &str,
        stroke_id: String,
        tool: inkroom_wire::types::Tool,
        color: String,
        width: u32,
        x: f64,
        y: f64,
    ) -> Result<Option<ServerOp>, DrawError> {
        if self.strokes.contains_key(&stroke_id) {
            return Err(DrawError::DuplicateStroke(stroke_id));
        }

        let now = now_ms();
        self.strokes.insert(
            stroke_id.clone(),
            Stroke {
                id: stroke_id.clone(),
                user_id: user_id.to_owned(),
                tool,
                color: color.clone(),
                width,
                points: vec![[x, y]],
                committed: false,
                created_at: now,
                updated_at: now,
            },
        );

        // A new stroke invalidates redo only when it commits, not here.
        Ok(Some(ServerOp::StrokeStart { stroke_id, tool, color, width, x, y }))
    }

    fn stroke_points(
        &mut self,
        user_id: &str,
        stroke_id: String,
        points: Vec<[f64; 2]>,
    ) -> Result<Option<ServerOp>, DrawError> {
        let stroke = self.writable_stroke(user_id, &stroke_id)?;
        stroke.points.extend_from_slice(&points);
        stroke.updated_at = now_ms();
        Ok(Some(ServerOp::StrokePoints { stroke_id, points }))
    }

    fn stroke_end(&mut self, user_id: &str, stroke_id: String) -> Result<Option<ServerOp>, DrawError> {
        let stroke = self.writable_stroke(user_id, &stroke_id)?;
        stroke.committed = true;
        stroke.updated_at = now_ms();

        self.committed.insert(stroke_id.clone());
        self.committed_order.push(stroke_id.clone());
        // Any commit invalidates pending redos across the whole room.
        self.redo_stack.clear();
        self.undone.remove(&stroke_id);

        Ok(Some(ServerOp::StrokeEnd { stroke_id }))
    }

    /// Tombstone the latest committed, non-undone stroke in global order,
    /// regardless of who drew it or who asked.
    fn undo(&mut self) -> Option<ServerOp> {
        let target = self
            .committed_order
            .iter()
            .rev()
            .find(|id| self.committed.contains(*id) && !self.undone.contains(*id))?
            .clone();

        self.undone.insert(target.clone());
        self.redo_stack.push(target.clone());
        Some(ServerOp::Undo { stroke_id: target })
    }

    /// Re-activate the most recently undone stroke that is still eligible.
    /// Stale stack entries (no longer committed+undone) are discarded.
    fn redo(&mut self) -> Option<ServerOp> {
        while let Some(id) = self.redo_stack.pop() {
            if self.committed.contains(&id) && self.undone.contains(&id) {
                self.undone.remove(&id);
                return Some(ServerOp::Redo { stroke_id: id });
            }
        }
        None
    }

    /// Look up a stroke for mutation, enforcing lifecycle and ownership.
    fn writable_stroke(&mut self, user_id: &str, stroke_id: &str) -> Result<&mut Stroke, DrawError> {
        let stroke = self
            .strokes
            .get_mut(stroke_id)
            .ok_or_else(|| DrawError::UnknownStroke(stroke_id.to_owned()))?;
        if stroke.committed {
            return Err(DrawError::AlreadyCommitted(stroke_id.to_owned()));
        }
        if stroke.user_id != user_id {
            return Err(DrawError::NotOwner(stroke_id.to_owned()));
        }
        Ok(stroke)
    }
}

// =============================================================================
// VIEWS
// =============================================================================

impl DrawingState {
    /// Scene for a late joiner: committed strokes, in-progress strokes, and
    /// the tombstone list. The room layers membership and `seq` on top to
    /// form the sync payload.
    #[must_use]
    pub fn scene(&self) -> SceneView {
        let (committed, in_progress): (Vec<_>, Vec<_>) = self
            .strokes
            .values()
            .cloned()
            .partition(|s| s.committed);

        SceneView {
            committed,
            in_progress,
            undone: self.undone.iter().cloned().collect(),
        }
    }

    /// Durable view at a given sequence number. In-progress strokes are
    /// dropped; committed strokes are emitted in committed order.
    #[must_use]
    pub fn snapshot(&self, seq: u64) -> RoomSnapshot {
        let strokes = self
            .committed_order
            .iter()
            .filter_map(|id| self.strokes.get(id).cloned())
            .collect();

        RoomSnapshot {
            seq,
            strokes,
            undone: self.undone.iter().cloned().collect(),
            committed_order: self.committed_order.clone(),
            redo_stack: self.redo_stack.clone(),
        }
    }

    /// Rebuild from a persisted snapshot. Every stroke is registered as
    /// committed; `committed_order`, `undone`, and `redo_stack` are restored
    /// verbatim. The snapshot's `seq` belongs to the owning room.
    #[must_use]
    pub fn restore(snapshot: &RoomSnapshot) -> Self {
        let mut strokes = HashMap::with_capacity(snapshot.strokes.len());
        let mut committed = HashSet::with_capacity(snapshot.strokes.len());
        for stroke in &snapshot.strokes {
            let mut stroke = stroke.clone();
            stroke.committed = true;
            committed.insert(stroke.id.clone());
            strokes.insert(stroke.id.clone(), stroke);
        }

        Self {
            strokes,
            committed,
            committed_order: snapshot.committed_order.clone(),
            undone: snapshot.undone.iter().cloned().collect(),
            redo_stack: snapshot.redo_stack.clone(),
        }
    }

    /// Stroke lookup for tests and diagnostics.
    #[must_use]
    pub fn stroke(&self, stroke_id: &str) -> Option<&Stroke> {
        self.strokes.get(stroke_id)
    }

    /// Committed history in commit order.
    #[must_use]
    pub fn committed_order(&self) -> &[String] {
        &self.committed_order
    }

    /// Ids of committed strokes currently visible (not tombstoned), in
    /// commit order. This is the rendered scene.
    #[must_use]
    pub fn active_committed(&self) -> Vec<&str> {
        self.committed_order
            .iter()
            .filter(|id| !self.undone.contains(*id))
            .map(String::as_str)
            .collect()
    }

    /// Whether the internal collections agree with each other. Used by
    /// tests after every mutation.
    #[must_use]
    pub fn invariants_hold(&self) -> bool {
        let order_set: HashSet<&String> = self.committed_order.iter().collect();
        let no_dups = order_set.len() == self.committed_order.len();
        let order_matches_committed = order_set.len() == self.committed.len()
            && self.committed.iter().all(|id| order_set.contains(id));
        let flags_match = self
            .strokes
            .values()
            .all(|s| s.committed == self.committed.contains(&s.id));
        let undone_committed = self.undone.iter().all(|id| self.committed.contains(id));
        let redo_eligible = self
            .redo_stack
            .iter()
            .all(|id| self.committed.contains(id) && self.undone.contains(id));

        no_dups && order_matches_committed && flags_match && undone_committed && redo_eligible
    }
}

#[cfg(test)]
#[path = "drawing_test.rs"]
mod tests;
