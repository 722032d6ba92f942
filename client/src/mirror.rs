//! Scene mirror — the local projection of one room's drawing state.
//!
//! DESIGN
//! ======
//! Applies the same transitions as the server's state machine, with two
//! deliberate differences: ownership is not rechecked (the server already
//! validated the op before sequencing it), and unknown stroke references
//! are logged and dropped instead of erroring — they can only occur in the
//! narrow window around a join, when an envelope races the sync snapshot.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use inkroom_wire::types::{Envelope, ServerOp, Stroke, SyncState};

/// Local replica of a room's stroke state.
#[derive(Debug, Default)]
pub struct SceneMirror {
    strokes: HashMap<String, Stroke>,
    committed: HashSet<String>,
    committed_order: Vec<String>,
    undone: HashSet<String>,
    redo_stack: Vec<String>,
}

impl SceneMirror {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the mirror from a sync snapshot, discarding everything held
    /// so far. Committed order follows the snapshot's stroke order.
    pub fn reset_from_sync(&mut self, sync: &SyncState) {
        self.strokes.clear();
        self.committed.clear();
        self.committed_order.clear();
        self.redo_stack.clear();

        for stroke in &sync.strokes {
            let mut stroke = stroke.clone();
            stroke.committed = true;
            self.committed.insert(stroke.id.clone());
            self.committed_order.push(stroke.id.clone());
            self.strokes.insert(stroke.id.clone(), stroke);
        }
        for stroke in &sync.in_progress {
            let mut stroke = stroke.clone();
            stroke.committed = false;
            self.strokes.insert(stroke.id.clone(), stroke);
        }
        self.undone = sync.undone.iter().cloned().collect();
    }

    /// Apply one in-order envelope.
    pub fn apply(&mut self, env: &Envelope) {
        match &env.op {
            ServerOp::StrokeStart { stroke_id, tool, color, width, x, y } => {
                // Accepted blindly: the server is the sole authority on ids.
                self.strokes.insert(
                    stroke_id.clone(),
                    Stroke {
                        id: stroke_id.clone(),
                        user_id: env.by.clone(),
                        tool: *tool,
                        color: color.clone(),
                        width: *width,
                        points: vec![[*x, *y]],
                        committed: false,
                        created_at: env.ts,
                        updated_at: env.ts,
                    },
                );
            }
            ServerOp::StrokePoints { stroke_id, points } => {
                let Some(stroke) = self.strokes.get_mut(stroke_id) else {
                    warn!(seq = env.seq, %stroke_id, "mirror: points for unknown stroke, dropped");
                    return;
                };
                stroke.points.extend_from_slice(points);
                stroke.updated_at = env.ts;
            }
            ServerOp::StrokeEnd { stroke_id } => {
                let Some(stroke) = self.strokes.get_mut(stroke_id) else {
                    warn!(seq = env.seq, %stroke_id, "mirror: end for unknown stroke, dropped");
                    return;
                };
                if !stroke.committed {
                    stroke.committed = true;
                    stroke.updated_at = env.ts;
                    self.committed.insert(stroke_id.clone());
                    self.committed_order.push(stroke_id.clone());
                }
                self.redo_stack.clear();
                self.undone.remove(stroke_id);
            }
            ServerOp::Undo { stroke_id } => {
                self.undone.insert(stroke_id.clone());
                self.redo_stack.push(stroke_id.clone());
            }
            ServerOp::Redo { stroke_id } => {
                self.undone.remove(stroke_id);
                self.redo_stack.retain(|id| id != stroke_id);
            }
        }
    }

    /// Committed, non-tombstoned strokes in commit order: the scene the
    /// renderer draws.
    #[must_use]
    pub fn active_strokes(&self) -> Vec<&Stroke> {
        self.committed_order
            .iter()
            .filter(|id| !self.undone.contains(*id))
            .filter_map(|id| self.strokes.get(id))
            .collect()
    }

    /// Strokes currently being drawn by some user.
    #[must_use]
    pub fn in_progress(&self) -> Vec<&Stroke> {
        self.strokes.values().filter(|s| !s.committed).collect()
    }

    #[must_use]
    pub fn stroke(&self, stroke_id: &str) -> Option<&Stroke> {
        self.strokes.get(stroke_id)
    }

    #[must_use]
    pub fn is_undone(&self, stroke_id: &str) -> bool {
        self.undone.contains(stroke_id)
    }

    #[must_use]
    pub fn committed_order(&self) -> &[String] {
        &self.committed_order
    }
}

#[cfg(test)]
#[path = "mirror_test.rs"]
mod tests;
