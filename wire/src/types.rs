//! Typed payloads for the drawing protocol.
//!
//! These are the payload shapes carried inside [`Frame`](crate::Frame) data:
//! client drawing operations, the server ops they become after sequencing,
//! the broadcast envelope, and the sync snapshot sent to late joiners.
//! Serialized field names are camelCase to match the external protocol.

use serde::{Deserialize, Serialize};

/// A 2D canvas point as an `[x, y]` pair.
pub type Point = [f64; 2];

/// Drawing tool attached to a stroke at creation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Brush,
    Eraser,
    Rectangle,
    Circle,
    Square,
}

impl Tool {
    /// Parse a tool from its wire name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "brush" => Some(Self::Brush),
            "eraser" => Some(Self::Eraser),
            "rectangle" => Some(Self::Rectangle),
            "circle" => Some(Self::Circle),
            "square" => Some(Self::Square),
            _ => None,
        }
    }
}

/// The atomic unit of drawing history.
///
/// Once committed, everything except `updated_at` is immutable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    /// Stable id chosen by the creating client.
    pub id: String,
    /// Owning user; only the owner may extend or end the stroke.
    pub user_id: String,
    pub tool: Tool,
    /// Semantically ignored for the eraser tool.
    pub color: String,
    /// Brush width, clamped to 1..=64 at validation time.
    pub width: u32,
    pub points: Vec<Point>,
    pub committed: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A validated, normalized operation from a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientOp {
    StrokeStart {
        stroke_id: String,
        tool: Tool,
        color: String,
        width: u32,
        x: f64,
        y: f64,
    },
    StrokePoints {
        stroke_id: String,
        points: Vec<Point>,
    },
    StrokeEnd {
        stroke_id: String,
    },
    Undo,
    Redo,
}

/// An operation as broadcast by the server.
///
/// Stroke ops echo the client op; undo/redo carry the stroke id the server
/// chose as the target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerOp {
    StrokeStart {
        stroke_id: String,
        tool: Tool,
        color: String,
        width: u32,
        x: f64,
        y: f64,
    },
    StrokePoints {
        stroke_id: String,
        points: Vec<Point>,
    },
    StrokeEnd {
        stroke_id: String,
    },
    Undo {
        stroke_id: String,
    },
    Redo {
        stroke_id: String,
    },
}

/// The unit of sequenced replication: one server op plus its room-global
/// position and provenance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub seq: u64,
    pub op: ServerOp,
    /// User id of the op's author.
    pub by: String,
    /// Wall-clock milliseconds at broadcast time.
    pub ts: i64,
}

/// Whether a room member may issue drawing operations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserMode {
    #[default]
    Edit,
    View,
}

/// A room member as published in sync and membership events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: String,
    pub name: String,
    pub color: String,
    pub mode: UserMode,
}

/// Full room state sent to a joining or reconnecting client: everything
/// needed to render the scene and seed the reorder buffer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub room_id: String,
    /// Last sequence number broadcast by the room; the reorder buffer
    /// expects `seq + 1` next.
    pub seq: u64,
    pub users: Vec<UserInfo>,
    /// Committed strokes, any order.
    pub strokes: Vec<Stroke>,
    /// Ids of committed strokes currently tombstoned.
    pub undone: Vec<String>,
    /// Strokes started but not yet ended.
    pub in_progress: Vec<Stroke>,
}

/// Cursor position fan-out payload (server → client form).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorPos {
    pub user_id: String,
    pub x: f64,
    pub y: f64,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
