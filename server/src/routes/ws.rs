//! WebSocket handler — the per-connection session dispatcher.
//!
//! DESIGN
//! ======
//! On upgrade, generates a connection ID and enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by event name
//! - Broadcast frames from room peers → forward to the socket
//!
//! Handlers validate, call into the room, and return the frames owed to the
//! sender. Sequenced fan-out is *not* done here: the room broadcasts
//! envelopes under its own lock so the order on every peer channel equals
//! `seq` order. This layer only fans out the unsequenced side-channels
//! (cursor, membership events).
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → `unjoined` session
//! 2. `join` → bind room, emit sync to the joiner, `user_joined` to peers
//! 3. `msg` → validate → apply → envelope broadcast + ack
//! 4. Close → `user_left` to peers → rooms cleanup (eviction + final flush)

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use inkroom_wire::types::{CursorPos, UserMode};
use inkroom_wire::{
    decode_frame, encode_frame, Frame, Status, EVENT_CURSOR, EVENT_JOIN, EVENT_MSG,
    EVENT_SYNC, EVENT_USER_JOINED, EVENT_USER_LEFT,
};

use crate::services::room::{Applied, Room};
use crate::services::validate;
use crate::state::AppState;

// =============================================================================
// TYPES
// =============================================================================

/// Display names are trimmed and cut to this many code units.
const NAME_MAX_CHARS: usize = 32;
/// Client-supplied ids are cut to this many code units.
const CLIENT_ID_MAX_CHARS: usize = 64;
/// Per-connection outbound queue; slow clients drop frames and resync.
const OUTBOUND_QUEUE: usize = 256;

#[derive(Debug, thiserror::Error)]
enum WsError {
    #[error("join a room first")]
    NotJoined,
    #[error("view-only users cannot modify the canvas")]
    ViewOnly,
}

impl inkroom_wire::ErrorCode for WsError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotJoined => "E_NOT_JOINED",
            Self::ViewOnly => "E_VIEW_ONLY",
        }
    }
}

/// Per-connection state machine: `unjoined` until a successful join.
#[derive(Default)]
struct Session {
    joined: Option<JoinedRoom>,
}

struct JoinedRoom {
    room: Arc<Room>,
    user_id: String,
    mode: UserMode,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();

    // Per-connection channel for frames broadcast by room peers.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(OUTBOUND_QUEUE);
    let mut session = Session::default();

    info!(%conn_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                let req = match msg {
                    Message::Binary(bytes) => parse_binary(conn_id, &bytes),
                    Message::Text(text) => parse_text(conn_id, &text),
                    Message::Close(_) => break,
                    _ => None,
                };
                let Some(req) = req else { continue };

                let replies = process_frame(&state, &mut session, conn_id, &client_tx, req).await;
                for frame in replies {
                    if send_frame(&mut socket, &frame).await.is_err() {
                        break;
                    }
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    // Notify peers and release the room BEFORE the socket drops.
    leave_current_room(&state, &mut session, conn_id).await;
    info!(%conn_id, "ws: client disconnected");
}

fn parse_binary(conn_id: Uuid, bytes: &[u8]) -> Option<Frame> {
    match decode_frame(bytes) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(%conn_id, error = %e, "ws: invalid binary frame");
            None
        }
    }
}

fn parse_text(conn_id: Uuid, text: &str) -> Option<Frame> {
    match serde_json::from_str(text) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(%conn_id, error = %e, "ws: invalid json frame");
            None
        }
    }
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Process one inbound frame and return the frames owed to the sender.
///
/// Kept free of socket concerns so tests can drive the dispatcher directly
/// with seeded state and mpsc receivers.
async fn process_frame(
    state: &AppState,
    session: &mut Session,
    conn_id: Uuid,
    client_tx: &mpsc::Sender<Frame>,
    req: Frame,
) -> Vec<Frame> {
    let is_cursor = req.event == EVENT_CURSOR;
    if !is_cursor {
        info!(%conn_id, id = %req.id, event = %req.event, "ws: recv frame");
    }

    match req.event.as_str() {
        EVENT_JOIN => handle_join(state, session, conn_id, client_tx, &req).await,
        EVENT_MSG => handle_msg(session, &req).await,
        EVENT_CURSOR => {
            handle_cursor(session, conn_id, &req).await;
            Vec::new()
        }
        other => vec![req.error(format!("unknown event: {other}"))],
    }
}

// =============================================================================
// JOIN
// =============================================================================

async fn handle_join(
    state: &AppState,
    session: &mut Session,
    conn_id: Uuid,
    client_tx: &mpsc::Sender<Frame>,
    req: &Frame,
) -> Vec<Frame> {
    let Some(room_id) = req.room_id.clone().or_else(|| {
        req.data
            .get("roomId")
            .and_then(Value::as_str)
            .map(str::to_owned)
    }) else {
        return vec![req.error("roomId required")];
    };
    if room_id.is_empty() {
        return vec![req.error("roomId required")];
    }

    let user_id = resolve_user_id(&req.data, conn_id);
    let name = resolve_name(&req.data, &user_id);
    let mode = match req.data.get("mode").and_then(Value::as_str) {
        Some("view") => UserMode::View,
        _ => UserMode::Edit,
    };

    // Joining while joined parts the old room first.
    leave_current_room(state, session, conn_id).await;

    let room = state.rooms.get_or_create(&room_id).await;
    let user = room
        .add_user(conn_id, &user_id, &name, mode, client_tx.clone())
        .await;

    let sync = Frame::request(
        EVENT_SYNC,
        serde_json::to_value(room.sync_state().await).unwrap_or_default(),
    )
    .with_room_id(&room_id);

    let joined_frame =
        Frame::request(EVENT_USER_JOINED, json!({ "user": user })).with_room_id(&room_id);
    room.broadcast(&joined_frame, Some(conn_id)).await;

    session.joined = Some(JoinedRoom { room, user_id, mode });

    let ack = req.done_with(json!({ "roomId": room_id, "user": user }));
    vec![sync, ack]
}

/// `clientId` if present and non-empty (cut to 64 code units), else the
/// connection id.
fn resolve_user_id(data: &Value, conn_id: Uuid) -> String {
    data.get("clientId")
        .and_then(Value::as_str)
        .map(|id| truncate_chars(id, CLIENT_ID_MAX_CHARS))
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| conn_id.to_string())
}

/// Trimmed, truncated display name; empty falls back to `User-<id prefix>`.
fn resolve_name(data: &Value, user_id: &str) -> String {
    let name = data
        .get("name")
        .and_then(Value::as_str)
        .map(|n| truncate_chars(n.trim(), NAME_MAX_CHARS))
        .unwrap_or_default();

    if name.is_empty() {
        format!("User-{}", truncate_chars(user_id, 4))
    } else {
        name
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// =============================================================================
// OPS
// =============================================================================

async fn handle_msg(session: &Session, req: &Frame) -> Vec<Frame> {
    let Some(joined) = &session.joined else {
        return vec![req.error_from(&WsError::NotJoined)];
    };

    // View-mode writers are stopped here; the drawing state never sees the
    // op. Checked on the raw payload so it cannot be bypassed by a payload
    // the validator would normalize differently.
    if joined.mode == UserMode::View && is_write_op(&req.data) {
        return vec![req.error_from(&WsError::ViewOnly)];
    }

    let op = match validate::validate_op(&req.data) {
        Ok(op) => op,
        Err(e) => return vec![req.error_from(&e)],
    };

    match joined.room.apply_op(&joined.user_id, op).await {
        Ok(Applied::Broadcast(seq)) => {
            joined.room.maybe_persist().await;
            vec![req.done_with(json!({ "seq": seq }))]
        }
        Ok(Applied::NoOp) => vec![req.done_with(json!({ "noOp": true }))],
        Err(e) => vec![req.error_from(&e)],
    }
}

fn is_write_op(data: &Value) -> bool {
    matches!(
        data.get("t").and_then(Value::as_str),
        Some("stroke_start" | "stroke_points" | "stroke_end" | "undo" | "redo")
    )
}

// =============================================================================
// CURSOR
// =============================================================================

/// Cursor side-channel: no ack, no sequence, no persistence, no state
/// mutation. Silently ignored before a join or with non-finite coordinates.
async fn handle_cursor(session: &Session, conn_id: Uuid, req: &Frame) {
    let Some(joined) = &session.joined else {
        return;
    };

    let x = req.data.get("x").and_then(Value::as_f64);
    let y = req.data.get("y").and_then(Value::as_f64);
    let (Some(x), Some(y)) = (x, y) else {
        return;
    };
    if !x.is_finite() || !y.is_finite() {
        warn!(%conn_id, "ws: dropping cursor with non-finite coordinates");
        return;
    }

    let payload = CursorPos { user_id: joined.user_id.clone(), x, y };
    let frame = Frame::request(EVENT_CURSOR, serde_json::to_value(&payload).unwrap_or_default())
        .with_room_id(joined.room.id());
    joined.room.broadcast(&frame, Some(conn_id)).await;
}

// =============================================================================
// LEAVE
// =============================================================================

/// Remove the session's user from its room (if any), notify peers, and let
/// the manager evict the room when it became empty.
async fn leave_current_room(state: &AppState, session: &mut Session, conn_id: Uuid) {
    let Some(joined) = session.joined.take() else {
        return;
    };

    if let Some(user) = joined.room.remove_user(conn_id).await {
        let frame = Frame::request(EVENT_USER_LEFT, json!({ "userId": user.user_id }))
            .with_room_id(joined.room.id());
        joined.room.broadcast(&frame, None).await;
    }

    state.rooms.cleanup(joined.room.id()).await;
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    if frame.event != EVENT_CURSOR {
        if frame.status == Status::Error {
            warn!(id = %frame.id, event = %frame.event, data = %frame.data, "ws: send frame status=error");
        } else {
            info!(id = %frame.id, event = %frame.event, status = ?frame.status, "ws: send frame");
        }
    }
    socket
        .send(Message::Binary(encode_frame(frame).into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
