//! Domain services used by the websocket dispatcher.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the replication engine — validation, the drawing
//! state machine, rooms, and persistence — so the route layer can stay
//! focused on protocol translation and fan-out plumbing.

pub mod drawing;
pub mod room;
pub mod rooms;
pub mod store;
pub mod validate;
