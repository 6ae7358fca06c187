//! Real-time collaboration for scribble.
//!
//! Participants connect over WebSocket, join a room by name and edit the room's
//! shared version history. Each room accepts one edit at a time: a submission
//! names the node it was built on and is only accepted if that node is still the
//! room's head. Every accepted change reaches all participants of the room in the
//! same order.

mod client;
mod compression;
mod protocol;
mod room;
mod server;

pub use client::*;
pub use compression::*;
pub use protocol::*;
pub use room::*;
pub use server::*;
