#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::missing_errors_doc
)]
//! Editing layer of scribble: the branching version history of a canvas and,
//! behind the `collaboration` feature, the rooms and WebSocket server that let
//! several participants edit one history together.

mod history;
pub use history::*;

#[cfg(feature = "collaboration")]
pub mod collaboration;

pub use scribble_engine::{Filter, FilterError, FilterKind, Image, ImageError, Kernel, MAX_SMOOTHING_PASSES, Mask};
