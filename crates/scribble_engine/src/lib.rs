#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_lossless,
    clippy::cast_precision_loss,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::module_name_repetitions
)]
//! Pixel model and deterministic filter engine for scribble.
//!
//! An [`Image`] is an immutable RGBA8 grid. A [`Filter`] maps a parent image and an
//! optional [`Mask`] to a new image; running the same filter on the same input twice
//! yields byte-identical output.

mod error;
pub use error::*;

mod image;
pub use crate::image::*;

mod mask;
pub use mask::*;

pub mod color;

pub mod filters;
pub use filters::{Filter, FilterKind, Kernel, MAX_KERNEL_SIZE, MAX_SMOOTHING_PASSES};

mod pixel_data;
