//! Changed-region encoding for applied images.
//!
//! A diff covers the bounding rectangle of all pixels that differ between two
//! images of the same size. The rectangle's pixels are stored row-major as
//! `[rgba, repeat]` pairs where `rgba` packs the four channels big-endian into a
//! `u32` and `repeat` is the number of *additional* copies, so the run length is
//! `repeat + 1`.

use scribble_engine::Image;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDiff {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub runs: Vec<[u32; 2]>,
}

impl ImageDiff {
    /// `true` if both images were identical.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompressionError {
    #[error("Image sizes differ: {0:?} vs {1:?}")]
    SizeMismatch((u32, u32), (u32, u32)),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Encode the pixels of `child` that differ from `parent`.
pub fn diff_images(parent: &Image, child: &Image) -> Result<ImageDiff, CompressionError> {
    if parent.dimensions() != child.dimensions() {
        return Err(CompressionError::SizeMismatch(parent.dimensions(), child.dimensions()));
    }
    let Some((x0, y0, x1, y1)) = changed_bounds(parent, child) else {
        return Ok(ImageDiff {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            runs: Vec::new(),
        });
    };
    let pixels = (y0..=y1).flat_map(|y| (x0..=x1).map(move |x| (x, y))).map(|(x, y)| u32::from_be_bytes(child.pixel(x, y)));
    let mut runs = Vec::new();
    compress_stream_u32(pixels, &mut runs);
    Ok(ImageDiff {
        x: x0,
        y: y0,
        width: x1 - x0 + 1,
        height: y1 - y0 + 1,
        runs,
    })
}

/// Rebuild the child image from `parent` and a diff produced by [`diff_images`].
pub fn apply_diff(parent: &Image, diff: &ImageDiff) -> Result<Image, CompressionError> {
    if diff.is_empty() {
        return Ok(parent.clone());
    }
    let fits = |start: u32, len: u32, limit: u32| start.checked_add(len).is_some_and(|end| end <= limit);
    if !fits(diff.x, diff.width, parent.width()) || !fits(diff.y, diff.height, parent.height()) {
        return Err(CompressionError::InvalidData(format!(
            "rectangle {}x{} at ({}, {}) exceeds the {}x{} image",
            diff.width,
            diff.height,
            diff.x,
            diff.y,
            parent.width(),
            parent.height()
        )));
    }
    let expected = diff.width as usize * diff.height as usize;
    let values = expand_rle_stream(&diff.runs, expected)?;
    if values.len() != expected {
        return Err(CompressionError::InvalidData(format!("decompressed length mismatch: got {}, expected {expected}", values.len())));
    }

    let mut pixels = parent.pixels().to_vec();
    let stride = parent.width() as usize * 4;
    for (row, chunk) in values.chunks(diff.width as usize).enumerate() {
        let start = (diff.y as usize + row) * stride + diff.x as usize * 4;
        for (i, value) in chunk.iter().enumerate() {
            pixels[start + i * 4..start + i * 4 + 4].copy_from_slice(&value.to_be_bytes());
        }
    }
    Image::new(parent.width(), parent.height(), pixels).map_err(|e| CompressionError::InvalidData(e.to_string()))
}

fn changed_bounds(parent: &Image, child: &Image) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for y in 0..parent.height() {
        for x in 0..parent.width() {
            if parent.pixel(x, y) != child.pixel(x, y) {
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
    }
    bounds
}

fn expand_rle_stream(pairs: &[[u32; 2]], limit: usize) -> Result<Vec<u32>, CompressionError> {
    let mut out: Vec<u32> = Vec::with_capacity(limit);
    for &[value, repeat] in pairs {
        let run_len = (repeat as usize)
            .checked_add(1)
            .ok_or_else(|| CompressionError::InvalidData("repeat overflow".to_string()))?;
        if out.len() + run_len > limit {
            return Err(CompressionError::InvalidData(format!("runs exceed the {limit} pixels of the rectangle")));
        }
        out.extend(std::iter::repeat(value).take(run_len));
    }
    Ok(out)
}

fn compress_stream_u32<I: Iterator<Item = u32>>(mut iter: I, out: &mut Vec<[u32; 2]>) {
    let Some(mut current) = iter.next() else {
        return;
    };
    let mut repeat: u32 = 0;

    for value in iter {
        if value == current {
            repeat = repeat.saturating_add(1);
        } else {
            out.push([current, repeat]);
            current = value;
            repeat = 0;
        }
    }
    out.push([current, repeat]);
}
