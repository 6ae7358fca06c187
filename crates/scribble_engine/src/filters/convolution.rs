use rayon::prelude::*;

use super::Kernel;
use crate::Image;
use crate::color::clamp_channel;

/// Convolve the RGB channels of `image` with `kernel`, clamping samples at the edges.
///
/// Alpha is carried over from the source pixel. Every output row depends only on
/// the source, so rows are computed in parallel without affecting the result.
pub(crate) fn convolve(image: &Image, kernel: &Kernel) -> Image {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let size = kernel.size() as usize;
    let radius = kernel.radius() as isize;
    let weights = kernel.weights();
    let src = image.pixels();

    let mut out = vec![0u8; src.len()];
    out.par_chunks_mut(width * 4).enumerate().for_each(|(y, row)| {
        for x in 0..width {
            let mut acc = [0f32; 3];
            for (ky, kernel_row) in weights.chunks(size).enumerate() {
                let sy = clamp_index(y as isize + ky as isize - radius, height);
                for (kx, &weight) in kernel_row.iter().enumerate() {
                    let sx = clamp_index(x as isize + kx as isize - radius, width);
                    let idx = (sy * width + sx) * 4;
                    for c in 0..3 {
                        acc[c] += weight * f32::from(src[idx + c]);
                    }
                }
            }
            let o = x * 4;
            for c in 0..3 {
                row[o + c] = clamp_channel(acc[c]);
            }
            row[o + 3] = src[(y * width + x) * 4 + 3];
        }
    });
    Image::from_parts(image.width(), image.height(), out)
}

fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}
