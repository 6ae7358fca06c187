//! Diffusion inpainting: fill the masked region from its boundary inwards.

use crate::{Image, Mask};

const NEIGHBOURS: [(i32, i32); 8] = [(-1, -1), (0, -1), (1, -1), (-1, 0), (1, 0), (-1, 1), (0, 1), (1, 1)];

/// Reconstruct every pixel selected by `region`.
///
/// Each pass fills the unknown pixels that touch at least one known pixel with the
/// average of their known 8-neighbours, reading only values from earlier passes.
/// The number of passes is therefore bounded by the largest distance from a region
/// pixel to the region boundary. A region without any known pixel around it is left
/// as it was. `smoothing_passes` further Jacobi iterations then relax the region.
pub(crate) fn inpaint(image: &Image, region: &Mask, smoothing_passes: u32) -> Image {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let mut pixels = image.pixels().to_vec();
    let mut known: Vec<bool> = region.bits().iter().map(|selected| !selected).collect();

    let mut passes = 0u32;
    loop {
        let mut filled = Vec::new();
        for y in 0..height {
            for x in 0..width {
                let i = y * width + x;
                if known[i] {
                    continue;
                }
                if let Some(avg) = average_neighbours(&pixels, width, height, x, y, |j| known[j]) {
                    filled.push((i, avg));
                }
            }
        }
        if filled.is_empty() {
            break;
        }
        passes += 1;
        for (i, avg) in filled {
            pixels[i * 4..i * 4 + 4].copy_from_slice(&avg);
            known[i] = true;
        }
    }
    log::trace!("inpainting filled {} pixels in {passes} passes", region.count());

    for _ in 0..smoothing_passes {
        let previous = pixels.clone();
        for y in 0..height {
            for x in 0..width {
                let i = y * width + x;
                if !region.bits()[i] || !known[i] {
                    continue;
                }
                if let Some(avg) = average_neighbours(&previous, width, height, x, y, |j| known[j]) {
                    pixels[i * 4..i * 4 + 4].copy_from_slice(&avg);
                }
            }
        }
    }

    Image::from_parts(image.width(), image.height(), pixels)
}

fn average_neighbours(pixels: &[u8], width: usize, height: usize, x: usize, y: usize, include: impl Fn(usize) -> bool) -> Option<[u8; 4]> {
    let mut sum = [0u32; 4];
    let mut count = 0u32;
    for (dx, dy) in NEIGHBOURS {
        let nx = x as i32 + dx;
        let ny = y as i32 + dy;
        if nx < 0 || ny < 0 || nx >= width as i32 || ny >= height as i32 {
            continue;
        }
        let j = ny as usize * width + nx as usize;
        if !include(j) {
            continue;
        }
        for c in 0..4 {
            sum[c] += u32::from(pixels[j * 4 + c]);
        }
        count += 1;
    }
    if count == 0 {
        return None;
    }
    Some(sum.map(|s| ((s + count / 2) / count) as u8))
}
