use crate::{FilterError, Image, Mask, Rgba};

/// Select the 4-connected region around the seed whose colours are within
/// `threshold` of the seed colour.
///
/// Colour distance is the largest absolute difference over the R, G, B and A
/// channels, so a threshold of 0 only grows into exactly matching pixels.
pub(crate) fn magic_wand(image: &Image, seed_x: u32, seed_y: u32, threshold: u8) -> Result<Mask, FilterError> {
    if !image.contains(seed_x, seed_y) {
        return Err(FilterError::invalid(format!(
            "seed ({seed_x}, {seed_y}) lies outside the {}x{} image",
            image.width(),
            image.height()
        )));
    }
    let (width, height) = image.dimensions();
    let seed = image.pixel(seed_x, seed_y);
    let mut mask = Mask::new(width, height);
    mask.set(seed_x, seed_y, true);

    let mut stack = vec![(seed_x, seed_y)];
    while let Some((x, y)) = stack.pop() {
        let candidates = [
            x.checked_sub(1).map(|nx| (nx, y)),
            (x + 1 < width).then_some((x + 1, y)),
            y.checked_sub(1).map(|ny| (x, ny)),
            (y + 1 < height).then_some((x, y + 1)),
        ];
        for (nx, ny) in candidates.into_iter().flatten() {
            if !mask.get(nx, ny) && distance(image.pixel(nx, ny), seed) <= threshold {
                mask.set(nx, ny, true);
                stack.push((nx, ny));
            }
        }
    }
    Ok(mask)
}

fn distance(a: Rgba, b: Rgba) -> u8 {
    a.iter().zip(b.iter()).map(|(x, y)| x.abs_diff(*y)).max().unwrap_or(0)
}
