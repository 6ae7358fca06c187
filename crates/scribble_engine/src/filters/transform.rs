use crate::Image;

pub(crate) fn flip_horizontal(image: &Image) -> Image {
    let (width, height) = image.dimensions();
    let src = image.pixels();
    let mut out = Vec::with_capacity(src.len());
    for y in 0..height {
        for x in (0..width).rev() {
            let i = image.offset(x, y);
            out.extend_from_slice(&src[i..i + 4]);
        }
    }
    Image::from_parts(width, height, out)
}

pub(crate) fn flip_vertical(image: &Image) -> Image {
    let (width, height) = image.dimensions();
    let row_len = width as usize * 4;
    let mut out = Vec::with_capacity(image.pixels().len());
    for row in image.pixels().chunks(row_len).rev() {
        out.extend_from_slice(row);
    }
    Image::from_parts(width, height, out)
}

/// Quarter turn to the right: the left column becomes the top row.
pub(crate) fn rotate_clockwise(image: &Image) -> Image {
    let (width, height) = image.dimensions();
    rotate(image, height, width, |x, y| (y, height - 1 - x))
}

pub(crate) fn rotate_counter_clockwise(image: &Image) -> Image {
    let (width, height) = image.dimensions();
    rotate(image, height, width, |x, y| (width - 1 - y, x))
}

/// Build a `new_width`×`new_height` image where `source(x, y)` names the parent pixel
/// shown at `(x, y)`.
fn rotate(image: &Image, new_width: u32, new_height: u32, source: impl Fn(u32, u32) -> (u32, u32)) -> Image {
    let src = image.pixels();
    let mut out = Vec::with_capacity(src.len());
    for y in 0..new_height {
        for x in 0..new_width {
            let (sx, sy) = source(x, y);
            let i = image.offset(sx, sy);
            out.extend_from_slice(&src[i..i + 4]);
        }
    }
    Image::from_parts(new_width, new_height, out)
}
