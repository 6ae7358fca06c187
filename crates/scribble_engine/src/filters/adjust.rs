//! Per-pixel colour adjustments. None of these look at neighbouring pixels.

use rayon::prelude::*;

use crate::color::{Hsv, clamp_channel, hsv_to_rgb, luma, rgb_to_hsv};
use crate::{Image, Rgba};

/// Apply `f` to every pixel.
pub(crate) fn map_pixels(image: &Image, f: impl Fn(Rgba) -> Rgba + Sync) -> Image {
    let mut out = image.pixels().to_vec();
    out.par_chunks_mut(4).for_each(|px| {
        let mapped = f([px[0], px[1], px[2], px[3]]);
        px.copy_from_slice(&mapped);
    });
    Image::from_parts(image.width(), image.height(), out)
}

fn map_hsv(image: &Image, f: impl Fn(Hsv) -> Hsv + Sync) -> Image {
    map_pixels(image, |[r, g, b, a]| {
        let (r, g, b) = hsv_to_rgb(f(rgb_to_hsv(r, g, b)));
        [r, g, b, a]
    })
}

/// Scale each channel's distance from the pixel's luma by `factor`.
pub(crate) fn saturation(image: &Image, factor: f32) -> Image {
    map_pixels(image, |[r, g, b, a]| {
        let y = luma(r, g, b);
        let scale = |c: u8| clamp_channel(y + (f32::from(c) - y) * factor);
        [scale(r), scale(g), scale(b), a]
    })
}

pub(crate) fn brightness(image: &Image, delta: i32) -> Image {
    if delta == 0 {
        return image.clone();
    }
    let delta = delta as f32 / 255.0;
    map_hsv(image, |hsv| Hsv { v: hsv.v + delta, ..hsv })
}

pub(crate) fn exposure(image: &Image, stops: f32) -> Image {
    if stops == 0.0 {
        return image.clone();
    }
    let gain = stops.exp2();
    map_hsv(image, |hsv| Hsv { v: hsv.v * gain, ..hsv })
}

pub(crate) fn hue(image: &Image, degrees: i32) -> Image {
    if degrees.rem_euclid(360) == 0 {
        return image.clone();
    }
    let degrees = degrees as f32;
    map_hsv(image, |hsv| Hsv { h: hsv.h + degrees, ..hsv })
}

pub(crate) fn contrast(image: &Image, amount: i32) -> Image {
    if amount == 0 {
        return image.clone();
    }
    let amount = amount as f32;
    let factor = (259.0 * (amount + 255.0)) / (255.0 * (259.0 - amount));
    let adjust = move |c: u8| clamp_channel(factor * (f32::from(c) - 128.0) + 128.0);
    map_pixels(image, |[r, g, b, a]| [adjust(r), adjust(g), adjust(b), a])
}

pub(crate) fn temperature(image: &Image, delta: i32) -> Image {
    map_pixels(image, |[r, g, b, a]| [offset(r, delta), g, offset(b, -delta), a])
}

pub(crate) fn tint(image: &Image, delta: i32) -> Image {
    map_pixels(image, |[r, g, b, a]| [r, offset(g, delta), b, a])
}

pub(crate) fn invert(image: &Image) -> Image {
    map_pixels(image, |[r, g, b, a]| [255 - r, 255 - g, 255 - b, a])
}

pub(crate) fn grayscale(image: &Image) -> Image {
    map_pixels(image, |[r, g, b, a]| {
        let avg = ((u16::from(r) + u16::from(g) + u16::from(b)) / 3) as u8;
        [avg, avg, avg, a]
    })
}

fn offset(c: u8, delta: i32) -> u8 {
    (i32::from(c) + delta).clamp(0, 255) as u8
}
