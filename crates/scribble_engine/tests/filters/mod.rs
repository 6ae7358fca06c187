//! Filter engine behaviour seen from outside the crate.

pub use scribble_engine::*;

mod inpainting;
mod magic_wand;

/// Deterministic test picture with gradients in every channel and a few hard edges.
pub fn test_image(width: u32, height: u32) -> Image {
    Image::from_fn(width, height, |x, y| {
        let edge = if (x / 3 + y / 2) % 2 == 0 { 0 } else { 90 };
        [
            ((x * 37 + y * 11) % 256) as u8,
            ((y * 53 + edge) % 256) as u8,
            ((x * y * 7 + 13) % 256) as u8,
            (255 - (x + y) % 64) as u8,
        ]
    })
    .unwrap()
}

/// One instance of every image-producing filter.
pub fn all_filters() -> Vec<Filter> {
    vec![
        Filter::GaussianBlur { size: 5, sigma: 1.4 },
        Filter::MeanBlur { size: 3 },
        Filter::EdgeDetection { size: 3 },
        Filter::Emboss { size: 3 },
        Filter::Convolve {
            kernel: Kernel::new(3, vec![0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0]).unwrap(),
        },
        Filter::SaturationAdjust { factor: 1.7 },
        Filter::Brightness { delta: 40 },
        Filter::Contrast { amount: 60 },
        Filter::Exposure { stops: -0.5 },
        Filter::Hue { degrees: 120 },
        Filter::Temperature { delta: 25 },
        Filter::Tint { delta: -25 },
        Filter::Invert,
        Filter::Grayscale,
        Filter::FlipHorizontal,
        Filter::FlipVertical,
    ]
}
