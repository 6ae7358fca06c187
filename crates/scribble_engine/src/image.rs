use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ImageError;
use crate::pixel_data::PixelData;

/// A single pixel: red, green, blue, alpha.
pub type Rgba = [u8; 4];

pub const WHITE: Rgba = [0xFF, 0xFF, 0xFF, 0xFF];
pub const BLACK: Rgba = [0x00, 0x00, 0x00, 0xFF];

/// Immutable RGBA8 pixel grid.
///
/// The buffer is shared behind an `Arc`, so cloning an image is cheap and any
/// clone stays valid for as long as it is held.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PixelData", into = "PixelData")]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl Image {
    /// Create an image from a row-major RGBA buffer of `width * height * 4` bytes.
    ///
    /// # Errors
    ///
    /// Fails when a dimension is zero or the buffer length does not match.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, ImageError> {
        let expected = Self::buffer_len(width, height)?;
        if pixels.len() != expected {
            return Err(ImageError::BufferLength {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self::from_parts(width, height, pixels))
    }

    /// Create an image with every pixel set to `color`.
    ///
    /// # Errors
    ///
    /// Fails when a dimension is zero.
    pub fn filled(width: u32, height: u32, color: Rgba) -> Result<Self, ImageError> {
        let len = Self::buffer_len(width, height)?;
        let mut pixels = Vec::with_capacity(len);
        for _ in 0..len / 4 {
            pixels.extend_from_slice(&color);
        }
        Ok(Self::from_parts(width, height, pixels))
    }

    /// Opaque white canvas, the default for a new room.
    ///
    /// # Errors
    ///
    /// Fails when a dimension is zero.
    pub fn blank(width: u32, height: u32) -> Result<Self, ImageError> {
        Self::filled(width, height, WHITE)
    }

    /// Build an image from a pixel callback, evaluated in row-major order.
    ///
    /// # Errors
    ///
    /// Fails when a dimension is zero.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> Rgba) -> Result<Self, ImageError> {
        let len = Self::buffer_len(width, height)?;
        let mut pixels = Vec::with_capacity(len);
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&f(x, y));
            }
        }
        Ok(Self::from_parts(width, height, pixels))
    }

    /// Convert a decoded `image` crate buffer.
    ///
    /// # Errors
    ///
    /// Fails when the source image is empty.
    pub fn from_rgba_image(img: ::image::RgbaImage) -> Result<Self, ImageError> {
        let (width, height) = img.dimensions();
        Self::new(width, height, img.into_raw())
    }

    pub fn to_rgba_image(&self) -> ::image::RgbaImage {
        // Dimensions and length are guaranteed to agree by construction.
        ::image::RgbaImage::from_raw(self.width, self.height, self.pixels.to_vec()).unwrap_or_else(|| ::image::RgbaImage::new(self.width, self.height))
    }

    /// Trusted constructor for filter output whose length is known to be right.
    pub(crate) fn from_parts(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize * 4);
        Self {
            width,
            height,
            pixels: pixels.into(),
        }
    }

    fn buffer_len(width: u32, height: u32) -> Result<usize, ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::EmptyDimensions { width, height });
        }
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or(ImageError::EmptyDimensions { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Raw row-major RGBA bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Pixel at (`x`, `y`). Panics when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        let i = self.offset(x, y);
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]]
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height
    }

    pub(crate) fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl TryFrom<PixelData> for Image {
    type Error = ImageError;

    fn try_from(data: PixelData) -> Result<Self, Self::Error> {
        let bytes = data.decode_bytes()?;
        Image::new(data.width, data.height, bytes)
    }
}

impl From<Image> for PixelData {
    fn from(image: Image) -> Self {
        PixelData::encode(image.width, image.height, &image.pixels)
    }
}
