use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pixel_data::PixelData;
use crate::{FilterError, Image, ImageError};

/// Per-pixel boolean selector aligned to an [`Image`].
///
/// Filters only change pixels where the mask is set; everything else is copied
/// from the parent image. On the wire the bits are packed LSB-first, row-major.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PixelData", into = "PixelData")]
pub struct Mask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl Mask {
    /// Empty selection of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    /// Selection covering every pixel.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![true; width as usize * height as usize],
        }
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut mask = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                mask.set(x, y, f(x, y));
            }
        }
        mask
    }

    /// # Errors
    ///
    /// Fails when `bits` does not hold exactly `width * height` entries.
    pub fn from_bits(width: u32, height: u32, bits: Vec<bool>) -> Result<Self, ImageError> {
        let expected = width as usize * height as usize;
        if bits.len() != expected {
            return Err(ImageError::BufferLength {
                expected,
                actual: bits.len(),
            });
        }
        Ok(Self { width, height, bits })
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

    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bits[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, selected: bool) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.bits[i] = selected;
        }
    }

    /// Select the rectangle at (`x`, `y`), clipped to the mask bounds.
    pub fn add_rectangle(&mut self, x: u32, y: u32, width: u32, height: u32) {
        for row in y..y.saturating_add(height).min(self.height) {
            for col in x..x.saturating_add(width).min(self.width) {
                self.set(col, row, true);
            }
        }
    }

    pub fn invert(&mut self) {
        for bit in &mut self.bits {
            *bit = !*bit;
        }
    }

    /// Number of selected pixels.
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.bits.iter().any(|b| *b)
    }

    /// Row-major selection bits.
    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    /// # Errors
    ///
    /// `DimensionMismatch` when the mask is not the same size as `image`.
    pub fn check_matches(&self, image: &Image) -> Result<(), FilterError> {
        if self.dimensions() != image.dimensions() {
            return Err(FilterError::DimensionMismatch {
                expected: image.dimensions(),
                actual: self.dimensions(),
            });
        }
        Ok(())
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn pack(&self) -> Vec<u8> {
        let mut packed = vec![0u8; self.bits.len().div_ceil(8)];
        for (i, bit) in self.bits.iter().enumerate() {
            if *bit {
                packed[i / 8] |= 1 << (i % 8);
            }
        }
        packed
    }
}

impl fmt::Debug for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mask")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("selected", &self.count())
            .finish()
    }
}

impl TryFrom<PixelData> for Mask {
    type Error = ImageError;

    fn try_from(data: PixelData) -> Result<Self, Self::Error> {
        let packed = data.decode_bytes()?;
        let len = data.width as usize * data.height as usize;
        if packed.len() != len.div_ceil(8) {
            return Err(ImageError::BufferLength {
                expected: len.div_ceil(8),
                actual: packed.len(),
            });
        }
        let bits = (0..len).map(|i| packed[i / 8] & (1 << (i % 8)) != 0).collect();
        Mask::from_bits(data.width, data.height, bits)
    }
}

impl From<Mask> for PixelData {
    fn from(mask: Mask) -> Self {
        PixelData::encode(mask.width, mask.height, &mask.pack())
    }
}
