use serde::{Deserialize, Serialize};

use crate::FilterError;

/// Largest accepted kernel side length.
pub const MAX_KERNEL_SIZE: u32 = 31;

/// Square convolution kernel of `size * size` row-major weights.
///
/// Kernels decoded from the wire are not trusted; [`Kernel::validate`] runs before
/// every use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kernel {
    size: u32,
    weights: Vec<f32>,
}

impl Kernel {
    /// # Errors
    ///
    /// `InvalidFilterParameters` unless `size` is odd, positive, at most
    /// [`MAX_KERNEL_SIZE`], and `weights` holds `size * size` finite values.
    pub fn new(size: u32, weights: Vec<f32>) -> Result<Self, FilterError> {
        let kernel = Self { size, weights };
        kernel.validate()?;
        Ok(kernel)
    }

    /// # Errors
    ///
    /// See [`Kernel::new`].
    pub fn validate(&self) -> Result<(), FilterError> {
        check_size(self.size)?;
        let expected = (self.size * self.size) as usize;
        if self.weights.len() != expected {
            return Err(FilterError::invalid(format!(
                "kernel of size {} needs {} weights, got {}",
                self.size,
                expected,
                self.weights.len()
            )));
        }
        if self.weights.iter().any(|w| !w.is_finite()) {
            return Err(FilterError::invalid("kernel weights must be finite"));
        }
        Ok(())
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn radius(&self) -> u32 {
        self.size / 2
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn sum(&self) -> f32 {
        self.weights.iter().sum()
    }

    /// Normalized Gaussian with standard deviation `sigma`.
    ///
    /// # Errors
    ///
    /// Bad size or a non-positive `sigma`.
    pub fn gaussian(size: u32, sigma: f32) -> Result<Self, FilterError> {
        check_size(size)?;
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(FilterError::invalid("gaussian sigma must be > 0"));
        }
        let denom = 2.0 * sigma * sigma;
        let weights: Vec<f32> = Self::offsets(size).map(|(dx, dy)| (-((dx * dx + dy * dy) as f32) / denom).exp()).collect();
        let sum: f32 = weights.iter().sum();
        Self::new(size, weights.into_iter().map(|w| w / sum).collect())
    }

    /// Uniform average over the neighbourhood.
    ///
    /// # Errors
    ///
    /// Bad size.
    pub fn mean(size: u32) -> Result<Self, FilterError> {
        check_size(size)?;
        let n = (size * size) as usize;
        Self::new(size, vec![1.0 / n as f32; n])
    }

    /// `-1` everywhere with `size²` in the centre, so a flat region maps to itself.
    ///
    /// # Errors
    ///
    /// Bad size.
    pub fn edge_detection(size: u32) -> Result<Self, FilterError> {
        check_size(size)?;
        let centre = (size * size) as f32;
        Self::new(size, Self::offsets(size).map(|(dx, dy)| if dx == 0 && dy == 0 { centre } else { -1.0 }).collect())
    }

    /// `dx + dy` relief with `1` in the centre.
    ///
    /// # Errors
    ///
    /// Bad size.
    pub fn emboss(size: u32) -> Result<Self, FilterError> {
        check_size(size)?;
        Self::new(size, Self::offsets(size).map(|(dx, dy)| if dx == 0 && dy == 0 { 1.0 } else { (dx + dy) as f32 }).collect())
    }

    /// Row-major `(dx, dy)` offsets relative to the kernel centre.
    fn offsets(size: u32) -> impl Iterator<Item = (i32, i32)> {
        let r = (size / 2) as i32;
        (-r..=r).flat_map(move |dy| (-r..=r).map(move |dx| (dx, dy)))
    }
}

fn check_size(size: u32) -> Result<(), FilterError> {
    if size == 0 || size % 2 == 0 {
        return Err(FilterError::invalid(format!("kernel size must be a positive odd number, got {size}")));
    }
    if size > MAX_KERNEL_SIZE {
        return Err(FilterError::invalid(format!("kernel size {size} exceeds the maximum of {MAX_KERNEL_SIZE}")));
    }
    Ok(())
}
