//! The closed set of image filters.
//!
//! Every variant is dispatched through [`Filter::apply`]. Filters never look at
//! anything but their parameters, the parent image and the optional mask, so a
//! given input always produces the same bytes.

use serde::{Deserialize, Serialize};

use crate::{FilterError, Image, Mask};

mod adjust;
mod convolution;
mod inpaint;
mod kernel;
mod magic_wand;
mod transform;

pub use kernel::{Kernel, MAX_KERNEL_SIZE};

/// Upper bound for [`Filter::Inpainting`] smoothing passes.
pub const MAX_SMOOTHING_PASSES: u32 = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params")]
pub enum Filter {
    GaussianBlur { size: u32, sigma: f32 },
    MeanBlur { size: u32 },
    EdgeDetection { size: u32 },
    Emboss { size: u32 },
    /// Arbitrary client supplied kernel.
    Convolve { kernel: Kernel },
    /// `1.0` keeps the image, `0.0` removes all colour.
    SaturationAdjust { factor: f32 },
    /// Reconstructs the masked region from its surroundings. Requires a mask.
    Inpainting { smoothing_passes: u32 },
    /// Produces a [`Mask`] through [`Filter::select`] instead of an image.
    MagicWandSelect { seed_x: u32, seed_y: u32, threshold: u8 },
    Brightness { delta: i32 },
    Contrast { amount: i32 },
    Exposure { stops: f32 },
    Hue { degrees: i32 },
    Temperature { delta: i32 },
    Tint { delta: i32 },
    Invert,
    Grayscale,
    FlipHorizontal,
    FlipVertical,
    /// Quarter turn; swaps width and height. Takes no mask.
    RotateClockwise,
    RotateCounterClockwise,
}

/// Parameterless discriminant of a [`Filter`], used in history summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterKind {
    GaussianBlur,
    MeanBlur,
    EdgeDetection,
    Emboss,
    Convolve,
    SaturationAdjust,
    Inpainting,
    MagicWandSelect,
    Brightness,
    Contrast,
    Exposure,
    Hue,
    Temperature,
    Tint,
    Invert,
    Grayscale,
    FlipHorizontal,
    FlipVertical,
    RotateClockwise,
    RotateCounterClockwise,
}

impl FilterKind {
    pub fn name(self) -> &'static str {
        match self {
            FilterKind::GaussianBlur => "Gaussian blur",
            FilterKind::MeanBlur => "Mean blur",
            FilterKind::EdgeDetection => "Edge detection",
            FilterKind::Emboss => "Emboss",
            FilterKind::Convolve => "Custom kernel",
            FilterKind::SaturationAdjust => "Saturation",
            FilterKind::Inpainting => "Inpainting",
            FilterKind::MagicWandSelect => "Magic wand",
            FilterKind::Brightness => "Brightness",
            FilterKind::Contrast => "Contrast",
            FilterKind::Exposure => "Exposure",
            FilterKind::Hue => "Hue",
            FilterKind::Temperature => "Temperature",
            FilterKind::Tint => "Tint",
            FilterKind::Invert => "Invert",
            FilterKind::Grayscale => "Grayscale",
            FilterKind::FlipHorizontal => "Flip horizontal",
            FilterKind::FlipVertical => "Flip vertical",
            FilterKind::RotateClockwise => "Rotate clockwise",
            FilterKind::RotateCounterClockwise => "Rotate counter-clockwise",
        }
    }
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Filter {
    pub fn kind(&self) -> FilterKind {
        match self {
            Filter::GaussianBlur { .. } => FilterKind::GaussianBlur,
            Filter::MeanBlur { .. } => FilterKind::MeanBlur,
            Filter::EdgeDetection { .. } => FilterKind::EdgeDetection,
            Filter::Emboss { .. } => FilterKind::Emboss,
            Filter::Convolve { .. } => FilterKind::Convolve,
            Filter::SaturationAdjust { .. } => FilterKind::SaturationAdjust,
            Filter::Inpainting { .. } => FilterKind::Inpainting,
            Filter::MagicWandSelect { .. } => FilterKind::MagicWandSelect,
            Filter::Brightness { .. } => FilterKind::Brightness,
            Filter::Contrast { .. } => FilterKind::Contrast,
            Filter::Exposure { .. } => FilterKind::Exposure,
            Filter::Hue { .. } => FilterKind::Hue,
            Filter::Temperature { .. } => FilterKind::Temperature,
            Filter::Tint { .. } => FilterKind::Tint,
            Filter::Invert => FilterKind::Invert,
            Filter::Grayscale => FilterKind::Grayscale,
            Filter::FlipHorizontal => FilterKind::FlipHorizontal,
            Filter::FlipVertical => FilterKind::FlipVertical,
            Filter::RotateClockwise => FilterKind::RotateClockwise,
            Filter::RotateCounterClockwise => FilterKind::RotateCounterClockwise,
        }
    }

    /// Size of the image this filter produces from a `width`×`height` parent.
    pub fn output_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        match self {
            Filter::RotateClockwise | Filter::RotateCounterClockwise => (height, width),
            _ => (width, height),
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// The kernel a convolution filter runs with, `None` for every other filter.
    ///
    /// # Errors
    ///
    /// `InvalidFilterParameters` for a malformed kernel description.
    pub fn kernel(&self) -> Result<Option<Kernel>, FilterError> {
        let kernel = match self {
            Filter::GaussianBlur { size, sigma } => Kernel::gaussian(*size, *sigma)?,
            Filter::MeanBlur { size } => Kernel::mean(*size)?,
            Filter::EdgeDetection { size } => Kernel::edge_detection(*size)?,
            Filter::Emboss { size } => Kernel::emboss(*size)?,
            Filter::Convolve { kernel } => {
                kernel.validate()?;
                kernel.clone()
            }
            _ => return Ok(None),
        };
        Ok(Some(kernel))
    }

    /// Check the parameters without touching any pixels.
    ///
    /// # Errors
    ///
    /// `InvalidFilterParameters` describing the first bad parameter.
    pub fn validate(&self) -> Result<(), FilterError> {
        self.kernel()?;
        match self {
            Filter::SaturationAdjust { factor } if !factor.is_finite() || *factor < 0.0 => {
                Err(FilterError::invalid(format!("saturation factor must be finite and >= 0, got {factor}")))
            }
            Filter::Exposure { stops } if !stops.is_finite() || stops.abs() > 16.0 => {
                Err(FilterError::invalid(format!("exposure must be within -16..=16 stops, got {stops}")))
            }
            Filter::Inpainting { smoothing_passes } if *smoothing_passes > MAX_SMOOTHING_PASSES => {
                Err(FilterError::invalid(format!("at most {MAX_SMOOTHING_PASSES} smoothing passes, got {smoothing_passes}")))
            }
            Filter::Contrast { amount } if !(-255..=255).contains(amount) => {
                Err(FilterError::invalid(format!("contrast must be within -255..=255, got {amount}")))
            }
            Filter::Brightness { delta } | Filter::Temperature { delta } | Filter::Tint { delta } if !(-255..=255).contains(delta) => {
                Err(FilterError::invalid(format!("{} must be within -255..=255, got {delta}", self.name())))
            }
            _ => Ok(()),
        }
    }

    /// Produce the child image of `parent`.
    ///
    /// With a mask, only selected pixels take the filtered value; every other pixel
    /// is copied from `parent`. Inpainting uses the mask as its target region instead
    /// and therefore requires one.
    ///
    /// # Errors
    ///
    /// `InvalidFilterParameters` for bad parameters, a missing inpainting mask, a
    /// mask on a rotation, or a magic wand filter (which selects rather than transforms).
    /// `DimensionMismatch` if the mask does not match `parent`.
    pub fn apply(&self, parent: &Image, mask: Option<&Mask>) -> Result<Image, FilterError> {
        if let Some(mask) = mask {
            mask.check_matches(parent)?;
        }
        self.validate()?;
        if mask.is_some() && self.output_dimensions(parent.width(), parent.height()) != parent.dimensions() {
            return Err(FilterError::invalid(format!("{} changes the image size and cannot be masked", self.name())));
        }

        let filtered = match self {
            Filter::GaussianBlur { size, sigma } => convolution::convolve(parent, &Kernel::gaussian(*size, *sigma)?),
            Filter::MeanBlur { size } => convolution::convolve(parent, &Kernel::mean(*size)?),
            Filter::EdgeDetection { size } => convolution::convolve(parent, &Kernel::edge_detection(*size)?),
            Filter::Emboss { size } => convolution::convolve(parent, &Kernel::emboss(*size)?),
            Filter::Convolve { kernel } => convolution::convolve(parent, kernel),
            Filter::SaturationAdjust { factor } => adjust::saturation(parent, *factor),
            Filter::Inpainting { smoothing_passes } => {
                let Some(region) = mask else {
                    return Err(FilterError::invalid("inpainting needs a mask selecting the region to fill"));
                };
                // The region already limits every change, no merge needed.
                return Ok(inpaint::inpaint(parent, region, *smoothing_passes));
            }
            Filter::MagicWandSelect { .. } => {
                return Err(FilterError::invalid("magic wand produces a selection, not an image"));
            }
            Filter::Brightness { delta } => adjust::brightness(parent, *delta),
            Filter::Contrast { amount } => adjust::contrast(parent, *amount),
            Filter::Exposure { stops } => adjust::exposure(parent, *stops),
            Filter::Hue { degrees } => adjust::hue(parent, *degrees),
            Filter::Temperature { delta } => adjust::temperature(parent, *delta),
            Filter::Tint { delta } => adjust::tint(parent, *delta),
            Filter::Invert => adjust::invert(parent),
            Filter::Grayscale => adjust::grayscale(parent),
            Filter::FlipHorizontal => transform::flip_horizontal(parent),
            Filter::FlipVertical => transform::flip_vertical(parent),
            Filter::RotateClockwise => transform::rotate_clockwise(parent),
            Filter::RotateCounterClockwise => transform::rotate_counter_clockwise(parent),
        };

        Ok(match mask {
            Some(mask) => merge_masked(parent, &filtered, mask),
            None => filtered,
        })
    }

    /// Run a magic wand selection against `image`.
    ///
    /// # Errors
    ///
    /// `InvalidFilterParameters` for any other filter or a seed outside the image.
    pub fn select(&self, image: &Image) -> Result<Mask, FilterError> {
        match self {
            Filter::MagicWandSelect { seed_x, seed_y, threshold } => magic_wand::magic_wand(image, *seed_x, *seed_y, *threshold),
            other => Err(FilterError::invalid(format!("{} does not produce a selection", other.name()))),
        }
    }
}

/// Take `filtered` where `mask` is set, `parent` everywhere else.
fn merge_masked(parent: &Image, filtered: &Image, mask: &Mask) -> Image {
    let mut out = parent.pixels().to_vec();
    for (i, _) in mask.bits().iter().enumerate().filter(|(_, selected)| **selected) {
        let o = i * 4;
        out[o..o + 4].copy_from_slice(&filtered.pixels()[o..o + 4]);
    }
    Image::from_parts(parent.width(), parent.height(), out)
}
