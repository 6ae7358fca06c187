//! Error types for scribble_engine

use thiserror::Error;

/// Errors produced while constructing or decoding images and masks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("Image dimensions must be positive, got {width}x{height}")]
    EmptyDimensions { width: u32, height: u32 },

    #[error("Pixel buffer length mismatch: expected {expected} bytes, got {actual}")]
    BufferLength { expected: usize, actual: usize },

    #[error("Invalid pixel data encoding: {message}")]
    InvalidEncoding { message: String },
}

/// Errors produced by [`crate::Filter`] application.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("Invalid filter parameters: {0}")]
    InvalidFilterParameters(String),

    #[error("Mask is {}x{}, image is {}x{}", actual.0, actual.1, expected.0, expected.1)]
    DimensionMismatch { expected: (u32, u32), actual: (u32, u32) },
}

impl FilterError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        FilterError::InvalidFilterParameters(message.into())
    }
}
