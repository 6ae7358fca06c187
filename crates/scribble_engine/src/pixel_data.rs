//! Wire representation shared by images and masks: dimensions plus base64 payload.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::ImageError;

#[derive(Serialize, Deserialize)]
pub(crate) struct PixelData {
    pub width: u32,
    pub height: u32,
    pub data: String,
}

impl PixelData {
    pub fn encode(width: u32, height: u32, bytes: &[u8]) -> Self {
        Self {
            width,
            height,
            data: STANDARD.encode(bytes),
        }
    }

    pub fn decode_bytes(&self) -> Result<Vec<u8>, ImageError> {
        STANDARD.decode(self.data.as_bytes()).map_err(|e| ImageError::InvalidEncoding { message: e.to_string() })
    }
}
