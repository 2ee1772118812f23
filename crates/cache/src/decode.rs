//! Page image decode from `data:` URLs.

use crate::error::{CacheError, CacheResult};
use base64::{engine::general_purpose::STANDARD, Engine};

/// A decoded page bitmap in RGBA8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl DecodedBitmap {
    pub fn memory_size(&self) -> usize {
        self.pixels.len()
    }
}

/// Decode a base64 `data:` URL (PNG or JPEG) into an RGBA bitmap.
pub fn decode_data_url(src: &str) -> CacheResult<DecodedBitmap> {
    let (header, payload) = src.split_once(',').ok_or(CacheError::MalformedDataUrl)?;
    if !header.starts_with("data:") {
        return Err(CacheError::MalformedDataUrl);
    }

    let bytes = STANDARD.decode(payload.trim())?;
    let rgba = image::load_from_memory(&bytes)?.to_rgba8();
    let (width, height) = rgba.dimensions();

    Ok(DecodedBitmap {
        width,
        height,
        pixels: rgba.into_raw(),
    })
}
