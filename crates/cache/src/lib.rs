//! OCR Canvas Cache Library
//!
//! Decoded page background bitmaps, produced off-thread by a worker pool and
//! kept for a window of pages around the one being displayed.

pub mod bitmap;
pub mod config;
pub mod decode;
pub mod error;

pub use bitmap::{
    image_rotation, CacheEntry, CacheStats, ColorMode, DecodeEvent, ImageBitmapCache,
    ImagePlacement, ImageProvider, ImageVariant, RenderPlan, RequestState, SourceImage,
    ROTATION_UPDATE_EPSILON,
};
pub use config::{CacheConfig, ConfigError};
pub use decode::{decode_data_url, DecodedBitmap};
pub use error::{CacheError, CacheResult};
