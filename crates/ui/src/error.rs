//! Error types for the viewer.

use ocr_canvas_cache::CacheError;
use ocr_canvas_core::CanvasError;

/// Errors raised by [`CanvasContext`](crate::CanvasContext).
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error(transparent)]
    Canvas(#[from] CanvasError),

    #[error("bitmap cache: {0}")]
    Cache(#[from] CacheError),
}

/// Result type for viewer operations
pub type ViewerResult<T> = Result<T, ViewerError>;
