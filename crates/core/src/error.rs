//! Error types shared by the canvas engine crates.

use crate::font::FontStyle;

/// Errors raised by the canvas document engine.
///
/// Most render paths never produce these: data that is not ready yet is
/// reported through logging and an early return. Errors are reserved for
/// broken setup (missing host elements, unknown fonts) and lookups that the
/// caller guaranteed would succeed.
#[derive(Debug, thiserror::Error)]
pub enum CanvasError {
    #[error("required host element is missing: {0}")]
    MissingHostElement(&'static str),

    #[error("page {0} is out of range")]
    PageOutOfRange(usize),

    #[error("page {0} has no recognition data")]
    PageNotLoaded(usize),

    #[error("word not found: {0}")]
    WordNotFound(String),

    #[error("font face not found: {family} ({style})")]
    FontNotFound { family: String, style: FontStyle },

    #[error("layout box not found: {0}")]
    LayoutBoxNotFound(String),

    #[error("font table could not be parsed: {0}")]
    FontTable(#[from] serde_json::Error),
}

/// Result type for canvas engine operations
pub type CanvasResult<T> = Result<T, CanvasError>;
