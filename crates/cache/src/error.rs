use thiserror::Error;

/// Errors from bitmap decode and the bitmap cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("source image is not a data URL")]
    MalformedDataUrl,

    #[error("invalid base64 image payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("failed to decode page image: {0}")]
    Image(#[from] image::ImageError),

    #[error("no source image for page {0}")]
    MissingSource(usize),

    #[error("page {0} failed to decode earlier and is not retried")]
    DecodeFailed(usize),

    #[error("decoder panicked on page {0}")]
    DecodePanicked(usize),

    #[error("page {0} has no decode in flight")]
    NotRequested(usize),

    #[error("failed to start decode workers: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    #[error("decode workers disconnected")]
    Disconnected,

    #[error("timed out waiting for page {0}")]
    WaitTimeout(usize),
}

pub type CacheResult<T> = Result<T, CacheError>;
