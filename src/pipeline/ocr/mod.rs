//! Image-to-text for uploaded report photos and scans.
//!
//! Engines implement [`OcrEngine`]; [`OcrAdapter`] bounds each call in time,
//! normalizes confidence to [0,1] and applies the deployment's
//! [`OcrFailurePolicy`].

pub mod adapter;
pub mod mock;
#[cfg(feature = "ocr")]
pub mod tesseract;
pub mod types;
pub mod vision;

pub use adapter::*;
pub use mock::*;
#[cfg(feature = "ocr")]
pub use tesseract::*;
pub use types::*;
pub use vision::*;

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR engine initialization failed: {0}")]
    Init(String),

    #[error("OCR processing failed: {0}")]
    Processing(String),

    #[error("OCR timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(&'static str),

    #[error("OCR engine not available: {0}")]
    Unavailable(String),
}

impl OcrError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, OcrError::Timeout(_))
    }
}
