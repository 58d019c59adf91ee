use std::str::FromStr;

use async_trait::async_trait;

use super::OcrError;
use crate::models::InvalidEnum;

/// Result of recognizing one image.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrPageResult {
    pub text: String,
    /// Engine score scaled to 0.0-1.0.
    pub confidence: f32,
}

/// OCR backend abstraction (allows mocking).
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &[u8]) -> Result<OcrPageResult, OcrError>;

    /// Short backend label for logs.
    fn name(&self) -> &'static str;
}

/// What to do when the OCR engine fails or times out. Fixed per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OcrFailurePolicy {
    /// Log and continue with empty text and zero confidence.
    #[default]
    Fallback,
    /// Fail the run as an upstream failure.
    Propagate,
}

impl OcrFailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fallback => "fallback",
            Self::Propagate => "propagate",
        }
    }
}

impl FromStr for OcrFailurePolicy {
    type Err = InvalidEnum;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fallback" => Ok(Self::Fallback),
            "propagate" => Ok(Self::Propagate),
            _ => Err(InvalidEnum {
                field: "OcrFailurePolicy".into(),
                value: s.to_string(),
            }),
        }
    }
}

/// Image container detected from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Gif,
    Tiff,
    Bmp,
    Heic,
    Pdf,
    Unknown,
}

impl ImageFormat {
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Self::Jpeg
        } else if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            Self::Png
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Self::Webp
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Self::Gif
        } else if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
            Self::Tiff
        } else if bytes.starts_with(b"BM") {
            Self::Bmp
        } else if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
            Self::Heic
        } else if bytes.starts_with(b"%PDF-") {
            Self::Pdf
        } else {
            Self::Unknown
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
            Self::Bmp => "bmp",
            Self::Heic => "heic",
            Self::Pdf => "pdf",
            Self::Unknown => "unknown",
        }
    }

    /// MIME type accepted by chat-completion vision inputs, if any.
    pub fn vision_mime(&self) -> Option<&'static str> {
        match self {
            Self::Jpeg => Some("image/jpeg"),
            Self::Png => Some("image/png"),
            Self::Webp => Some("image/webp"),
            Self::Gif => Some("image/gif"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("Fallback".parse::<OcrFailurePolicy>().unwrap(), OcrFailurePolicy::Fallback);
        assert_eq!(" propagate ".parse::<OcrFailurePolicy>().unwrap(), OcrFailurePolicy::Propagate);
        assert!("retry".parse::<OcrFailurePolicy>().is_err());
        assert_eq!(OcrFailurePolicy::default(), OcrFailurePolicy::Fallback);
    }

    #[test]
    fn sniff_common_formats() {
        assert_eq!(ImageFormat::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), ImageFormat::Jpeg);
        assert_eq!(
            ImageFormat::sniff(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00]),
            ImageFormat::Png
        );
        assert_eq!(ImageFormat::sniff(b"RIFF\x00\x00\x00\x00WEBPVP8 "), ImageFormat::Webp);
        assert_eq!(ImageFormat::sniff(b"GIF89a...."), ImageFormat::Gif);
        assert_eq!(ImageFormat::sniff(b"\x00\x00\x00\x18ftypheic"), ImageFormat::Heic);
        assert_eq!(ImageFormat::sniff(b"%PDF-1.7"), ImageFormat::Pdf);
        assert_eq!(ImageFormat::sniff(b"hello"), ImageFormat::Unknown);
        assert_eq!(ImageFormat::sniff(&[]), ImageFormat::Unknown);
    }

    #[test]
    fn only_web_formats_have_vision_mime() {
        assert_eq!(ImageFormat::Jpeg.vision_mime(), Some("image/jpeg"));
        assert_eq!(ImageFormat::Tiff.vision_mime(), None);
        assert_eq!(ImageFormat::Pdf.vision_mime(), None);
    }
}
