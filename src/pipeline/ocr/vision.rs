//! OCR through a vision-capable chat model.
//!
//! Vision models return no native confidence, so the score is a heuristic
//! from output length and line structure.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;

use super::types::{ImageFormat, OcrEngine, OcrPageResult};
use super::OcrError;
use crate::pipeline::llm::{LlmError, VisionClient};
use crate::pipeline::prompt::{VISION_NO_TEXT, VISION_OCR_PROMPT};
use crate::pipeline::sanitize::strip_code_fences;

/// Default OCR backend: transcribes the image with a vision model.
pub struct VisionOcr {
    client: Arc<dyn VisionClient>,
    model: String,
}

impl VisionOcr {
    pub fn new(client: Arc<dyn VisionClient>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl OcrEngine for VisionOcr {
    async fn recognize(&self, image: &[u8]) -> Result<OcrPageResult, OcrError> {
        let format = ImageFormat::sniff(image);
        let mime = format
            .vision_mime()
            .ok_or(OcrError::UnsupportedFormat(format.label()))?;

        let data_url = format!(
            "data:{mime};base64,{}",
            base64::engine::general_purpose::STANDARD.encode(image)
        );

        let response = self
            .client
            .read_image(&self.model, VISION_OCR_PROMPT, &data_url)
            .await
            .map_err(|e| match e {
                LlmError::Timeout(d) => OcrError::Timeout(d),
                LlmError::Connection(_) | LlmError::Config(_) => OcrError::Unavailable(e.to_string()),
                other => OcrError::Processing(other.to_string()),
            })?;

        let text = strip_code_fences(&response);
        let text = if text == VISION_NO_TEXT { "" } else { text };

        tracing::debug!(
            model = %self.model,
            format = format.label(),
            text_len = text.len(),
            "Vision OCR finished"
        );

        Ok(OcrPageResult {
            confidence: heuristic_confidence(text),
            text: text.to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "vision"
    }
}

/// Length tiers 0.2 / 0.4 / 0.6 / 0.8, plus small bonuses for tabular
/// layout (+0.05), reference ranges (+0.05) and units (+0.03). Capped at
/// 0.95; empty text is 0.
fn heuristic_confidence(text: &str) -> f32 {
    if text.is_empty() {
        return 0.0;
    }

    let base: f32 = match text.len() {
        0..=49 => 0.2,
        50..=199 => 0.4,
        200..=499 => 0.6,
        _ => 0.8,
    };

    let has_columns = text
        .lines()
        .any(|l| l.matches('|').count() >= 2 || l.contains('\t'));
    let has_ranges = text.lines().any(|l| {
        let bytes = l.as_bytes();
        bytes
            .windows(3)
            .any(|w| w[0].is_ascii_digit() && w[1] == b'-' && w[2].is_ascii_digit())
    });
    let has_units = ["g/dL", "mg/dL", "mmol/L", "/uL", "U/L", "%"]
        .iter()
        .any(|u| text.contains(u));

    let bonus: f32 = if has_columns { 0.05 } else { 0.0 }
        + if has_ranges { 0.05 } else { 0.0 }
        + if has_units { 0.03 } else { 0.0 };

    (base + bonus).min(0.95)
}
