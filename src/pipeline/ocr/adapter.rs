use std::sync::Arc;
use std::time::Duration;

use super::types::{OcrEngine, OcrFailurePolicy};
use super::OcrError;

/// Text read from the uploaded image.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrOutcome {
    pub text: String,
    /// Always within 0.0-1.0.
    pub confidence: f32,
}

impl OcrOutcome {
    /// Sentinel used when OCR failed under the fallback policy.
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
        }
    }
}

/// Wraps an engine with a time bound and the failure policy.
///
/// The policy covers recognition failures only. A timeout is always
/// returned as an error so callers can report it as retryable.
pub struct OcrAdapter {
    engine: Arc<dyn OcrEngine>,
    policy: OcrFailurePolicy,
    timeout: Duration,
}

impl OcrAdapter {
    pub fn new(engine: Arc<dyn OcrEngine>, policy: OcrFailurePolicy, timeout: Duration) -> Self {
        Self {
            engine,
            policy,
            timeout,
        }
    }

    pub fn policy(&self) -> OcrFailurePolicy {
        self.policy
    }

    pub async fn recognize(&self, image: &[u8]) -> Result<OcrOutcome, OcrError> {
        let start = std::time::Instant::now();

        let result = match tokio::time::timeout(self.timeout, self.engine.recognize(image)).await {
            Ok(result) => result,
            Err(_) => Err(OcrError::Timeout(self.timeout)),
        };

        match result {
            Ok(page) => {
                let confidence = normalize_confidence(page.confidence);
                tracing::info!(
                    engine = self.engine.name(),
                    image_bytes = image.len(),
                    text_len = page.text.len(),
                    confidence,
                    elapsed_ms = %start.elapsed().as_millis(),
                    "OCR complete"
                );
                Ok(OcrOutcome {
                    text: page.text,
                    confidence,
                })
            }
            Err(e) if e.is_timeout() => {
                tracing::error!(
                    engine = self.engine.name(),
                    timeout_ms = %self.timeout.as_millis(),
                    "OCR timed out"
                );
                Err(e)
            }
            Err(e) => match self.policy {
                OcrFailurePolicy::Fallback => {
                    tracing::warn!(
                        engine = self.engine.name(),
                        error = %e,
                        "OCR failed, continuing with empty text"
                    );
                    Ok(OcrOutcome::empty())
                }
                OcrFailurePolicy::Propagate => {
                    tracing::error!(engine = self.engine.name(), error = %e, "OCR failed");
                    Err(e)
                }
            },
        }
    }
}

/// Clamp to [0,1]. Engines reporting on a 0-100 scale are scaled down.
fn normalize_confidence(raw: f32) -> f32 {
    if !raw.is_finite() {
        return 0.0;
    }
    let scaled = if raw > 1.0 { raw / 100.0 } else { raw };
    scaled.clamp(0.0, 1.0)
}
