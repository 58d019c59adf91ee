use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::types::{OcrEngine, OcrPageResult};
use super::OcrError;

/// Mock OCR engine for unit testing without a real backend.
pub struct MockOcrEngine {
    pub text: String,
    pub confidence: f32,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockOcrEngine {
    pub fn new(text: &str, confidence: f32) -> Self {
        Self {
            text: text.to_string(),
            confidence,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrEngine for MockOcrEngine {
    async fn recognize(&self, _image: &[u8]) -> Result<OcrPageResult, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(OcrPageResult {
            text: self.text.clone(),
            confidence: self.confidence,
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// OCR engine that always fails with a processing error.
pub struct FailingOcrEngine {
    message: String,
}

impl FailingOcrEngine {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl OcrEngine for FailingOcrEngine {
    async fn recognize(&self, _image: &[u8]) -> Result<OcrPageResult, OcrError> {
        Err(OcrError::Processing(self.message.clone()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}
