use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::types::{LlmClient, VisionClient};
use super::LlmError;

/// Scripted generation engine for tests.
///
/// Each call pops the next queued reply, in order. Prompts are recorded so
/// tests can assert on what was sent.
pub struct MockLlmClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl MockLlmClient {
    pub fn new(responses: &[&str]) -> Self {
        Self {
            replies: Mutex::new(responses.iter().map(|r| Ok(r.to_string())).collect()),
            prompts: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Queue a failure after the replies already queued.
    pub fn then_fail(self, err: LlmError) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Err(err));
        }
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    async fn next_reply(&self, prompt: &str) -> Result<String, LlmError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .lock()
            .map_err(|_| LlmError::HttpClient("mock lock poisoned".into()))?
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::HttpClient("mock has no scripted reply left".into())))
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(&self, _model: &str, prompt: &str) -> Result<String, LlmError> {
        self.next_reply(prompt).await
    }
}

#[async_trait]
impl VisionClient for MockLlmClient {
    async fn read_image(
        &self,
        _model: &str,
        prompt: &str,
        _image_data_url: &str,
    ) -> Result<String, LlmError> {
        self.next_reply(prompt).await
    }
}
