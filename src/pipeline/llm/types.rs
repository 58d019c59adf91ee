use std::time::Duration;

use async_trait::async_trait;

use super::LlmError;

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model for both phases.
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// Connection settings for the generative engine, built once at startup.
#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    /// Sent as `HTTP-Referer` when set.
    pub site_url: Option<String>,
    /// Sent as `X-Title` when set.
    pub site_name: Option<String>,
    pub timeout: Duration,
}

impl LlmConfig {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            site_url: None,
            site_name: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("site_url", &self.site_url)
            .field("site_name", &self.site_name)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Text generation capability (allows mocking).
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single user prompt and return the raw text of the reply.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, LlmError>;
}

/// Image-to-text capability of a vision model, used for OCR.
#[async_trait]
pub trait VisionClient: Send + Sync {
    /// `image_data_url` is a `data:<mime>;base64,...` URL.
    async fn read_image(
        &self,
        model: &str,
        prompt: &str,
        image_data_url: &str,
    ) -> Result<String, LlmError>;
}
