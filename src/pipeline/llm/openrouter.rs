use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};

use super::types::{LlmClient, LlmConfig, VisionClient};
use super::LlmError;

/// HTTP client for OpenAI-compatible chat completion APIs (OpenRouter by default).
pub struct OpenRouterClient {
    base_url: String,
    client: reqwest::Client,
    timeout: std::time::Duration,
}

impl OpenRouterClient {
    /// Build a client with the API key and attribution headers baked in as
    /// default headers.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            header_value(&format!("Bearer {}", config.api_key))?,
        );
        if let Some(url) = &config.site_url {
            headers.insert("HTTP-Referer", header_value(url)?);
        }
        if let Some(name) = &config.site_name {
            headers.insert("X-Title", header_value(name)?);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| LlmError::Config(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            timeout: config.timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn chat(&self, request: &ChatRequest<'_>) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout)
                } else if e.is_connect() {
                    LlmError::Connection(self.base_url.clone())
                } else {
                    LlmError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(self.timeout)
            } else {
                LlmError::ResponseParsing(e.to_string())
            }
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

fn header_value(raw: &str) -> Result<HeaderValue, LlmError> {
    HeaderValue::from_str(raw).map_err(|_| LlmError::Config("header contains invalid characters".into()))
}

/// Request body for /chat/completions
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

/// Response body from /chat/completions
#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

fn text_request<'a>(model: &'a str, prompt: &'a str) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![ChatMessage {
            role: "user",
            content: MessageContent::Text(prompt),
        }],
        stream: false,
    }
}

fn vision_request<'a>(model: &'a str, prompt: &'a str, image_data_url: &'a str) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![ChatMessage {
            role: "user",
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: prompt },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: image_data_url },
                },
            ]),
        }],
        stream: false,
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, LlmError> {
        let start = std::time::Instant::now();
        let result = self.chat(&text_request(model, prompt)).await;
        tracing::debug!(
            model,
            elapsed_ms = %start.elapsed().as_millis(),
            ok = result.is_ok(),
            "Generation call finished"
        );
        result
    }
}

#[async_trait]
impl VisionClient for OpenRouterClient {
    async fn read_image(
        &self,
        model: &str,
        prompt: &str,
        image_data_url: &str,
    ) -> Result<String, LlmError> {
        self.chat(&vision_request(model, prompt, image_data_url)).await
    }
}
