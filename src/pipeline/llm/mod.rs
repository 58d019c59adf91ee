pub mod types;
pub mod openrouter;
pub mod mock;

pub use types::*;
pub use openrouter::*;
pub use mock::*;

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Generation engine is not reachable at {0}")]
    Connection(String),

    #[error("Generation request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Generation engine returned error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Generation engine returned no content")]
    EmptyResponse,

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl LlmError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LlmError::Timeout(_))
    }
}

/// Run one generation call under a hard time budget.
///
/// The HTTP client carries its own timeout, but this bound also covers
/// engines that are not HTTP-backed.
pub async fn generate_within(
    client: &dyn LlmClient,
    model: &str,
    prompt: &str,
    budget: Duration,
) -> Result<String, LlmError> {
    match tokio::time::timeout(budget, client.generate(model, prompt)).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout(budget)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_distinguishable() {
        assert!(LlmError::Timeout(Duration::from_secs(3)).is_timeout());
        assert!(!LlmError::EmptyResponse.is_timeout());
        assert!(!LlmError::Upstream { status: 504, body: String::new() }.is_timeout());
    }

    #[test]
    fn timeout_message_reports_budget() {
        let msg = LlmError::Timeout(Duration::from_millis(1500)).to_string();
        assert_eq!(msg, "Generation request timed out after 1500ms");
    }

    #[tokio::test]
    async fn generate_within_passes_result_through() {
        let client = MockLlmClient::new(&["hello"]);
        let out = generate_within(&client, "m", "p", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn generate_within_times_out_slow_engine() {
        let client = MockLlmClient::new(&["late"]).with_delay(Duration::from_millis(500));
        let err = generate_within(&client, "m", "p", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }
}
