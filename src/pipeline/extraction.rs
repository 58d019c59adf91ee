use std::sync::Arc;
use std::time::Duration;

use super::input::NormalizedText;
use super::llm::{generate_within, LlmClient, LlmError};
use super::parser::parse_stage_output;
use super::prompt::build_extraction_prompt;
use super::sanitize::sanitize_for_llm;
use super::validation::enforce_extraction;
use crate::models::Phase1Result;

/// Phase 1: report text to structured measurements.
pub struct ExtractionStage {
    llm: Arc<dyn LlmClient>,
    model: String,
    timeout: Duration,
}

impl ExtractionStage {
    pub fn new(llm: Arc<dyn LlmClient>, model: &str, timeout: Duration) -> Self {
        Self {
            llm,
            model: model.to_string(),
            timeout,
        }
    }

    /// Only transport failures are errors. Unparseable or contract-violating
    /// output comes back as an `error`-status result.
    pub async fn extract(
        &self,
        text: &NormalizedText,
        ocr_confidence: Option<f32>,
    ) -> Result<Phase1Result, LlmError> {
        let clean = sanitize_for_llm(text.as_str());
        let prompt = build_extraction_prompt(&clean, ocr_confidence);

        let response = generate_within(self.llm.as_ref(), &self.model, &prompt, self.timeout).await?;

        let parsed: Phase1Result = parse_stage_output(&response);
        let result = enforce_extraction(parsed, text, ocr_confidence);

        tracing::info!(
            status = result.status.as_str(),
            test_count = result.tests().len(),
            confidence = result.confidence,
            reason = result.reason.as_deref().unwrap_or(""),
            "Extraction complete"
        );

        Ok(result)
    }
}
