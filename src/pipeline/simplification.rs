use std::sync::Arc;
use std::time::Duration;

use super::llm::{generate_within, LlmClient, LlmError};
use super::parser::parse_stage_output;
use super::prompt::build_simplification_prompt;
use super::validation::enforce_simplification;
use crate::models::{Phase1Result, Phase2Result};

/// Phase 2: structured measurements to a patient-friendly explanation.
///
/// Runs on whatever Phase 1 produced, including non-`ok` results; the
/// guardrail decides afterwards.
pub struct SimplificationStage {
    llm: Arc<dyn LlmClient>,
    model: String,
    timeout: Duration,
}

impl SimplificationStage {
    pub fn new(llm: Arc<dyn LlmClient>, model: &str, timeout: Duration) -> Self {
        Self {
            llm,
            model: model.to_string(),
            timeout,
        }
    }

    pub async fn simplify(&self, phase1: &Phase1Result) -> Result<Phase2Result, LlmError> {
        let prompt = build_simplification_prompt(phase1);
        let response = generate_within(self.llm.as_ref(), &self.model, &prompt, self.timeout).await?;

        let parsed: Phase2Result = parse_stage_output(&response);
        let result = enforce_simplification(parsed, phase1);

        tracing::info!(
            status = result.status.as_str(),
            explanation_count = result.explanations.as_ref().map_or(0, Vec::len),
            reason = result.reason.as_deref().unwrap_or(""),
            "Simplification complete"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StageStatus, TestMeasurement};
    use crate::pipeline::llm::MockLlmClient;
    use crate::pipeline::validation::DIAGNOSTIC_CLAIM_REASON;

    fn phase1() -> Phase1Result {
        Phase1Result::ok(
            vec![TestMeasurement::new("Hemoglobin")
                .with_field("value", 10.0)
                .with_field("status", "Low")],
            1.0,
            0.85,
        )
    }

    fn stage(client: Arc<MockLlmClient>) -> SimplificationStage {
        SimplificationStage::new(client, "openai/gpt-4o-mini", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn explains_each_test() {
        let reply = r#"```json
{"status": "ok", "summary": "One result is slightly low. Everything else was not measured.", "explanations": [{"test": "Hemoglobin", "explanation": "Hemoglobin carries oxygen. Yours is below the usual range."}]}
```"#;
        let client = Arc::new(MockLlmClient::new(&[reply]));
        let result = stage(client.clone()).simplify(&phase1()).await.unwrap();

        assert_eq!(result.status, StageStatus::Ok);
        assert_eq!(result.explanations.as_ref().unwrap()[0].test, "Hemoglobin");
        assert!(client.prompts()[0].contains("\"name\":\"Hemoglobin\""));
    }

    #[tokio::test]
    async fn runs_on_unprocessed_phase1() {
        let reply = r#"{"status": "unprocessed", "reason": "hallucinated data"}"#;
        let client = Arc::new(MockLlmClient::new(&[reply]));
        let result = stage(client.clone())
            .simplify(&Phase1Result::unprocessed("not a medical report"))
            .await
            .unwrap();

        assert_eq!(result.status, StageStatus::Unprocessed);
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn diagnostic_reply_is_demoted() {
        let reply = r#"{"status": "ok", "summary": "You are suffering from anemia.", "explanations": []}"#;
        let result = stage(Arc::new(MockLlmClient::new(&[reply])))
            .simplify(&phase1())
            .await
            .unwrap();
        assert_eq!(result.status, StageStatus::Unprocessed);
        assert_eq!(result.reason.as_deref(), Some(DIAGNOSTIC_CLAIM_REASON));
    }

    #[tokio::test]
    async fn truncated_reply_degrades() {
        let reply = r#"{"status": "ok", "summary": "Your hemo"#;
        let result = stage(Arc::new(MockLlmClient::new(&[reply])))
            .simplify(&phase1())
            .await
            .unwrap();
        assert_eq!(result.status, StageStatus::Error);
        assert_eq!(result.raw.as_deref(), Some(reply));
    }

    #[tokio::test]
    async fn upstream_error_propagates() {
        let client = MockLlmClient::new(&[]).then_fail(LlmError::Upstream {
            status: 502,
            body: "bad gateway".into(),
        });
        let err = stage(Arc::new(client)).simplify(&phase1()).await.unwrap_err();
        assert!(err.to_string().contains("bad gateway"));
    }
}
