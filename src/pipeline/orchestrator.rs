//! Report pipeline: input → OCR → extraction → simplification → guardrail.
//!
//! One sequential pass per request, no retries. Every run ends in exactly
//! one [`PipelineOutcome`]; nothing is carried over between runs.

use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;
use uuid::Uuid;

use super::extraction::ExtractionStage;
use super::guardrail::run_guardrails;
use super::input::normalize_input;
use super::llm::LlmClient;
use super::ocr::{OcrAdapter, OcrEngine, OcrFailurePolicy};
use super::simplification::SimplificationStage;
use super::PipelineError;
use crate::models::{FinalReport, RawInput};

/// Terminal state of one run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Success(FinalReport),
    /// The guardrail refused the phase results.
    Rejected { reason: String },
    /// Neither text nor image carried any content.
    InputError,
    /// OCR or generation engine failure; `timeout` marks a retryable one.
    UpstreamFailure { message: String, timeout: bool },
}

/// Per-deployment pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub model: String,
    /// Budget for each external call (OCR, Phase 1, Phase 2).
    pub timeout: Duration,
    pub ocr_policy: OcrFailurePolicy,
}

pub struct ReportPipeline {
    ocr: OcrAdapter,
    extraction: ExtractionStage,
    simplification: SimplificationStage,
}

impl ReportPipeline {
    pub fn new(ocr: OcrAdapter, extraction: ExtractionStage, simplification: SimplificationStage) -> Self {
        Self {
            ocr,
            extraction,
            simplification,
        }
    }

    /// Wire both stages to one generation client.
    pub fn build(
        llm: Arc<dyn LlmClient>,
        ocr_engine: Arc<dyn OcrEngine>,
        settings: &PipelineSettings,
    ) -> Self {
        Self::new(
            OcrAdapter::new(ocr_engine, settings.ocr_policy, settings.timeout),
            ExtractionStage::new(llm.clone(), &settings.model, settings.timeout),
            SimplificationStage::new(llm, &settings.model, settings.timeout),
        )
    }

    pub async fn run(&self, input: RawInput) -> PipelineOutcome {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("report_run", %request_id);

        async move {
            let start = std::time::Instant::now();
            let outcome = match self.execute(input).await {
                Ok(outcome) => outcome,
                Err(PipelineError::NoInput) => {
                    tracing::info!("Rejected request without input");
                    PipelineOutcome::InputError
                }
                Err(e) => {
                    tracing::error!(error = %e, timeout = e.is_timeout(), "Upstream engine failure");
                    PipelineOutcome::UpstreamFailure {
                        message: e.to_string(),
                        timeout: e.is_timeout(),
                    }
                }
            };
            tracing::info!(
                outcome = outcome.label(),
                elapsed_ms = %start.elapsed().as_millis(),
                "Report run finished"
            );
            outcome
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, input: RawInput) -> Result<PipelineOutcome, PipelineError> {
        let has_text = input.has_text();
        let has_image = input.has_image();
        if !has_text && !has_image {
            return Err(PipelineError::NoInput);
        }
        let RawInput { text, image } = input;

        tracing::info!(
            has_text,
            has_image,
            text_len = text.as_deref().map_or(0, str::len),
            image_bytes = image.as_deref().map_or(0, <[u8]>::len),
            "Report run started"
        );

        let ocr = match image.filter(|b| !b.is_empty()) {
            Some(bytes) => Some(
                self.ocr
                    .recognize(&bytes)
                    .instrument(tracing::info_span!("ocr"))
                    .await?,
            ),
            None => None,
        };

        let normalized = normalize_input(text.as_deref(), ocr.as_ref().map(|o| o.text.as_str()))?;
        let ocr_confidence = ocr.as_ref().map(|o| o.confidence);

        let phase1 = self
            .extraction
            .extract(&normalized, ocr_confidence)
            .instrument(tracing::info_span!("extraction"))
            .await?;

        let phase2 = self
            .simplification
            .simplify(&phase1)
            .instrument(tracing::info_span!("simplification"))
            .await?;

        let verdict = run_guardrails(&phase1, &phase2);
        if !verdict.valid {
            let reason = verdict.reason.unwrap_or_default();
            tracing::info!(reason = %reason, "Guardrail rejected report");
            return Ok(PipelineOutcome::Rejected { reason });
        }

        Ok(PipelineOutcome::Success(FinalReport::new(
            phase1.tests.unwrap_or_default(),
            phase2.summary.unwrap_or_default(),
        )))
    }
}

impl PipelineOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            PipelineOutcome::Success(_) => "success",
            PipelineOutcome::Rejected { .. } => "rejected",
            PipelineOutcome::InputError => "input_error",
            PipelineOutcome::UpstreamFailure { .. } => "upstream_failure",
        }
    }
}
