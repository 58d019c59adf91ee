pub mod extraction;
pub mod guardrail;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod orchestrator; // Report pipeline state machine
pub mod parser;
pub mod prompt;
pub mod sanitize;
pub mod simplification;
pub mod validation;

pub use orchestrator::{PipelineOutcome, ReportPipeline};

use thiserror::Error;

use self::llm::LlmError;
use self::ocr::OcrError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No input provided")]
    NoInput,

    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl PipelineError {
    pub fn is_timeout(&self) -> bool {
        match self {
            PipelineError::NoInput => false,
            PipelineError::Ocr(e) => e.is_timeout(),
            PipelineError::Llm(e) => e.is_timeout(),
        }
    }
}
