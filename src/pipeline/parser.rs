use serde::de::DeserializeOwned;

use super::sanitize::extract_json_payload;
use crate::models::{Phase1Result, Phase2Result};

/// A stage result that can be read from engine text, or degraded to an
/// error-status value carrying the raw text when it can't.
pub trait StageOutput: DeserializeOwned {
    /// Stage label used in logs.
    const STAGE: &'static str;

    fn malformed(raw: String) -> Self;
}

impl StageOutput for Phase1Result {
    const STAGE: &'static str = "extraction";

    fn malformed(raw: String) -> Self {
        Phase1Result::malformed(raw)
    }
}

impl StageOutput for Phase2Result {
    const STAGE: &'static str = "simplification";

    fn malformed(raw: String) -> Self {
        Phase2Result::malformed(raw)
    }
}

/// Parse an engine reply into a stage result. Never fails: anything that is
/// not the expected JSON shape becomes `T::malformed(original_text)`.
pub fn parse_stage_output<T: StageOutput>(response: &str) -> T {
    let payload = extract_json_payload(response);
    match serde_json::from_str::<T>(payload) {
        Ok(parsed) => parsed,
        Err(e) => {
            // Position and category only; the message can quote content
            tracing::warn!(
                stage = T::STAGE,
                category = ?e.classify(),
                line = e.line(),
                column = e.column(),
                response_len = response.len(),
                "Engine reply is not valid stage JSON"
            );
            T::malformed(response.to_string())
        }
    }
}
