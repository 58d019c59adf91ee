//! Final pass/fail gate over both phase results.
//!
//! Pure and deterministic. Rule 1 (extraction) is checked before Rule 2
//! (simplification) and the first failure wins.

use crate::models::{GuardrailVerdict, Phase1Result, Phase2Result, StageStatus};

pub const HALLUCINATED_TESTS_REASON: &str = "hallucinated tests not present in input";
pub const EXPLANATION_FAILED_REASON: &str = "failed to generate patient explanation";

pub fn run_guardrails(phase1: &Phase1Result, phase2: &Phase2Result) -> GuardrailVerdict {
    if !extraction_usable(phase1) {
        return GuardrailVerdict::reject(HALLUCINATED_TESTS_REASON);
    }
    if !explanation_usable(phase2) {
        return GuardrailVerdict::reject(EXPLANATION_FAILED_REASON);
    }
    GuardrailVerdict::pass()
}

/// Rule 1: `ok` with a non-empty tests sequence.
fn extraction_usable(phase1: &Phase1Result) -> bool {
    phase1.status == StageStatus::Ok && phase1.tests.as_ref().is_some_and(|t| !t.is_empty())
}

/// Rule 2: `ok`, non-empty summary, explanations present (may be empty).
fn explanation_usable(phase2: &Phase2Result) -> bool {
    phase2.status == StageStatus::Ok
        && phase2.summary.as_deref().is_some_and(|s| !s.is_empty())
        && phase2.explanations.is_some()
}
