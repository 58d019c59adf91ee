//! Prompt builders for both engine calls.
//!
//! The prompts are the output contract: both ask for one strict JSON object
//! and spell out the `unprocessed` shape the engine must use to refuse.

use crate::models::Phase1Result;

/// Below this OCR confidence the extraction prompt warns about misreads.
pub const LOW_OCR_CONFIDENCE: f32 = 0.70;

/// Starting estimate the engine is asked to report; validation caps it.
pub const DEFAULT_NORMALIZATION_CONFIDENCE: f32 = 0.85;

const EXTRACTION_RULES: &str = r#"Extract medical test data from the report text below.

IMPORTANT INSTRUCTIONS:
- The report may contain one or many tests.
- Panels (CBC, LFT, KFT, Lipid Panel, BMP, CMP, etc.) are NOT tests themselves.
- Every individual measurement inside a panel MUST be extracted as a SEPARATE test.
- DO NOT group multiple measurements under one test.

DATA EXTRACTION RULES:
1. Extract the value of each test.
2. Extract the unit of each test if present (e.g., g/dL, /uL).
3. Extract the status of each test if present (e.g., Low, Normal, High).
4. Extract reference ranges if present (e.g., 12-15 g/dL).
5. Include any additional field explicitly present in the text.
6. Fix minor typos in test names (e.g., Hemglobin -> Hemoglobin) without changing meaning.
7. DO NOT infer missing values or units; only include what is clearly in the text.
8. If the text is NOT a medical report, return:
   { "status": "unprocessed", "reason": "not a medical report" }"#;

const EXTRACTION_FORBIDDEN: &str = r#"ABSOLUTELY FORBIDDEN:
- Grouping multiple tests under panel names
- Returning panel names as test names
- Combining multiple measurements into one test
- Returning null for fields that exist in the input

Return JSON ONLY. No markdown or explanations."#;

/// Build the Phase 1 prompt.
///
/// `ocr_confidence` is `None` for text-only input, which is reported to the
/// engine as full confidence.
pub fn build_extraction_prompt(report_text: &str, ocr_confidence: Option<f32>) -> String {
    let confidence = ocr_confidence.unwrap_or(1.0).clamp(0.0, 1.0);
    let confidence_note = match ocr_confidence {
        Some(c) if c < LOW_OCR_CONFIDENCE => {
            "NOTE: Part of this text was read from an image with LOW confidence. \
             Some characters may be misread. Do not guess values you cannot read.\n\n"
        }
        _ => "",
    };

    format!(
        r#"{confidence_note}{EXTRACTION_RULES}

INPUT TEXT:
"""
{report_text}
"""

OUTPUT JSON FORMAT (fields vary per test; include only those present):

SUCCESS:
{{
  "tests_raw": [
    "Exact raw test lines from the report"
  ],
  "tests": [
    {{
      "name": "string",
      "fields": {{
        "value": number,
        "unit": "string if present",
        "status": "low | normal | high if present",
        "ref_range": {{ "low": number, "high": number }},
        "...any_other_field_present_in_text": "value"
      }}
    }}
  ],
  "confidence": {confidence:.2},
  "normalization_confidence": {DEFAULT_NORMALIZATION_CONFIDENCE:.2},
  "status": "ok"
}}

FAILURE:
{{
  "status": "unprocessed",
  "reason": "not a medical report"
}}

{EXTRACTION_FORBIDDEN}
"#
    )
}

/// Build the Phase 2 prompt from the extraction result, serialized as-is.
///
/// Serialization of `Phase1Result` cannot fail (string keys, finite numbers),
/// but an empty object is sent rather than panicking if it ever does.
pub fn build_simplification_prompt(phase1: &Phase1Result) -> String {
    let input = serde_json::to_string(phase1).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to serialize extraction result");
        "{}".to_string()
    });

    format!(
        r#"Explain medical test results in simple patient language.

RULES:
- Use ONLY the provided test fields.
- Explain each test separately, using exactly the test name given in the input.
- DO NOT diagnose. Never tell the reader they have a condition.
- Write a 2-3 sentence summary of the whole report.
- If an explanation would require data that is missing from the input, STOP and
  return the unprocessed response below.

INPUT:
{input}

JSON OUTPUT FORMAT (STRICT):
{{
  "status": "ok",
  "summary": "A 2-3 sentence overview of the entire report.",
  "explanations": [
    {{
      "test": "Test Name",
      "explanation": "What this test measures and what this specific result might indicate."
    }}
  ]
}}

OR

{{ "status": "unprocessed", "reason": "hallucinated data" }}

Return JSON ONLY. No markdown or explanations.
"#
    )
}

/// Vision OCR instruction. The engine must answer with the sentinel when the
/// image carries no readable text.
pub const VISION_OCR_PROMPT: &str = "\
Transcribe ALL visible text from this medical report image exactly as printed. \
Keep one result per line, with its value, unit, flag and reference range in the \
same order as the image. Do not correct, interpret or summarize anything. \
Output plain text only. If the image contains no readable text, reply exactly NO_TEXT.";

/// Sentinel returned by the vision model for images without text.
pub const VISION_NO_TEXT: &str = "NO_TEXT";
