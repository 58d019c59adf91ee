// Post-parse enforcement of the prompt contracts.
// The engine is asked to follow the rules; these checks make sure it did.
// Only `status: ok` results are touched and `tests` are never rewritten:
// a violation demotes the status and records a reason.

use std::sync::LazyLock;

use regex::Regex;

use super::input::NormalizedText;
use crate::models::{FieldValue, Phase1Result, Phase2Result, StageStatus, TestMeasurement};

pub const PANEL_NAME_REASON: &str = "panel name returned as test";
pub const UNGROUNDED_VALUES_REASON: &str = "extracted values not present in input";
pub const DIAGNOSTIC_CLAIM_REASON: &str = "diagnostic claim in explanation";

/// How far the engine's mapping confidence may exceed the OCR confidence.
const NORMALIZATION_MARGIN: f32 = 0.05;

// ──────────────────────────────────────────────
// Phase 1
// ──────────────────────────────────────────────

/// Apply confidence caps, panel-name and value-grounding checks.
pub fn enforce_extraction(
    mut result: Phase1Result,
    input: &NormalizedText,
    ocr_confidence: Option<f32>,
) -> Phase1Result {
    if result.status != StageStatus::Ok {
        return result;
    }

    let confidence = ocr_confidence.unwrap_or(1.0).clamp(0.0, 1.0);
    result.confidence = confidence;
    result.normalization_confidence = clamp_unit(result.normalization_confidence)
        .min(confidence + NORMALIZATION_MARGIN)
        .min(1.0);

    let tests = result.tests();

    if let Some(panel) = tests.iter().find(|t| is_panel_name(&t.name)) {
        tracing::warn!(
            test_count = tests.len(),
            name_len = panel.name.len(),
            "Extraction returned a panel as a test"
        );
        return demote(result, PANEL_NAME_REASON);
    }

    let source_numbers = numbers_in(input.as_str());
    let ungrounded = tests
        .iter()
        .filter(|t| !numeric_fields(t).all(|v| is_grounded(v, &source_numbers)))
        .count();
    if ungrounded > 0 {
        tracing::warn!(
            test_count = tests.len(),
            ungrounded,
            "Extracted values not found in report text"
        );
        return demote(result, UNGROUNDED_VALUES_REASON);
    }

    result
}

fn demote(mut result: Phase1Result, reason: &str) -> Phase1Result {
    result.status = StageStatus::Error;
    result.reason = Some(reason.to_string());
    result
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Panel labels that are never a single measurement.
const PANEL_NAMES: &[&str] = &[
    "cbc",
    "fbc",
    "complete blood count",
    "full blood count",
    "complete blood picture",
    "hemogram",
    "haemogram",
    "lft",
    "lfts",
    "kft",
    "kfts",
    "rft",
    "rfts",
    "bmp",
    "cmp",
    "tft",
    "tfts",
    "ue",
    "u e",
    "lipid profile",
    "lipid panel",
    "liver function tests",
    "kidney function tests",
    "renal function tests",
    "thyroid function tests",
    "basic metabolic panel",
    "comprehensive metabolic panel",
];

/// Stems that name a panel only when followed by a panel suffix
/// ("Iron" is a test, "Iron studies" is not).
const PANEL_STEMS: &[&str] = &[
    "cbc",
    "blood count",
    "complete blood count",
    "lipid",
    "liver function",
    "kidney function",
    "renal function",
    "thyroid",
    "thyroid function",
    "metabolic",
    "basic metabolic",
    "comprehensive metabolic",
    "electrolyte",
    "electrolytes",
    "coagulation",
    "iron",
    "hepatic",
];

const PANEL_SUFFIXES: &[&str] = &["panel", "profile", "test", "tests", "screen", "studies", "report"];

/// Whether a test name is actually a panel label. Matches the whole name and
/// the part before a parenthetical ("Complete Blood Count (CBC)").
pub fn is_panel_name(name: &str) -> bool {
    let outer = name.split('(').next().unwrap_or(name);
    [normalize_label(name), normalize_label(outer)]
        .iter()
        .any(|label| matches_panel(label))
}

fn matches_panel(label: &str) -> bool {
    if label.is_empty() {
        return false;
    }
    if PANEL_NAMES.contains(&label) {
        return true;
    }
    match label.rsplit_once(' ') {
        Some((stem, suffix)) => PANEL_SUFFIXES.contains(&suffix) && PANEL_STEMS.contains(&stem),
        None => false,
    }
}

/// Lowercase, punctuation to spaces, single-spaced.
fn normalize_label(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:[.,]\d+)*|\.\d+").expect("Invalid number regex"));

/// Every number printed in the text. "1,200" yields both 1200 and 1.2 since
/// the separator is ambiguous across locales.
fn numbers_in(text: &str) -> Vec<f64> {
    let mut out = Vec::new();
    for m in NUMBER.find_iter(text) {
        let token = m.as_str();
        if let Ok(v) = token.replace(',', "").parse::<f64>() {
            out.push(v);
        }
        if token.matches(',').count() == 1 && !token.contains('.') {
            if let Ok(v) = token.replace(',', ".").parse::<f64>() {
                out.push(v);
            }
        }
    }
    out
}

/// `value` and `ref_range` bounds that carry a number.
fn numeric_fields(test: &TestMeasurement) -> impl Iterator<Item = f64> + '_ {
    let value = test.fields.get("value").and_then(FieldValue::as_f64);
    let bounds = test
        .ref_range()
        .map(|r| [r.low, r.high])
        .into_iter()
        .flatten();
    value.into_iter().chain(bounds)
}

/// A leading minus may be a range dash in the source, so signs are ignored.
fn is_grounded(value: f64, source: &[f64]) -> bool {
    let v = value.abs();
    source
        .iter()
        .any(|n| (n - v).abs() <= 1e-9 * v.max(1.0))
}

// ──────────────────────────────────────────────
// Phase 2
// ──────────────────────────────────────────────

static DIAGNOSTIC_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\byou\s+have\s+been\s+diagnosed\s+with\b",
        r"(?i)\byou\s+(?:likely\s+|probably\s+|definitely\s+)?have\s+(?:an?\s+)?(?:[a-z-]+\s+){0,2}(?:disease|disorder|infection|condition|deficiency|syndrome|cancer|failure|anemia|anaemia|diabetes|hypothyroidism|hyperthyroidism|leukemia|leukaemia)\b",
        r"(?i)\byou\s+are\s+suffering\s+from\b",
        r"(?i)\bthis\s+(?:means|indicates|suggests|confirms)\s+(?:you|that\s+you)\s+have\b",
        r"(?i)\byou(?:'re|\s+are)\s+(?:a\s+)?(?:diabetic|anemic|anaemic)\b",
        r"(?i)\byour\s+diagnosis\s+is\b",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("Invalid diagnostic regex"))
    .collect()
});

/// Negation earlier in the same clause ("does not mean you have ...").
static NEGATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:not|never|no\s+(?:sign|signs|evidence|indication))\b|n't\b")
        .expect("Invalid negation regex")
});

const CLAUSE_BREAKS: &[char] = &['.', ';', ':', '!', '?', ',', '\n'];

/// Whether text makes a direct diagnostic claim about the reader.
///
/// A match is ignored when its clause negates it before the match starts.
pub fn contains_diagnostic_claim(text: &str) -> bool {
    DIAGNOSTIC_PATTERNS.iter().any(|re| {
        re.find_iter(text).any(|m| {
            let before = &text[..m.start()];
            let clause_start = before.rfind(CLAUSE_BREAKS).map_or(0, |i| i + 1);
            !NEGATION.is_match(&before[clause_start..])
        })
    })
}

/// Demote diagnostic output; warn about explanations for unknown tests.
pub fn enforce_simplification(mut result: Phase2Result, phase1: &Phase1Result) -> Phase2Result {
    if result.status != StageStatus::Ok {
        return result;
    }

    let explanations = result.explanations.as_deref().unwrap_or_default();

    let unknown = explanations
        .iter()
        .filter(|e| !phase1.tests().iter().any(|t| t.name.eq_ignore_ascii_case(&e.test)))
        .count();
    if unknown > 0 {
        tracing::warn!(
            unknown,
            explanation_count = explanations.len(),
            "Explanations reference tests absent from extraction"
        );
    }

    let diagnostic = result.summary.as_deref().is_some_and(contains_diagnostic_claim)
        || explanations
            .iter()
            .any(|e| contains_diagnostic_claim(&e.explanation));
    if diagnostic {
        tracing::warn!("Simplification output contains diagnostic language");
        result.status = StageStatus::Unprocessed;
        result.reason = Some(DIAGNOSTIC_CLAIM_REASON.to_string());
    }

    result
}
