//! Request-scoped data model for one report run.
//!
//! Everything here is created at the start of a pipeline run and dropped at
//! the end of it. Phase results are deserialized from untrusted engine
//! output, so optional shapes stay optional and the guardrail decides.

use std::collections::BTreeMap;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::enums::{ResultFlag, StageStatus};

/// What the caller submitted: free text, an image, or both.
#[derive(Debug, Clone, Default)]
pub struct RawInput {
    pub text: Option<String>,
    pub image: Option<Vec<u8>>,
}

impl RawInput {
    pub fn from_text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            image: None,
        }
    }

    pub fn with_image(mut self, image: Vec<u8>) -> Self {
        self.image = Some(image);
        self
    }

    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    pub fn has_image(&self) -> bool {
        self.image.as_deref().is_some_and(|b| !b.is_empty())
    }
}

/// Reference interval printed next to a result, e.g. `(12-15)`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceRange {
    pub low: f64,
    pub high: f64,
}

impl ReferenceRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }
}

// Whole bounds are written without a fraction, as they appear in reports.
impl Serialize for ReferenceRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ReferenceRange", 2)?;
        s.serialize_field("low", &json_number(self.low))?;
        s.serialize_field("high", &json_number(self.high))?;
        s.end()
    }
}

fn json_number(v: f64) -> serde_json::Value {
    if v.fract() == 0.0 && v.abs() < 9.0e15 {
        serde_json::Value::from(v as i64)
    } else {
        serde_json::Value::from(v)
    }
}

/// One entry of a measurement's field map. Keys other than the well-known
/// ones (`value`, `unit`, `status`, `ref_range`) pass through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(serde_json::Number),
    Flag(bool),
    Text(String),
    Range(ReferenceRange),
    Other(serde_json::Value),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => n.as_f64(),
            FieldValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        serde_json::Number::from_f64(v)
            .map(FieldValue::Number)
            .unwrap_or(FieldValue::Other(serde_json::Value::Null))
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<ReferenceRange> for FieldValue {
    fn from(v: ReferenceRange) -> Self {
        FieldValue::Range(v)
    }
}

/// A single discrete measurement ("Hemoglobin"), never a panel ("CBC").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestMeasurement {
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl TestMeasurement {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn value(&self) -> Option<f64> {
        self.fields.get("value").and_then(FieldValue::as_f64)
    }

    pub fn unit(&self) -> Option<&str> {
        self.fields.get("unit").and_then(FieldValue::as_str)
    }

    pub fn status(&self) -> Option<ResultFlag> {
        self.fields
            .get("status")
            .and_then(FieldValue::as_str)
            .and_then(ResultFlag::parse_loose)
    }

    pub fn ref_range(&self) -> Option<ReferenceRange> {
        match self.fields.get("ref_range") {
            Some(FieldValue::Range(r)) => Some(*r),
            _ => None,
        }
    }
}

/// Output of the extraction stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase1Result {
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests: Option<Vec<TestMeasurement>>,
    /// Source lines the engine read each test from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tests_raw: Vec<String>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub confidence: f32,
    #[serde(default, deserialize_with = "lenient_score")]
    pub normalization_confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Original engine text when the output could not be parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl Phase1Result {
    pub fn ok(tests: Vec<TestMeasurement>, confidence: f32, normalization_confidence: f32) -> Self {
        Self {
            status: StageStatus::Ok,
            tests: Some(tests),
            tests_raw: Vec::new(),
            confidence,
            normalization_confidence,
            reason: None,
            raw: None,
        }
    }

    pub fn unprocessed(reason: &str) -> Self {
        Self {
            status: StageStatus::Unprocessed,
            tests: None,
            tests_raw: Vec::new(),
            confidence: 0.0,
            normalization_confidence: 0.0,
            reason: Some(reason.to_string()),
            raw: None,
        }
    }

    pub fn malformed(raw: String) -> Self {
        Self {
            status: StageStatus::Error,
            tests: None,
            tests_raw: Vec::new(),
            confidence: 0.0,
            normalization_confidence: 0.0,
            reason: None,
            raw: Some(raw),
        }
    }

    pub fn tests(&self) -> &[TestMeasurement] {
        self.tests.as_deref().unwrap_or_default()
    }
}

/// Scores are rewritten by validation, so a quoted or null score from the
/// engine reads as a number or 0 instead of failing the whole result.
fn lenient_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let score = value
        .as_ref()
        .and_then(|v| v.as_f64().or_else(|| v.as_str()?.trim().parse().ok()))
        .unwrap_or(0.0);
    Ok(score as f32)
}

/// Plain-language explanation of one test, keyed by the Phase 1 name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub test: String,
    pub explanation: String,
}

/// Output of the simplification stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase2Result {
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanations: Option<Vec<Explanation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl Phase2Result {
    pub fn ok(summary: &str, explanations: Vec<Explanation>) -> Self {
        Self {
            status: StageStatus::Ok,
            summary: Some(summary.to_string()),
            explanations: Some(explanations),
            reason: None,
            raw: None,
        }
    }

    pub fn unprocessed(reason: &str) -> Self {
        Self {
            status: StageStatus::Unprocessed,
            summary: None,
            explanations: None,
            reason: Some(reason.to_string()),
            raw: None,
        }
    }

    pub fn malformed(raw: String) -> Self {
        Self {
            status: StageStatus::Error,
            summary: None,
            explanations: None,
            reason: None,
            raw: Some(raw),
        }
    }
}

/// Pass/fail decision of the guardrail gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailVerdict {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl GuardrailVerdict {
    pub fn pass() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn reject(reason: &str) -> Self {
        Self {
            valid: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// The only payload returned to the caller on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub status: StageStatus,
    pub tests: Vec<TestMeasurement>,
    pub summary: String,
}

impl FinalReport {
    pub fn new(tests: Vec<TestMeasurement>, summary: String) -> Self {
        Self {
            status: StageStatus::Ok,
            tests,
            summary,
        }
    }
}
