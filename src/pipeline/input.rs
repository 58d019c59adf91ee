use super::PipelineError;

/// Combined report text handed to extraction. Never blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText(String);

impl NormalizedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for NormalizedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Merge typed text and OCR text into one report.
///
/// Typed text comes first so corrections and context precede recognized
/// text. Each part is trimmed and blank parts are skipped. No length limit
/// is applied here.
pub fn normalize_input(
    text: Option<&str>,
    ocr_text: Option<&str>,
) -> Result<NormalizedText, PipelineError> {
    let parts: Vec<&str> = [text, ocr_text]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if parts.is_empty() {
        return Err(PipelineError::NoInput);
    }

    Ok(NormalizedText(parts.join("\n")))
}
