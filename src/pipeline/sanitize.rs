// Input hygiene before text reaches the generative engine, and output
// sanitation before engine text reaches the JSON parser.

/// Maximum input length sent to the engine (characters).
pub const MAX_INPUT_CHARS: usize = 50_000;

const TRUNCATION_MARKER: &str = "…[TRUNCATED]";

/// Clean report text for prompting: drop invisible characters and lines
/// that try to steer the engine, normalize whitespace, cap the length.
pub fn sanitize_for_llm(raw: &str) -> String {
    let visible = remove_invisible_chars(raw);
    let (kept, removed) = remove_injection_lines(&visible);

    if removed > 0 {
        // Never log the content itself
        tracing::warn!(removed_lines = removed, "Injection patterns removed from report input");
    }

    truncate_chars(&normalize_whitespace(&kept), MAX_INPUT_CHARS)
}

/// Strip zero-width, bidi and control characters. Keeps space, tab, newline.
fn remove_invisible_chars(text: &str) -> String {
    text.chars()
        .filter(|c| {
            if matches!(*c, ' ' | '\n' | '\t' | '\r') {
                return true;
            }
            let invisible = matches!(
                *c,
                '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2064}' | '\u{FEFF}'
            );
            !invisible && !c.is_control()
        })
        .collect()
}

const ROLE_MARKERS: &[&str] = &[
    "system:",
    "assistant:",
    "user:",
    "[system]",
    "[assistant]",
    "[inst]",
    "[/inst]",
    "<<sys>>",
    "note to ai:",
    "ai instructions:",
    "system instructions:",
    "updated instructions:",
    "<instruction",
    "</instruction",
    "<system",
    "</system",
];

const OVERRIDE_PHRASES: &[&str] = &[
    "ignore previous instructions",
    "ignore all instructions",
    "ignore the above instructions",
    "disregard your instructions",
    "disregard all instructions",
    "forget your instructions",
    "new instructions:",
    "return status ok",
    "output the following json",
];

fn is_injection(lowered: &str) -> bool {
    ROLE_MARKERS.iter().any(|m| lowered.starts_with(m))
        || OVERRIDE_PHRASES.iter().any(|p| lowered.contains(p))
}

/// Drop injection lines. An override phrase split across two lines is caught
/// by checking each line joined with the next when neither matches alone.
fn remove_injection_lines(text: &str) -> (String, usize) {
    let lines: Vec<&str> = text.lines().collect();
    let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
    let mut removed = 0usize;
    let mut i = 0;

    while i < lines.len() {
        let current = lines[i].trim().to_lowercase();
        if is_injection(&current) {
            removed += 1;
            i += 1;
            continue;
        }

        if let Some(next) = lines.get(i + 1) {
            let next = next.trim().to_lowercase();
            if !is_injection(&next) && is_injection(&format!("{current} {next}")) {
                removed += 2;
                i += 2;
                continue;
            }
        }

        kept.push(lines[i]);
        i += 1;
    }

    (kept.join("\n"), removed)
}

/// Trim every line, collapse runs of blank lines, drop leading/trailing blanks.
fn normalize_whitespace(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() && out.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last() == Some(&"") {
        out.pop();
    }
    out.join("\n")
}

/// Cap at `max_chars` characters, cutting at the last whitespace before the limit.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };
    let head = &text[..cut];
    let end = head.rfind(char::is_whitespace).unwrap_or(cut);
    format!("{}{TRUNCATION_MARKER}", &text[..end])
}

/// Isolate the JSON object in an engine reply.
///
/// Engines wrap JSON in markdown fences or add a sentence before/after it
/// despite instructions. Takes the first fenced block when present, then
/// slices from the first `{` to the last `}`. Returns the trimmed input
/// unchanged when no object delimiters exist, so the parser reports the error.
pub fn extract_json_payload(response: &str) -> &str {
    let body = strip_code_fences(response);
    match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => body,
    }
}

/// Return the content of the first ``` fenced block, or the trimmed text when
/// there is none. An unclosed fence yields everything after the opener.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };
    let after_open = &trimmed[open + 3..];
    // Skip the info string (`json`, `markdown`, ...) up to the end of its line
    let content_start = after_open.find('\n').map_or(after_open.len(), |n| n + 1);
    let info = after_open[..content_start].trim();
    let content = if info.contains('{') {
        // Opener and JSON on the same line: "```{...}```"
        after_open
    } else {
        &after_open[content_start..]
    };
    match content.find("```") {
        Some(close) => content[..close].trim(),
        None => content.trim(),
    }
}
