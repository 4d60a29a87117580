//! Interpretation of backend text into structured results.
//!
//! Backends are asked for a small JSON object but routinely wrap it in
//! markdown fences, prepend a language tag, add chatter around it, or leave
//! a trailing comma. [`decode`] tries several recovery strategies before
//! giving up:
//! 1. Direct `serde_json` deserialization of the trimmed text
//! 2. Extract JSON from a markdown code block
//! 3. Slice from the first `{` to the last `}`
//!
//! each of them also retried with trailing commas stripped.
//!
//! What a decode failure means is up to the caller: single-community flows
//! degrade to appending the raw text, two-community flows abort.

use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use zousui_types::{CultureUpdate, DiplomacyReport, MergedCulture, TwoSidedUpdate};

use crate::error::ParseError;

/// Outcome of interpreting a single-sided response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SingleSided {
    /// The response decoded into the expected shape.
    Structured(CultureUpdate),
    /// Nothing decodable; the raw response text.
    Unstructured(String),
}

/// Decode `raw` into `T`, trying every recovery strategy in turn.
///
/// `expected` names the shape for error reporting.
pub fn decode<T: DeserializeOwned>(raw: &str, expected: &'static str) -> Result<T, ParseError> {
    let trimmed = raw.trim();
    let mut last_error = String::from("empty response");

    for candidate in candidates(trimmed) {
        match serde_json::from_str::<T>(candidate) {
            Ok(parsed) => return Ok(parsed),
            Err(e) => last_error = e.to_string(),
        }
        let cleaned = strip_trailing_commas(candidate);
        if cleaned != candidate
            && let Ok(parsed) = serde_json::from_str::<T>(&cleaned)
        {
            return Ok(parsed);
        }
    }

    Err(ParseError {
        expected,
        message: last_error,
        raw: raw.to_owned(),
    })
}

/// Interpret a single-sided `{newCulture, populationChange}` response.
pub fn interpret_single(raw: &str) -> SingleSided {
    match decode::<CultureUpdate>(raw, "single-sided result") {
        Ok(update) => SingleSided::Structured(update),
        Err(e) => {
            warn!(error = %e, raw_response = raw, "unstructured single-sided response");
            SingleSided::Unstructured(raw.to_owned())
        }
    }
}

/// Interpret a two-sided response.
///
/// When both culture fields are empty the backend probably ignored the
/// two-sided instruction, so the text is decoded again as single-sided and
/// applied to side A only.
pub fn interpret_two_sided(raw: &str) -> Result<TwoSidedUpdate, ParseError> {
    let update = decode::<TwoSidedUpdate>(raw, "two-sided result")?;
    if !update.is_blank() {
        return Ok(update);
    }

    debug!("two-sided fields empty, retrying as single-sided");
    let single = decode::<CultureUpdate>(raw, "two-sided or single-sided result")?;
    Ok(TwoSidedUpdate::side_a_only(single))
}

/// Interpret a diplomacy response. Any failure is fatal to the caller,
/// including a report whose description is blank.
pub fn interpret_diplomacy(raw: &str) -> Result<DiplomacyReport, ParseError> {
    let report: DiplomacyReport = decode(raw, "diplomacy result")?;
    if report.description.trim().is_empty() {
        return Err(ParseError {
            expected: "diplomacy result",
            message: "description is empty".to_owned(),
            raw: raw.to_owned(),
        });
    }
    Ok(report)
}

/// Interpret a merge response, yielding `None` when no usable merged
/// culture came back.
pub fn interpret_merge(raw: &str) -> Option<String> {
    match decode::<MergedCulture>(raw, "merge result") {
        Ok(merged) if !merged.merged_culture.trim().is_empty() => Some(merged.merged_culture),
        Ok(_) => {
            warn!(raw_response = raw, "merge response had an empty culture");
            None
        }
        Err(e) => {
            warn!(error = %e, raw_response = raw, "unstructured merge response");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Recovery strategies
// ---------------------------------------------------------------------------

/// Candidate JSON slices of `text`, most literal first, without repeats.
fn candidates(text: &str) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::with_capacity(3);
    for candidate in [
        Some(text),
        extract_json_from_codeblock(text),
        extract_outer_object(text),
    ]
    .into_iter()
    .flatten()
    {
        if !candidate.is_empty() && !out.contains(&candidate) {
            out.push(candidate);
        }
    }
    out
}

/// Extract the body of the first markdown code block, skipping any
/// language tag on the opening fence line.
fn extract_json_from_codeblock(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = text.get(open.checked_add(3)?..)?;
    let body_start = after_fence.find('\n').and_then(|nl| nl.checked_add(1))?;
    let body = after_fence.get(body_start..)?;
    let end = body.find("```")?;
    body.get(..end).map(str::trim)
}

/// Slice from the first `{` to the last `}` inclusive.
fn extract_outer_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    text.get(start..=end)
}

/// Strip trailing commas before closing braces and brackets, outside of
/// string literals.
fn strip_trailing_commas(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for (idx, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            result.push(c);
            continue;
        }

        match c {
            '"' => in_string = true,
            ',' => {
                let rest = text.get(idx.saturating_add(1)..).unwrap_or_default();
                let next = rest.trim_start().chars().next();
                if matches!(next, Some('}' | ']')) {
                    continue;
                }
            }
            _ => {}
        }
        result.push(c);
    }

    result
}
