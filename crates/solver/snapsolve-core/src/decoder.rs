//! Turns raw `generateContent` payloads into normalized task fields.
//!
//! The decoder never panics on model output. Anything that does not have the
//! expected shape becomes [`DecodeError::Malformed`]; an explicit "no text in
//! this image" answer is a successful decode with [`TaskOutcome::Empty`].

use gemini_async::types::GenerateContentResponse;
use serde::Deserialize;

use crate::error::DecodeError;
use crate::task::{
    OcrFields, SolveFields, StructuredFields, TaskOutcome, TaskType, TitleFields,
    TurboSolveFields,
};

/// Answers the model uses when it has nothing to say.
const PLACEHOLDER_ANSWERS: &[&str] = &["", "-", "?", "N/A", "NONE", "UNKNOWN"];

/// Highest option letter accepted inside a run such as `"bd"`.
const OPTION_LIMIT: char = 'h';
const MAX_OPTIONS: usize = 5;

/// Output of a successful decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Inner candidate text before parsing.
    pub raw_text: String,
    pub fields: StructuredFields,
    /// `Success` or `Empty`.
    pub outcome: TaskOutcome,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOcr {
    #[serde(default)]
    text: String,
    #[serde(default)]
    has_text: Option<bool>,
}

#[derive(Deserialize)]
struct RawSolve {
    #[serde(default)]
    lecture: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    solved: bool,
    #[serde(default)]
    answers: String,
}

#[derive(Deserialize)]
struct RawTitle {
    #[serde(default)]
    title: String,
}

pub struct ResponseDecoder;

impl ResponseDecoder {
    /// Decodes an undecoded success body for `task`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Malformed`] when the body is not a
    /// `generateContent` response or the candidate text does not match the
    /// task's schema.
    pub fn decode(task: TaskType, payload: &[u8]) -> Result<Decoded, DecodeError> {
        let response: GenerateContentResponse = serde_json::from_slice(payload)
            .map_err(|e| malformed(format!("response body is not valid JSON: {e}")))?;
        Self::decode_response(task, &response)
    }

    /// Decodes an already-parsed response.
    ///
    /// # Errors
    ///
    /// See [`ResponseDecoder::decode`].
    pub fn decode_response(
        task: TaskType,
        response: &GenerateContentResponse,
    ) -> Result<Decoded, DecodeError> {
        if response.candidates.is_empty() {
            return Err(match response.block_reason() {
                Some(reason) => malformed(format!("prompt blocked: {reason}")),
                None => malformed("response has no candidates"),
            });
        }
        let raw_text = response
            .first_text()
            .ok_or_else(|| malformed("first candidate has no text part"))?;
        Self::decode_text(task, &raw_text)
    }

    /// Parses the inner candidate text as the task's structured JSON.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Malformed`] when the text is not a JSON object
    /// of the expected shape.
    pub fn decode_text(task: TaskType, raw_text: &str) -> Result<Decoded, DecodeError> {
        let json = strip_code_fence(raw_text);
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| malformed(format!("candidate text is not JSON: {e}")))?;
        if !value.is_object() {
            return Err(malformed("candidate JSON is not an object"));
        }

        let (fields, outcome) = match task {
            TaskType::Ocr => decode_ocr(value)?,
            TaskType::Solve => {
                let raw: RawSolve = parse_fields(value, task)?;
                (
                    StructuredFields::Solve(SolveFields {
                        lecture: clean_scalar(&raw.lecture),
                        title: clean_scalar(&raw.title),
                        explanation: raw.explanation.trim().to_string(),
                        solved: raw.solved,
                        answers: normalize_answers(&raw.answers),
                    }),
                    TaskOutcome::Success,
                )
            }
            TaskType::TurboSolve => {
                let raw: RawSolve = parse_fields(value, task)?;
                (
                    StructuredFields::TurboSolve(TurboSolveFields {
                        lecture: clean_scalar(&raw.lecture),
                        title: clean_scalar(&raw.title),
                        solved: raw.solved,
                        answers: normalize_answers(&raw.answers),
                    }),
                    TaskOutcome::Success,
                )
            }
            TaskType::TitleGen => {
                let raw: RawTitle = parse_fields(value, task)?;
                (
                    StructuredFields::Title(TitleFields {
                        title: clean_scalar(&raw.title),
                    }),
                    TaskOutcome::Success,
                )
            }
        };

        Ok(Decoded {
            raw_text: raw_text.to_string(),
            fields,
            outcome,
        })
    }
}

fn malformed(msg: impl Into<String>) -> DecodeError {
    DecodeError::Malformed(msg.into())
}

fn parse_fields<T: for<'de> Deserialize<'de>>(
    value: serde_json::Value,
    task: TaskType,
) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|e| malformed(format!("{task} payload: {e}")))
}

fn decode_ocr(value: serde_json::Value) -> Result<(StructuredFields, TaskOutcome), DecodeError> {
    let raw: RawOcr = parse_fields(value, TaskType::Ocr)?;
    let text = strip_code_fence(&raw.text).trim().to_string();
    let has_text = raw.has_text.unwrap_or(!text.is_empty()) && !text.is_empty();
    let outcome = if has_text {
        TaskOutcome::Success
    } else {
        TaskOutcome::Empty
    };
    Ok((
        StructuredFields::Ocr(OcrFields {
            text: if has_text { text } else { String::new() },
            has_text,
        }),
        outcome,
    ))
}

/// Removes a surrounding Markdown code fence (```` ```json ... ``` ````).
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `JSON`, ...) on the opening line.
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Trims whitespace and Markdown emphasis/code markers from a short field.
fn clean_scalar(value: &str) -> String {
    value
        .trim()
        .trim_matches(|c: char| matches!(c, '`' | '*' | '_') || c.is_whitespace())
        .to_string()
}

fn is_placeholder(answer: &str) -> bool {
    PLACEHOLDER_ANSWERS
        .iter()
        .any(|p| p.eq_ignore_ascii_case(answer))
}

/// Canonical answer label.
///
/// Option letters are uppercased and joined with `", "`, whether the model
/// separated them (`"a,c"`, `"a and c"`) or ran them together (`"bd"`).
/// Any other answer keeps its content. Placeholders become the empty string.
pub fn normalize_answers(raw: &str) -> String {
    let cleaned = clean_scalar(raw);
    let cleaned = cleaned.trim_end_matches('.').trim();
    if is_placeholder(cleaned) {
        return String::new();
    }

    let tokens: Vec<&str> = cleaned
        .split([',', ';', '/', '&', '+', ' '])
        .map(|t| t.trim_matches(|c: char| matches!(c, '(' | ')' | '.')))
        .filter(|t| !t.is_empty())
        .collect();
    let options: Vec<&str> = tokens
        .iter()
        .copied()
        .filter(|t| !is_conjunction(t))
        .collect();
    let all_options = !options.is_empty() && options.iter().all(|t| is_option_run(t));

    if all_options {
        options
            .iter()
            .flat_map(|t| t.chars())
            .map(|c| c.to_ascii_uppercase().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        cleaned.to_string()
    }
}

fn is_conjunction(token: &str) -> bool {
    token.eq_ignore_ascii_case("and") || token.eq_ignore_ascii_case("or")
}

/// A single letter, or option letters written together in ascending order
/// (`"ab"`, `"bde"`). Words such as `"bad"` or `"Paris"` do not qualify.
fn is_option_run(token: &str) -> bool {
    let lower: Vec<char> = token.chars().map(|c| c.to_ascii_lowercase()).collect();
    match lower.as_slice() {
        [c] => c.is_ascii_alphabetic(),
        run => {
            run.len() <= MAX_OPTIONS
                && run.iter().all(|c| ('a'..=OPTION_LIMIT).contains(c))
                && run.windows(2).all(|w| w[0] < w[1])
        }
    }
}
