//! Structured model responses and their recovery from raw text.
//!
//! Models are asked for a single JSON object:
//!
//! ```json
//! {"explanation": "Shows cwd", "command": "pwd", "confidence": 95}
//! ```
//!
//! [`parse_response`] accepts that object bare or inside a fenced code block.
//! When a model never produces valid JSON, [`extract_fallback_response`]
//! scrapes a plausible command out of the prose instead.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Confidence assigned to responses recovered by the fallback extractor.
pub const FALLBACK_CONFIDENCE: u8 = 50;

/// A parsed model reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredResponse {
    pub explanation: String,
    /// `None` for pure question answers; no execution is offered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Always within [0, 100].
    pub confidence: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_dialogue: Option<String>,
    /// Advisory warning from the safety validator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_warning: Option<String>,
    /// Recovered by fallback extraction rather than parsed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

impl StructuredResponse {
    /// Create a response; confidence is clamped to [0, 100].
    pub fn new(explanation: impl Into<String>, command: Option<String>, confidence: i64) -> Self {
        Self {
            explanation: explanation.into(),
            command,
            confidence: confidence.clamp(0, 100) as u8,
            internal_dialogue: None,
            safety_warning: None,
            fallback: false,
        }
    }

    pub fn confidence_level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_score(self.confidence)
    }

    /// True when the reply answers a question instead of proposing a command.
    pub fn is_question(&self) -> bool {
        self.command.is_none()
    }
}

/// Coarse confidence bucket used for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    /// `< 50` low, `[50, 80)` medium, `>= 80` high.
    pub fn from_score(confidence: u8) -> Self {
        if confidence >= 80 {
            ConfidenceLevel::High
        } else if confidence >= 50 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Malformed model output.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("LLM returned empty response")]
    Empty,
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("invalid JSON in code block: {0}")]
    InvalidFencedJson(String),
    #[error("response JSON is not an object")]
    NotAnObject,
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("'{field}' must be {expected}")]
    InvalidType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("'confidence' must be between 0 and 100 (got {0})")]
    ConfidenceOutOfRange(f64),
    #[error("'explanation' must not be empty")]
    EmptyExplanation,
}

/// Parse raw model text into a [`StructuredResponse`].
///
/// Tries the trimmed text as JSON, then the body of the first fenced code
/// block. Out-of-range confidence is an error here, never clamped.
pub fn parse_response(raw: &str) -> Result<StructuredResponse, ParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    let value = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value,
        Err(direct) => {
            if !raw.contains("```") {
                return Err(ParseError::InvalidJson(direct.to_string()));
            }
            let block = extract_fenced_block(raw)
                .ok_or_else(|| ParseError::InvalidJson(direct.to_string()))?;
            serde_json::from_str::<Value>(&block)
                .map_err(|e| ParseError::InvalidFencedJson(e.to_string()))?
        }
    };

    let Value::Object(object) = value else {
        return Err(ParseError::NotAnObject);
    };

    from_object(&object)
}

fn from_object(object: &Map<String, Value>) -> Result<StructuredResponse, ParseError> {
    let missing: Vec<&'static str> = ["explanation", "confidence"]
        .into_iter()
        .filter(|field| !object.contains_key(*field))
        .collect();
    if !missing.is_empty() {
        return Err(ParseError::MissingFields(missing));
    }

    let explanation = object["explanation"]
        .as_str()
        .ok_or(ParseError::InvalidType {
            field: "explanation",
            expected: "a string",
        })?
        .trim();
    if explanation.is_empty() {
        return Err(ParseError::EmptyExplanation);
    }

    let command = match object.get("command") {
        None | Some(Value::Null) => None,
        Some(Value::String(cmd)) => Some(cmd.trim().to_string()).filter(|c| !c.is_empty()),
        Some(_) => {
            return Err(ParseError::InvalidType {
                field: "command",
                expected: "a string",
            })
        }
    };

    let confidence = object["confidence"]
        .as_f64()
        .ok_or(ParseError::InvalidType {
            field: "confidence",
            expected: "a number",
        })?;
    if !confidence.is_finite() {
        return Err(ParseError::ConfidenceOutOfRange(confidence));
    }
    // Fractions truncate toward zero before the range check.
    let confidence = confidence.trunc();
    if !(0.0..=100.0).contains(&confidence) {
        return Err(ParseError::ConfidenceOutOfRange(confidence));
    }

    let internal_dialogue = object
        .get("internal_dialogue")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let mut response = StructuredResponse::new(explanation, command, confidence as i64);
    response.internal_dialogue = internal_dialogue;
    Ok(response)
}

/// Lines between the first opening fence and the next fence.
fn extract_fenced_block(raw: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut in_block = false;

    for line in raw.lines() {
        if line.trim_start().starts_with("```") {
            if in_block {
                break;
            }
            in_block = true;
            continue;
        }
        if in_block {
            lines.push(line);
        }
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn inline_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`\n]+)`").expect("valid regex"))
}

fn code_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:\w+)?\s*\n?(.+?)\n?\s*```").expect("valid regex"))
}

fn command_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[Cc]ommand:[ \t]*([^\n]+)").expect("valid regex"))
}

/// Best-effort command recovery from a reply that never parsed.
///
/// Looks for an inline backticked command, then a fenced code block, then a
/// `command:` line. Returns `None` when nothing command-like is present.
pub fn extract_fallback_response(raw: &str) -> Option<StructuredResponse> {
    let command = [inline_code_re(), code_block_re(), command_label_re()]
        .into_iter()
        .find_map(|re| {
            re.captures(raw)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|cmd| !cmd.is_empty())
        })?;

    let first_sentence = raw.split('.').next().unwrap_or_default().trim();
    let explanation = if first_sentence.is_empty() {
        "Command extracted from response".to_string()
    } else {
        format!("{}.", first_sentence)
    };

    let mut response =
        StructuredResponse::new(explanation, Some(command), i64::from(FALLBACK_CONFIDENCE));
    response.fallback = true;
    Some(response)
}
