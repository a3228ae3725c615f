//! Tolerant JSON parsing for generator output.
//!
//! A candidate is first parsed strictly. If that fails, [`repair`] rewrites
//! the common generator mistakes into valid JSON and the result is parsed
//! again. A candidate either parses completely or is rejected; no partial
//! tree is ever returned.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::extract::CandidateBlock;

/// How many cut-back points are tried when the text was truncated.
const MAX_TRUNCATIONS: usize = 3;

/// Errors from parsing a single candidate.
#[derive(Debug, Error)]
pub enum RepairError {
    #[error("candidate is empty")]
    Empty,

    #[error("candidate parsed to a JSON {found}, not an object or array")]
    NotAContainer { found: &'static str },

    #[error("candidate is not valid JSON, even after repair: {0}")]
    Unrepairable(#[source] serde_json::Error),
}

/// Every candidate failed to parse.
#[derive(Debug, Error)]
#[error("none of the {attempts} candidate(s) could be parsed")]
pub struct ParseFailure {
    pub attempts: usize,
    #[source]
    pub last_error: Option<RepairError>,
}

/// One rewrite applied by [`repair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fix {
    TrailingComma,
    SingleQuotedString,
    BareKey,
    Comment,
    PythonLiteral,
    RawControlChar,
    ClosedString,
    ClosedBrackets,
}

/// Output of [`repair`]: the rewritten text plus fallbacks for truncated
/// input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repaired {
    /// Rewritten text with any open string and brackets closed.
    pub closed: String,
    /// For truncated input: the text cut back to each of the last few
    /// complete elements, newest first, then closed.
    pub truncations: Vec<String>,
    /// Rewrites that were applied, in order of first occurrence.
    pub fixes: Vec<Fix>,
}

impl Repaired {
    /// Texts to try parsing, in order.
    pub fn attempts(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.closed.as_str()).chain(self.truncations.iter().map(String::as_str))
    }

    fn note(&mut self, fix: Fix) {
        if !self.fixes.contains(&fix) {
            self.fixes.push(fix);
        }
    }
}

/// Parse one candidate, repairing it if strict parsing fails.
pub fn parse_candidate(text: &str) -> Result<Value, RepairError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(RepairError::Empty);
    }

    let value = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value,
        Err(strict_err) => {
            let repaired = repair(trimmed);
            let mut last_err = strict_err;
            let mut parsed = None;
            for (i, attempt) in repaired.attempts().enumerate() {
                match serde_json::from_str::<Value>(attempt) {
                    Ok(value) => {
                        debug!(fixes = ?repaired.fixes, truncated = i > 0, "candidate parsed after repair");
                        parsed = Some(value);
                        break;
                    }
                    Err(e) => last_err = e,
                }
            }
            parsed.ok_or(RepairError::Unrepairable(last_err))?
        }
    };

    match value {
        Value::Object(_) | Value::Array(_) => Ok(value),
        other => Err(RepairError::NotAContainer {
            found: json_kind(&other),
        }),
    }
}

/// Try candidates strictly in order; the first that parses wins.
///
/// Returns the winning candidate's index and its value.
pub fn parse_first(candidates: &[CandidateBlock]) -> Result<(usize, Value), ParseFailure> {
    let mut last_error = None;
    for (index, candidate) in candidates.iter().enumerate() {
        match parse_candidate(&candidate.text) {
            Ok(value) => {
                debug!(candidate = index, source = ?candidate.source, "candidate parsed");
                return Ok((index, value));
            }
            Err(e) => {
                debug!(candidate = index, source = ?candidate.source, error = %e, "candidate rejected");
                last_error = Some(e);
            }
        }
    }
    Err(ParseFailure {
        attempts: candidates.len(),
        last_error,
    })
}

/// Short name of a JSON value's type, for messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Rewrite generator-style near-JSON into JSON.
///
/// Handles trailing commas, single-quoted strings and keys, bare keys, `//`
/// and `/* */` comments, Python literals (`True`, `False`, `None`), raw
/// newlines and tabs inside strings, and text cut off mid-structure. Text
/// that is valid JSON comes back unchanged.
pub fn repair(text: &str) -> Repaired {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    // Closers still owed, innermost last.
    let mut stack: Vec<char> = Vec::new();
    // (output length, stack) just before each element-separating comma.
    let mut checkpoints: Vec<(usize, Vec<char>)> = Vec::new();
    let mut repaired = Repaired {
        closed: String::new(),
        truncations: Vec::new(),
        fixes: Vec::new(),
    };
    let mut open_string = false;

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                let scanned = scan_string(&chars, i);
                if c == '\'' {
                    repaired.note(Fix::SingleQuotedString);
                }
                if scanned.escaped_control {
                    repaired.note(Fix::RawControlChar);
                }
                out.push_str(&scanned.literal);
                i = scanned.next;
                if !scanned.terminated {
                    open_string = true;
                }
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                repaired.note(Fix::Comment);
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                repaired.note(Fix::Comment);
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i = (i + 2).min(chars.len());
            }
            '{' => {
                stack.push('}');
                out.push(c);
                i += 1;
            }
            '[' => {
                stack.push(']');
                out.push(c);
                i += 1;
            }
            '}' | ']' => {
                if stack.last() == Some(&c) {
                    stack.pop();
                }
                out.push(c);
                i += 1;
            }
            ',' => {
                let next = skip_insignificant(&chars, i + 1);
                match chars.get(next) {
                    Some('}') | Some(']') | None => repaired.note(Fix::TrailingComma),
                    _ => {
                        checkpoints.push((out.len(), stack.clone()));
                        out.push(',');
                    }
                }
                i += 1;
            }
            c if is_ident_start(c) => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let followed_by_colon =
                    chars.get(skip_insignificant(&chars, i)) == Some(&':');
                if followed_by_colon && stack.last() == Some(&'}') {
                    repaired.note(Fix::BareKey);
                    out.push('"');
                    out.push_str(&word);
                    out.push('"');
                } else {
                    let literal = match word.as_str() {
                        "True" => Some("true"),
                        "False" => Some("false"),
                        "None" => Some("null"),
                        _ => None,
                    };
                    match literal {
                        Some(lit) => {
                            repaired.note(Fix::PythonLiteral);
                            out.push_str(lit);
                        }
                        None => out.push_str(&word),
                    }
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    if open_string {
        repaired.note(Fix::ClosedString);
    }
    let truncated = open_string || !stack.is_empty();
    if !stack.is_empty() {
        repaired.note(Fix::ClosedBrackets);
    }

    repaired.closed = close(out.clone(), &stack);
    if truncated {
        repaired.truncations = checkpoints
            .iter()
            .rev()
            .take(MAX_TRUNCATIONS)
            .map(|(len, owed)| close(out[..*len].to_string(), owed))
            .collect();
    }
    repaired
}

/// Append the owed closers, innermost first.
fn close(mut text: String, owed: &[char]) -> String {
    text.extend(owed.iter().rev());
    text
}

struct ScannedString {
    /// The string re-emitted as a double-quoted JSON literal.
    literal: String,
    /// Index just past the closing quote (or the end of input).
    next: usize,
    terminated: bool,
    escaped_control: bool,
}

/// Scan a string starting at the quote at `start`, re-emitting it as a JSON
/// string literal regardless of its original quote character.
fn scan_string(chars: &[char], start: usize) -> ScannedString {
    let quote = chars[start];
    let mut literal = String::from('"');
    let mut escaped_control = false;
    let mut j = start + 1;

    while j < chars.len() {
        let c = chars[j];
        match c {
            '\\' => match chars.get(j + 1) {
                // `\'` is not a JSON escape.
                Some('\'') => {
                    literal.push('\'');
                    j += 2;
                }
                Some(&next) => {
                    literal.push('\\');
                    literal.push(next);
                    j += 2;
                }
                None => j += 1,
            },
            c if c == quote => {
                literal.push('"');
                return ScannedString {
                    literal,
                    next: j + 1,
                    terminated: true,
                    escaped_control,
                };
            }
            '"' => {
                literal.push_str("\\\"");
                j += 1;
            }
            '\n' | '\r' | '\t' => {
                escaped_control = true;
                literal.push_str(match c {
                    '\n' => "\\n",
                    '\r' => "\\r",
                    _ => "\\t",
                });
                j += 1;
            }
            _ => {
                literal.push(c);
                j += 1;
            }
        }
    }

    literal.push('"');
    ScannedString {
        literal,
        next: j,
        terminated: false,
        escaped_control,
    }
}

/// Index of the next char that is not whitespace or part of a comment.
fn skip_insignificant(chars: &[char], mut i: usize) -> usize {
    loop {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        match (chars.get(i), chars.get(i + 1)) {
            (Some('/'), Some('/')) => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            (Some('/'), Some('*')) => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i = (i + 2).min(chars.len());
            }
            _ => return i,
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
