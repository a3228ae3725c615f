//! Candidate JSON extraction from raw generator output.
//!
//! Generator text wraps its payload in prose, markdown fences, or both. This
//! module only finds substrings worth parsing; it never parses them.

const FENCE: &str = "```";

/// Which top-level JSON container a request expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    /// A single day: a JSON array of items.
    Single,
    /// Several days: a JSON object keyed by day.
    Multi,
}

impl ExtractMode {
    /// Opening and closing bracket of the expected container.
    fn brackets(self) -> (char, char) {
        match self {
            Self::Single => ('[', ']'),
            Self::Multi => ('{', '}'),
        }
    }
}

/// Where a candidate was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    /// Body of a fenced code block tagged `json`.
    Fenced,
    /// Span from the first opening bracket to the last closing one.
    Brackets,
}

/// A substring of generator output suspected to contain JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateBlock {
    pub source: CandidateSource,
    pub text: String,
}

/// Collect candidate JSON substrings from `raw`, most likely first.
///
/// Every `json`-tagged fence is returned in order of appearance, followed by
/// the outermost bracket span for `mode` when one exists and differs from
/// the fenced bodies. An empty result means the output holds nothing that
/// could be a plan.
pub fn candidate_blocks(raw: &str, mode: ExtractMode) -> Vec<CandidateBlock> {
    let mut blocks: Vec<CandidateBlock> = fenced_json_blocks(raw)
        .into_iter()
        .map(|text| CandidateBlock {
            source: CandidateSource::Fenced,
            text: text.to_string(),
        })
        .collect();

    let (open, close) = mode.brackets();
    if let Some(span) = bracket_span(raw, open, close) {
        if !blocks.iter().any(|b| b.text == span) {
            blocks.push(CandidateBlock {
                source: CandidateSource::Brackets,
                text: span.to_string(),
            });
        }
    }

    blocks
}

/// Bodies of fenced blocks whose info tag is `json` (any case).
///
/// An unterminated fence runs to the end of the text. Fences with another
/// tag, or no tag, are skipped whole.
fn fenced_json_blocks(raw: &str) -> Vec<&str> {
    let mut bodies = Vec::new();
    let mut rest = raw;

    while let Some(start) = rest.find(FENCE) {
        let after_fence = &rest[start + FENCE.len()..];
        let tag_len = after_fence
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(after_fence.len());
        let tag = &after_fence[..tag_len];
        let body = &after_fence[tag_len..];

        let (content, next) = match body.find(FENCE) {
            Some(end) => (&body[..end], &body[end + FENCE.len()..]),
            None => (body, ""),
        };

        if tag.eq_ignore_ascii_case("json") {
            let content = content.trim();
            if !content.is_empty() {
                bodies.push(content);
            }
        }
        rest = next;
    }

    bodies
}

/// The substring from the first `open` to the last `close`, inclusive.
fn bracket_span(raw: &str, open: char, close: char) -> Option<&str> {
    let start = raw.find(open)?;
    let end = raw.rfind(close)?;
    if end <= start {
        return None;
    }
    Some(&raw[start..end + close.len_utf8()])
}
