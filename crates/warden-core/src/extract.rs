//! Decision Extraction
//!
//! Recovers one structured JSON object from free-form model output. Models
//! wrap their decision in reasoning, code fences, and trailing commentary, so
//! several strategies are tried in order and the first hit wins:
//!
//! 1. the whole trimmed reply parses as an object,
//! 2. a fenced block (```` ```json ```` or bare ```` ``` ````) holds the object,
//! 3. a string- and escape-aware brace scan finds a balanced object,
//! 4. a single-level regex match around a recognized key.
//!
//! An object is only accepted when it carries one of the recognized keys.

use regex::Regex;
use serde_json::{Map, Value};

/// Keys that mark a decision (`action`) or an analysis (`analysis`)
pub const DEFAULT_KEYS: &[&str] = &["action", "analysis"];

/// Which strategy produced the object
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    WholeText,
    FencedBlock,
    BalancedBraces,
    Pattern,
}

/// Extractor for decision objects embedded in model output
#[derive(Clone, Debug)]
pub struct DecisionExtractor {
    keys: Vec<String>,
    fence: Regex,
    fallback: Regex,
}

impl Default for DecisionExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_KEYS.iter().copied())
    }
}

impl DecisionExtractor {
    /// Create an extractor accepting objects that carry any of `keys`
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        let alternation = keys
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");

        Self {
            fence: fence_regex(),
            fallback: fallback_regex(&alternation),
            keys,
        }
    }

    /// Extract the first accepted object, or `None`
    pub fn extract(&self, text: &str) -> Option<Map<String, Value>> {
        self.extract_with_strategy(text).map(|(_, object)| object)
    }

    /// Like `extract`, also reporting which strategy matched
    pub fn extract_with_strategy(&self, text: &str) -> Option<(Strategy, Map<String, Value>)> {
        if let Some(object) = self.accept(text.trim()) {
            return Some((Strategy::WholeText, object));
        }

        for captures in self.fence.captures_iter(text) {
            if let Some(object) = captures.get(1).and_then(|m| self.accept(m.as_str())) {
                return Some((Strategy::FencedBlock, object));
            }
        }

        for candidate in balanced_candidates(text) {
            if let Some(object) = self.accept(candidate) {
                return Some((Strategy::BalancedBraces, object));
            }
        }

        for found in self.fallback.find_iter(text) {
            if let Some(object) = self.accept(found.as_str()) {
                tracing::debug!("decision recovered by fallback pattern");
                return Some((Strategy::Pattern, object));
            }
        }

        None
    }

    fn accept(&self, candidate: &str) -> Option<Map<String, Value>> {
        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(object)) if self.keys.iter().any(|k| object.contains_key(k)) => {
                Some(object)
            }
            _ => None,
        }
    }
}

#[allow(clippy::expect_used)]
fn fence_regex() -> Regex {
    Regex::new(r"(?is)```(?:json)?\s*(\{.*?\})\s*```").expect("fence pattern is valid")
}

#[allow(clippy::expect_used)]
fn fallback_regex(alternation: &str) -> Regex {
    Regex::new(&format!(r#"(?s)\{{[^{{}}]*"(?:{alternation})"[^{{}}]*\}}"#))
        .expect("fallback pattern is valid")
}

/// Every balanced `{ ... }` span in `text`, ordered by starting position.
///
/// Braces inside double-quoted strings do not count, and a backslash makes
/// the following character inert. Spans that never close are skipped; nested
/// objects are reported after the object that contains them.
pub fn balanced_candidates(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut candidates = Vec::new();

    for (start, &byte) in bytes.iter().enumerate() {
        if byte != b'{' {
            continue;
        }
        if let Some(end) = matching_brace(bytes, start) {
            candidates.push(&text[start..=end]);
        }
    }

    candidates
}

/// Index of the `}` closing the `{` at `start`, if any
fn matching_brace(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start + 1..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + 1 + offset);
                }
            }
            _ => {}
        }
    }

    None
}
