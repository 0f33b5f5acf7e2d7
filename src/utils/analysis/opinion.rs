//! Externally supplied impact opinion
//!
//! A text-generation collaborator may return a JSON object naming affected
//! files and features, warnings and a recommendation. The opinion is a hint:
//! when it is absent or unparseable the analyzer falls back to keywords.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

lazy_static! {
    // Body of a ```json fence, up to the closing fence or end of text
    static ref JSON_FENCE: Regex = Regex::new(r"(?s)```json[ \t]*\r?\n?(.*?)(?:```|\z)").unwrap();
    // Any other fence, with an optional language tag
    static ref ANY_FENCE: Regex = Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)(?:```|\z)").unwrap();
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalOpinion {
    pub affected_files: Vec<String>,
    pub affected_features: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendation: Option<String>,
}

impl ExternalOpinion {
    /// Parses a collaborator response leniently.
    ///
    /// Accepts bare JSON or JSON inside a fenced code block. `risks` and
    /// `overlaps` arrays are folded into `warnings`. Anything that is not a
    /// JSON object yields `None`.
    pub fn parse_lenient(text: &str) -> Option<Self> {
        let body = strip_fence(text);
        let value: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(e) => {
                debug!("Ignoring unparseable opinion: {}", e);
                return None;
            }
        };
        let object = value.as_object()?;

        let mut warnings = string_list(object.get("warnings"));
        warnings.extend(string_list(object.get("risks")));
        warnings.extend(string_list(object.get("overlaps")));

        Some(Self {
            affected_files: string_list(object.get("affected_files"))
                .iter()
                .map(|p| normalize_path(p))
                .filter(|p| !p.is_empty())
                .collect(),
            affected_features: string_list(object.get("affected_features")),
            warnings,
            recommendation: object
                .get("recommendation")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(String::from),
        })
    }

    pub fn has_seed(&self) -> bool {
        !self.affected_files.is_empty()
    }
}

/// Forward-slash path without a leading `./`.
pub fn normalize_path(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    let mut rest = path.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.to_string()
}

fn strip_fence(text: &str) -> &str {
    let captures = JSON_FENCE
        .captures(text)
        .or_else(|| ANY_FENCE.captures(text));
    match captures.and_then(|c| c.get(1)) {
        Some(body) => body.as_str().trim(),
        None => text.trim(),
    }
}

/// Strings from a JSON array; objects contribute their description.
fn string_list(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => ["conflict_description", "description", "feature_name"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
                .map(String::from)
                .or_else(|| Some(item.to_string())),
            Value::Null => None,
            other => Some(other.to_string()),
        })
        .filter(|s| !s.trim().is_empty())
        .collect()
}
