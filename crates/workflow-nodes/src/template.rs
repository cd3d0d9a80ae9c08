//! `{{path}}` placeholder resolution
//!
//! Prompt templates reference upstream values by path into a node's input
//! map. Paths use dot notation for object fields and either a numeric
//! segment or bracket notation for array elements, with an optional
//! `input.` prefix:
//!
//! - `{{text}}`
//! - `{{input.result.items.0}}`
//! - `{{result.items[0].name}}`

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use node_engine::PortValues;

static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").ok());

/// Look up `path` in a JSON value.
///
/// An empty path yields the value itself.
pub fn extract_path<'a>(json: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = json;
    let mut remaining = path;

    while !remaining.is_empty() {
        // Array indexing at start: [0]
        if let Some(rest) = remaining.strip_prefix('[') {
            let end = rest.find(']')?;
            let index = rest[..end].parse::<usize>().ok()?;
            current = current.get(index)?;
            remaining = &rest[end + 1..];
            remaining = remaining.strip_prefix('.').unwrap_or(remaining);
            continue;
        }

        // Field access up to the next '.' or '['
        let split = remaining.find(['.', '[']).unwrap_or(remaining.len());
        let field = &remaining[..split];
        remaining = &remaining[split..];
        remaining = remaining.strip_prefix('.').unwrap_or(remaining);

        if field.is_empty() {
            continue;
        }
        current = match current {
            Value::Array(items) => items.get(field.parse::<usize>().ok()?)?,
            _ => current.get(field)?,
        };
    }

    Some(current)
}

/// Resolve a placeholder path against a node's inputs
pub fn resolve_path<'a>(inputs: &'a PortValues, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix("input.").unwrap_or(path);
    let split = path.find(['.', '[']).unwrap_or(path.len());
    let root = inputs.get(&path[..split])?;
    let rest = &path[split..];
    extract_path(root, rest.strip_prefix('.').unwrap_or(rest))
}

/// Text form of a value as spliced into a template: strings verbatim,
/// null as "", everything else as compact JSON
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Replace every `{{path}}` in `template` with the resolved input value.
///
/// Unresolvable placeholders become "". Placeholders whose path is in
/// `keep` are left untouched.
pub fn render(template: &str, inputs: &PortValues, keep: &[&str]) -> String {
    let Some(re) = PLACEHOLDER.as_ref() else {
        return template.to_string();
    };

    re.replace_all(template, |caps: &regex::Captures<'_>| {
        let path = &caps[1];
        if keep.contains(&path) {
            return caps[0].to_string();
        }
        match resolve_path(inputs, path) {
            Some(value) => value_to_text(value),
            None => {
                log::debug!("Template placeholder '{}' did not resolve", path);
                String::new()
            }
        }
    })
    .into_owned()
}
