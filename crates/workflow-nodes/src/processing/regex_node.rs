//! Regex Node
//!
//! Runs a regular expression over the input text. Flags follow the familiar
//! single-letter form: `g` (all matches), `i` (case-insensitive), `m`
//! (multi-line anchors), `s` (dot matches newline); other letters are
//! ignored.
//!
//! # Operations
//! - `match`: with `g`, every matched string; without, the first match and
//!   its capture groups. `null` when nothing matched. Written to both
//!   `output` and `matches`.
//! - `replace`: `$1`, `$&` and `$$` references in `replacement`; replaces
//!   every match only with `g`.
//! - `test`: whether the pattern matches.
//! - `split`: the pieces between matches.

use std::sync::Arc;

use async_trait::async_trait;
use node_engine::{
    ConfigField, ConfigSchema, DescribeNode, ExecutorExtensions, GraphNode, NodeCategory,
    NodeDescriptor, NodeExecutor, PortValues,
};
use regex::{Regex, RegexBuilder};
use serde_json::{json, Value};

use crate::error::NodeError;
use crate::template::value_to_text;

/// Parsed `flags` config
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegexFlags {
    pub global: bool,
    pub case_insensitive: bool,
    pub multi_line: bool,
    pub dot_all: bool,
}

impl RegexFlags {
    pub fn parse(flags: &str) -> Self {
        Self {
            global: flags.contains('g'),
            case_insensitive: flags.contains('i'),
            multi_line: flags.contains('m'),
            dot_all: flags.contains('s'),
        }
    }

    pub fn build(&self, pattern: &str) -> Result<Regex, NodeError> {
        Ok(RegexBuilder::new(pattern)
            .case_insensitive(self.case_insensitive)
            .multi_line(self.multi_line)
            .dot_matches_new_line(self.dot_all)
            .build()?)
    }
}

/// Rewrite `$1` / `$&` / `$$` references into the `regex` crate's
/// `${1}` / `${0}` / `$$` syntax; any other `$` is literal
pub fn translate_replacement(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                out.push_str("$$");
            }
            Some('&') => {
                chars.next();
                out.push_str("${0}");
            }
            Some(d) if d.is_ascii_digit() => {
                let mut group = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    group.push(d);
                    chars.next();
                }
                out.push_str(&format!("${{{}}}", group));
            }
            _ => out.push_str("$$"),
        }
    }
    out
}

/// Applies a regular expression to the input text
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexNode;

impl RegexNode {
    pub const NODE_TYPE: &'static str = "regex";
    /// Port ID for the text input
    pub const PORT_INPUT: &'static str = "input";
    /// Port ID for the operation result
    pub const PORT_OUTPUT: &'static str = "output";
    /// Port ID for match results (`match` only)
    pub const PORT_MATCHES: &'static str = "matches";

    fn find(re: &Regex, input: &str, flags: RegexFlags) -> Value {
        if flags.global {
            let all: Vec<&str> = re.find_iter(input).map(|m| m.as_str()).collect();
            return if all.is_empty() { Value::Null } else { json!(all) };
        }
        match re.captures(input) {
            Some(caps) => Value::Array(
                caps.iter()
                    .map(|group| group.map_or(Value::Null, |m| json!(m.as_str())))
                    .collect(),
            ),
            None => Value::Null,
        }
    }
}

impl DescribeNode for RegexNode {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new(Self::NODE_TYPE, "Regex", NodeCategory::Auxiliary)
            .with_description("Matches, replaces, tests or splits text with a regular expression")
            .with_inputs(&[Self::PORT_INPUT])
            .with_outputs(&[Self::PORT_OUTPUT, Self::PORT_MATCHES])
            .with_schema(
                ConfigSchema::new()
                    .field(
                        "pattern",
                        ConfigField::string("")
                            .with_description("Regular expression, e.g. https?://[^\\s]+")
                            .required(),
                    )
                    .field(
                        "flags",
                        ConfigField::string("g").with_description("Any of g, i, m, s"),
                    )
                    .field(
                        "operation",
                        ConfigField::enumeration(&["match", "replace", "test", "split"], "match"),
                    )
                    .field(
                        "replacement",
                        ConfigField::string("").with_description("Supports $1-style group references"),
                    ),
            )
    }
}

inventory::submit!(node_engine::BuiltinNode::new(
    RegexNode::descriptor,
    || Arc::new(RegexNode)
));

#[async_trait]
impl NodeExecutor for RegexNode {
    async fn execute(
        &self,
        node: &GraphNode,
        inputs: PortValues,
        _extensions: &ExecutorExtensions,
    ) -> node_engine::Result<PortValues> {
        let pattern = node.config_str("pattern").unwrap_or_default();
        if pattern.is_empty() {
            return Err(NodeError::MissingConfig("pattern").into());
        }
        let flags = RegexFlags::parse(node.config_str("flags").unwrap_or_default());
        let re = flags.build(pattern)?;
        let operation = node.config_str("operation").unwrap_or("match");
        let input = inputs
            .get(Self::PORT_INPUT)
            .map(value_to_text)
            .unwrap_or_default();

        log::debug!(
            "RegexNode {}: {} /{}/ over {} chars",
            node.id,
            operation,
            pattern,
            input.len()
        );

        let mut outputs = PortValues::new();
        let result = match operation {
            "match" => {
                let found = Self::find(&re, &input, flags);
                outputs.insert(Self::PORT_MATCHES.to_string(), found.clone());
                found
            }
            "replace" => {
                let replacement =
                    translate_replacement(node.config_str("replacement").unwrap_or_default());
                let replaced = if flags.global {
                    re.replace_all(&input, replacement.as_str())
                } else {
                    re.replace(&input, replacement.as_str())
                };
                json!(replaced)
            }
            "test" => json!(re.is_match(&input)),
            "split" => json!(re.split(&input).collect::<Vec<_>>()),
            other => {
                return Err(NodeError::UnknownOption {
                    kind: "regex operation",
                    value: other.to_string(),
                }
                .into())
            }
        };
        outputs.insert(Self::PORT_OUTPUT.to_string(), result);
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_engine::NodeEngineError;

    async fn run(config: Value, input: &str) -> node_engine::Result<PortValues> {
        let node = GraphNode {
            id: "node_4".to_string(),
            node_type: RegexNode::NODE_TYPE.to_string(),
            config: config.as_object().cloned().unwrap(),
            label: None,
        };
        let mut inputs = PortValues::new();
        inputs.insert("input".to_string(), json!(input));
        RegexNode.execute(&node, inputs, &ExecutorExtensions::new()).await
    }

    #[test]
    fn test_flags() {
        let flags = RegexFlags::parse("gi");
        assert!(flags.global && flags.case_insensitive);
        assert!(!flags.multi_line && !flags.dot_all);
        assert!(flags.build("abc").unwrap().is_match("ABC"));
    }

    #[test]
    fn test_translate_replacement() {
        assert_eq!(translate_replacement("$1-$2"), "${1}-${2}");
        assert_eq!(translate_replacement("[$&]"), "[${0}]");
        assert_eq!(translate_replacement("$$5 or $x"), "$$5 or $$x");
        assert_eq!(translate_replacement("$12a"), "${12}a");
    }

    #[tokio::test]
    async fn test_global_match_lists_all() {
        let outputs = run(json!({"pattern": r"\d+", "flags": "g"}), "a1 b22 c333")
            .await
            .unwrap();
        assert_eq!(outputs.get("output"), Some(&json!(["1", "22", "333"])));
        assert_eq!(outputs.get("matches"), outputs.get("output"));
    }

    #[tokio::test]
    async fn test_single_match_has_groups() {
        let outputs = run(json!({"pattern": r"(\w+)@(\w+)?x", "flags": ""}), "mail ann@x now")
            .await
            .unwrap();
        assert_eq!(outputs.get("output"), Some(&json!(["ann@x", "ann", null])));
    }

    #[tokio::test]
    async fn test_no_match_is_null() {
        let outputs = run(json!({"pattern": "zzz"}), "abc").await.unwrap();
        assert_eq!(outputs.get("output"), Some(&Value::Null));
        assert_eq!(outputs.get("matches"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_replace_first_or_all() {
        let config = json!({"pattern": r"(\w+)=(\d)", "operation": "replace", "replacement": "$2:$1", "flags": ""});
        let outputs = run(config, "a=1 b=2").await.unwrap();
        assert_eq!(outputs.get("output"), Some(&json!("1:a b=2")));

        let config = json!({"pattern": r"(\w+)=(\d)", "operation": "replace", "replacement": "$2:$1", "flags": "g"});
        let outputs = run(config, "a=1 b=2").await.unwrap();
        assert_eq!(outputs.get("output"), Some(&json!("1:a 2:b")));
        assert!(outputs.get("matches").is_none());
    }

    #[tokio::test]
    async fn test_test_and_split() {
        let outputs = run(json!({"pattern": "^HELLO", "flags": "i", "operation": "test"}), "hello")
            .await
            .unwrap();
        assert_eq!(outputs.get("output"), Some(&json!(true)));

        let outputs = run(json!({"pattern": r"\s*,\s*", "operation": "split"}), "a, b ,c")
            .await
            .unwrap();
        assert_eq!(outputs.get("output"), Some(&json!(["a", "b", "c"])));
    }

    #[tokio::test]
    async fn test_errors() {
        let err = run(json!({}), "x").await.unwrap_err();
        assert!(err.to_string().contains("'pattern' is required"));

        let err = run(json!({"pattern": "("}), "x").await.unwrap_err();
        assert!(matches!(err, NodeEngineError::ExecutionFailed(msg) if msg.contains("Invalid regex")));

        let err = run(json!({"pattern": "x", "operation": "count"}), "x").await.unwrap_err();
        assert!(err.to_string().contains("Unknown regex operation 'count'"));
    }
}
