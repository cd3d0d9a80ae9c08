//! Code Edit Node
//!
//! Formats, minifies or checks a piece of source text. JSON goes through
//! serde_json. JavaScript, CSS and HTML get line-level rewrites and a
//! delimiter check, which is enough for display and compact storage but is
//! not a full parser. Running code is not supported.
//!
//! The text comes from the `input` port (structured values as pretty JSON),
//! falling back to the `code` config value.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use node_engine::{
    ConfigField, ConfigSchema, DescribeNode, ExecutorExtensions, GraphNode, NodeCategory,
    NodeDescriptor, NodeExecutor, PortValues,
};
use regex::Regex;
use serde_json::{json, Value};

use crate::error::NodeError;
use crate::output_param_name;

static HTML_TAG: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--.*?-->|<(/?)([A-Za-z][A-Za-z0-9-]*)(?:\s[^>]*?)?(/?)>").ok()
});

/// Elements that never have a closing tag
const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose closing tag may be left out
const OPTIONAL_CLOSE: [&str; 11] = [
    "p", "li", "dt", "dd", "tr", "td", "th", "option", "thead", "tbody", "tfoot",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    JavaScript,
    Python,
    Html,
    Css,
    Json,
}

impl Language {
    pub fn from_name(name: &str) -> Result<Self, NodeError> {
        match name {
            "javascript" => Ok(Self::JavaScript),
            "python" => Ok(Self::Python),
            "html" => Ok(Self::Html),
            "css" => Ok(Self::Css),
            "json" => Ok(Self::Json),
            other => Err(NodeError::UnknownOption {
                kind: "language",
                value: other.to_string(),
            }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::JavaScript => "javascript",
            Self::Python => "python",
            Self::Html => "html",
            Self::Css => "css",
            Self::Json => "json",
        }
    }

    /// Lay the code out one statement or rule per line
    ///
    /// JSON that does not parse is returned unchanged.
    pub fn format(self, code: &str) -> String {
        match self {
            Self::Json => match serde_json::from_str::<Value>(code) {
                Ok(parsed) => serde_json::to_string_pretty(&parsed).unwrap_or_else(|_| code.to_string()),
                Err(e) => {
                    log::warn!("Cannot format invalid JSON: {}", e);
                    code.to_string()
                }
            },
            Self::JavaScript => code
                .replace(';', ";\n")
                .replace('{', "{\n")
                .replace('}', "\n}")
                .replace(',', ",\n")
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Html => code.replace("><", ">\n<").trim().to_string(),
            Self::Css => code
                .replace('{', " {\n")
                .replace('}', "\n}\n")
                .replace(';', ";\n")
                .replace(',', ",\n"),
            Self::Python => code.to_string(),
        }
    }

    /// Strip the whitespace that does not change meaning
    ///
    /// JSON that does not parse is returned unchanged.
    pub fn minify(self, code: &str) -> String {
        match self {
            Self::Json => match serde_json::from_str::<Value>(code) {
                Ok(parsed) => parsed.to_string(),
                Err(e) => {
                    log::warn!("Cannot minify invalid JSON: {}", e);
                    code.to_string()
                }
            },
            Self::JavaScript | Self::Css => collapse_whitespace(code)
                .replace("; ", ";")
                .replace("{ ", "{")
                .replace(" }", "}"),
            Self::Html | Self::Python => collapse_whitespace(code),
        }
    }

    /// `Ok(())` when the code passes this language's check, else the problem
    ///
    /// Python is not checked.
    pub fn validate(self, code: &str) -> Result<(), String> {
        match self {
            Self::Json => serde_json::from_str::<Value>(code)
                .map(|_| ())
                .map_err(|e| e.to_string()),
            Self::JavaScript => check_delimiters(code, true),
            Self::Css => check_delimiters(code, false),
            Self::Html => check_tags(code),
            Self::Python => Ok(()),
        }
    }
}

fn collapse_whitespace(code: &str) -> String {
    code.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Bracket balance outside strings and comments
fn check_delimiters(code: &str, line_comments: bool) -> Result<(), String> {
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut line = 1;
    let mut chars = code.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\n' => line += 1,
            '"' | '\'' | '`' => {
                let start = line;
                let mut closed = false;
                while let Some(inner) = chars.next() {
                    match inner {
                        '\\' => {
                            if chars.next() == Some('\n') {
                                line += 1;
                            }
                        }
                        '\n' => {
                            line += 1;
                            if c != '`' {
                                break;
                            }
                        }
                        _ if inner == c => {
                            closed = true;
                            break;
                        }
                        _ => {}
                    }
                }
                if !closed {
                    return Err(format!("Unterminated string starting on line {}", start));
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let start = line;
                let mut previous = '\0';
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        line += 1;
                    }
                    if previous == '*' && inner == '/' {
                        closed = true;
                        break;
                    }
                    previous = inner;
                }
                if !closed {
                    return Err(format!("Unterminated comment starting on line {}", start));
                }
            }
            '/' if line_comments && chars.peek() == Some(&'/') => {
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        line += 1;
                        break;
                    }
                }
            }
            '(' | '[' | '{' => stack.push((c, line)),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((open, _)) if open == expected => {}
                    _ => return Err(format!("Unexpected '{}' on line {}", c, line)),
                }
            }
            _ => {}
        }
    }

    match stack.pop() {
        Some((open, opened_on)) => Err(format!("Unclosed '{}' from line {}", open, opened_on)),
        None => Ok(()),
    }
}

/// Every non-void element closed in order
fn check_tags(code: &str) -> Result<(), String> {
    let Some(re) = HTML_TAG.as_ref() else {
        return Ok(());
    };
    let mut open: Vec<String> = Vec::new();

    for caps in re.captures_iter(code) {
        let Some(name) = caps.get(2) else {
            continue; // comment
        };
        let name = name.as_str().to_ascii_lowercase();
        let closing = caps.get(1).is_some_and(|m| !m.is_empty());
        let self_closing = caps.get(3).is_some_and(|m| !m.is_empty());

        if VOID_ELEMENTS.contains(&name.as_str()) || self_closing {
            continue;
        }
        if !closing {
            open.push(name);
            continue;
        }

        // Implicitly closed elements between here and the match are dropped
        match open.iter().rposition(|tag| *tag == name) {
            Some(index)
                if open[index + 1..]
                    .iter()
                    .all(|tag| OPTIONAL_CLOSE.contains(&tag.as_str())) =>
            {
                open.truncate(index);
            }
            _ => return Err(format!("Unexpected closing tag </{}>", name)),
        }
    }

    match open.iter().rev().find(|tag| !OPTIONAL_CLOSE.contains(&tag.as_str())) {
        Some(tag) => Err(format!("Unclosed tag <{}>", tag)),
        None => Ok(()),
    }
}

/// Rewrites or checks code text
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeEditNode;

impl CodeEditNode {
    pub const NODE_TYPE: &'static str = "codeEdit";
    /// Port ID for the code text
    pub const PORT_INPUT: &'static str = "input";
    /// Default port ID for the result
    pub const PORT_OUTPUT: &'static str = "output";

    /// Code text from the input port, else from config
    pub fn source_text(node: &GraphNode, inputs: &PortValues) -> String {
        match inputs.get(Self::PORT_INPUT) {
            Some(Value::String(s)) => s.clone(),
            Some(value @ (Value::Object(_) | Value::Array(_))) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            Some(value) => value.to_string(),
            None => node.config_str("code").unwrap_or_default().to_string(),
        }
    }

    /// Result of `operation` on `code`
    pub fn apply(language: Language, operation: &str, code: &str) -> Result<Value, NodeError> {
        match operation {
            "format" => Ok(Value::String(language.format(code))),
            "minify" => Ok(Value::String(language.minify(code))),
            "validate" => Ok(match language.validate(code) {
                Ok(()) if language == Language::Python => json!({
                    "valid": true,
                    "message": "Syntax check is not available for python",
                }),
                Ok(()) => json!({"valid": true, "message": format!("{} is valid", language.name())}),
                Err(message) => json!({"valid": false, "message": message}),
            }),
            "execute" => Err(NodeError::Unsupported(format!(
                "Running {} code is not supported",
                language.name()
            ))),
            other => Err(NodeError::UnknownOption {
                kind: "operation",
                value: other.to_string(),
            }),
        }
    }
}

impl DescribeNode for CodeEditNode {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new(Self::NODE_TYPE, "Code Edit", NodeCategory::Auxiliary)
            .with_description("Formats, minifies or checks code")
            .with_inputs(&[Self::PORT_INPUT])
            .with_outputs(&[Self::PORT_OUTPUT])
            .with_schema(
                ConfigSchema::new()
                    .field(
                        "language",
                        ConfigField::enumeration(
                            &["javascript", "python", "html", "css", "json"],
                            "javascript",
                        ),
                    )
                    .field(
                        "code",
                        ConfigField::string("")
                            .with_description("Used when the input port is not connected"),
                    )
                    .field(
                        "operation",
                        ConfigField::enumeration(&["format", "minify", "validate"], "format"),
                    )
                    .field(
                        "outputParamName",
                        ConfigField::string(Self::PORT_OUTPUT)
                            .with_description("Output key for the result"),
                    ),
            )
            .with_output_name_param("outputParamName")
    }
}

inventory::submit!(node_engine::BuiltinNode::new(
    CodeEditNode::descriptor,
    || Arc::new(CodeEditNode)
));

#[async_trait]
impl NodeExecutor for CodeEditNode {
    async fn execute(
        &self,
        node: &GraphNode,
        inputs: PortValues,
        _extensions: &ExecutorExtensions,
    ) -> node_engine::Result<PortValues> {
        let language = Language::from_name(node.config_str("language").unwrap_or("javascript"))?;
        let operation = node.config_str("operation").unwrap_or("format");
        let code = Self::source_text(node, &inputs);

        log::debug!(
            "CodeEditNode {}: {} {} chars of {}",
            node.id,
            operation,
            code.len(),
            language.name()
        );
        let result = Self::apply(language, operation, &code)?;

        let mut outputs = PortValues::new();
        outputs.insert(output_param_name(node, Self::PORT_OUTPUT), result);
        Ok(outputs)
    }
}
