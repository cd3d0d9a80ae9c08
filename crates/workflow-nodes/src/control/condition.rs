//! Condition Node
//!
//! Compares the input against a configured value and routes the input to
//! either the `true` or the `false` output. Only one of the two ports
//! carries a value after a run, so downstream nodes wired to the other
//! port receive nothing.

use std::sync::Arc;

use async_trait::async_trait;
use node_engine::{
    ConfigField, ConfigSchema, DescribeNode, ExecutorExtensions, GraphNode, NodeCategory,
    NodeDescriptor, NodeExecutor, PortValues,
};
use serde_json::Value;

use crate::error::NodeError;
use crate::template::value_to_text;

/// Comparison applied by the condition node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Contains,
    StartsWith,
    EndsWith,
}

impl Operator {
    pub const NAMES: [&'static str; 9] = [
        "==",
        "!=",
        ">",
        "<",
        ">=",
        "<=",
        "contains",
        "startsWith",
        "endsWith",
    ];

    pub fn from_name(name: &str) -> Result<Self, NodeError> {
        Ok(match name {
            "==" => Self::Eq,
            "!=" => Self::Ne,
            ">" => Self::Gt,
            "<" => Self::Lt,
            ">=" => Self::Ge,
            "<=" => Self::Le,
            "contains" => Self::Contains,
            "startsWith" => Self::StartsWith,
            "endsWith" => Self::EndsWith,
            other => {
                return Err(NodeError::UnknownOption {
                    kind: "operator",
                    value: other.to_string(),
                })
            }
        })
    }

    /// Evaluate `input <op> value`.
    ///
    /// Ordering operators compare numerically and are false when either
    /// side is not a number; all others compare text forms.
    pub fn evaluate(self, input: &Value, value: &str) -> bool {
        let text = value_to_text(input);
        match self {
            Self::Eq => text == value,
            Self::Ne => text != value,
            Self::Contains => text.contains(value),
            Self::StartsWith => text.starts_with(value),
            Self::EndsWith => text.ends_with(value),
            Self::Gt | Self::Lt | Self::Ge | Self::Le => {
                let (Some(left), Some(right)) = (as_number(input), value.trim().parse::<f64>().ok())
                else {
                    return false;
                };
                match self {
                    Self::Gt => left > right,
                    Self::Lt => left < right,
                    Self::Ge => left >= right,
                    _ => left <= right,
                }
            }
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| !n.is_nan())
}

/// Routes its input to `true` or `false`
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionNode;

impl ConditionNode {
    pub const NODE_TYPE: &'static str = "condition";
    /// Port ID for the value under test
    pub const PORT_INPUT: &'static str = "input";
    /// Port ID taken when the comparison holds
    pub const PORT_TRUE: &'static str = "true";
    /// Port ID taken otherwise
    pub const PORT_FALSE: &'static str = "false";
}

impl DescribeNode for ConditionNode {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new(Self::NODE_TYPE, "Condition", NodeCategory::Auxiliary)
            .with_description("Routes the input by comparing it with a value")
            .with_inputs(&[Self::PORT_INPUT])
            .with_outputs(&[Self::PORT_TRUE, Self::PORT_FALSE])
            .with_schema(
                ConfigSchema::new()
                    .field("operator", ConfigField::enumeration(&Operator::NAMES, "=="))
                    .field(
                        "value",
                        ConfigField::string("").with_description("Value to compare against"),
                    ),
            )
    }
}

inventory::submit!(node_engine::BuiltinNode::new(
    ConditionNode::descriptor,
    || Arc::new(ConditionNode)
));

#[async_trait]
impl NodeExecutor for ConditionNode {
    async fn execute(
        &self,
        node: &GraphNode,
        mut inputs: PortValues,
        _extensions: &ExecutorExtensions,
    ) -> node_engine::Result<PortValues> {
        let operator = Operator::from_name(node.config_str("operator").unwrap_or("=="))?;
        let value = node.config.get("value").map(value_to_text).unwrap_or_default();
        let input = inputs.remove(Self::PORT_INPUT).unwrap_or(Value::Null);

        let passed = operator.evaluate(&input, &value);
        log::debug!(
            "ConditionNode {}: {:?} '{}' -> {}",
            node.id,
            operator,
            value,
            passed
        );

        let port = if passed { Self::PORT_TRUE } else { Self::PORT_FALSE };
        let mut outputs = PortValues::new();
        outputs.insert(port.to_string(), input);
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn run(operator: &str, value: Value, input: Value) -> PortValues {
        let node = GraphNode {
            id: "node_6".to_string(),
            node_type: ConditionNode::NODE_TYPE.to_string(),
            config: json!({"operator": operator, "value": value})
                .as_object()
                .cloned()
                .unwrap(),
            label: None,
        };
        let mut inputs = PortValues::new();
        inputs.insert("input".to_string(), input);
        ConditionNode
            .execute(&node, inputs, &ExecutorExtensions::new())
            .await
            .unwrap()
    }

    #[test]
    fn test_equality_uses_text_forms() {
        assert!(Operator::Eq.evaluate(&json!(5), "5"));
        assert!(Operator::Eq.evaluate(&json!("ok"), "ok"));
        assert!(Operator::Ne.evaluate(&json!(true), "yes"));
    }

    #[test]
    fn test_ordering_is_numeric() {
        assert!(Operator::Gt.evaluate(&json!(10), "9"));
        assert!(Operator::Le.evaluate(&json!(" 3 "), "3"));
        assert!(!Operator::Lt.evaluate(&json!("abc"), "5"));
        assert!(!Operator::Ge.evaluate(&json!(5), "five"));
        assert!(!Operator::Gt.evaluate(&Value::Null, "0"));
    }

    #[test]
    fn test_string_operators() {
        assert!(Operator::Contains.evaluate(&json!("status: error"), "error"));
        assert!(Operator::StartsWith.evaluate(&json!("https://x"), "https"));
        assert!(Operator::EndsWith.evaluate(&json!("a.png"), ".png"));
        assert!(!Operator::EndsWith.evaluate(&json!("a.png"), ".jpg"));
    }

    #[tokio::test]
    async fn test_routes_input_to_one_port() {
        let outputs = run(">", json!("100"), json!(150)).await;
        assert_eq!(outputs.get("true"), Some(&json!(150)));
        assert!(outputs.get("false").is_none());

        let outputs = run("contains", json!("ok"), json!({"status": "failed"})).await;
        assert_eq!(outputs.get("false"), Some(&json!({"status": "failed"})));
        assert!(outputs.get("true").is_none());
    }

    #[tokio::test]
    async fn test_unknown_operator_fails() {
        let node = GraphNode {
            id: "node_6".to_string(),
            node_type: ConditionNode::NODE_TYPE.to_string(),
            config: json!({"operator": "~="}).as_object().cloned().unwrap(),
            label: None,
        };
        let err = ConditionNode
            .execute(&node, PortValues::new(), &ExecutorExtensions::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown operator '~='"));
    }
}
