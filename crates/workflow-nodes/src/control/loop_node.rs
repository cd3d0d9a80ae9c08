//! Loop Node
//!
//! Expands its input into a list of iterations for downstream nodes. The
//! engine runs every node once, so the loop does not re-run anything; it
//! emits one `{item, index, total}` record per iteration.
//!
//! # Modes
//! - `forEach`: one iteration per element of `items` (or of `input` when it
//!   is an array; a single value counts as one element)
//! - `times`: `input` read as a count; zero or a non-number counts as 1
//! - `while`: a positive number in `input` counts down to zero; any other
//!   truthy value runs once
//!
//! Every mode stops at `maxIterations`.

use std::sync::Arc;

use async_trait::async_trait;
use node_engine::{
    ConfigField, ConfigSchema, DescribeNode, ExecutorExtensions, GraphNode, NodeCategory,
    NodeDescriptor, NodeExecutor, PortValues,
};
use serde_json::{json, Value};

use crate::error::NodeError;

pub const DEFAULT_MAX_ITERATIONS: usize = 100;
const ITERATION_LIMIT: f64 = 10_000.0;

/// How the loop derives its iterations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopType {
    ForEach,
    Times,
    While,
}

impl LoopType {
    pub fn from_name(name: &str) -> Result<Self, NodeError> {
        match name {
            "forEach" => Ok(Self::ForEach),
            "times" => Ok(Self::Times),
            "while" => Ok(Self::While),
            other => Err(NodeError::UnknownOption {
                kind: "loop type",
                value: other.to_string(),
            }),
        }
    }

    /// Iteration items for `items`/`input`, at most `max` of them
    pub fn iterate(self, items: Option<&Value>, input: Option<&Value>, max: usize) -> Vec<Value> {
        match self {
            Self::ForEach => {
                let elements = match (items, input) {
                    (Some(Value::Array(items)), _) => items.clone(),
                    (_, Some(Value::Array(input))) => input.clone(),
                    (_, Some(value)) => vec![value.clone()],
                    _ => Vec::new(),
                };
                elements.into_iter().take(max).collect()
            }
            Self::Times => {
                let times = input
                    .and_then(as_number)
                    .filter(|n| *n != 0.0)
                    .unwrap_or(1.0)
                    .ceil()
                    .clamp(0.0, max as f64) as usize;
                (1..=times).map(|n| json!(n)).collect()
            }
            Self::While => match input {
                Some(value) if !is_truthy(value) => Vec::new(),
                Some(value) => match value.as_f64().filter(|n| n.is_finite()) {
                    Some(remaining) => {
                        let count = remaining.ceil().clamp(0.0, max as f64) as usize;
                        (1..=count).map(|n| json!(n)).collect()
                    }
                    None => vec![json!(1)],
                },
                None => Vec::new(),
            },
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Turns a list or a count into iteration records
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopNode;

impl LoopNode {
    pub const NODE_TYPE: &'static str = "loop";
    /// Port ID for the value or list to loop over
    pub const PORT_INPUT: &'static str = "input";
    /// Port ID for an explicit list, preferred over `input` in forEach mode
    pub const PORT_ITEMS: &'static str = "items";
    /// Port ID for the `{item, index, total}` records
    pub const PORT_OUTPUT: &'static str = "output";
    /// Port ID for the bare items
    pub const PORT_ITEM_LIST: &'static str = "items";
    /// Port ID for the number of iterations
    pub const PORT_COUNT: &'static str = "count";
}

impl DescribeNode for LoopNode {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new(Self::NODE_TYPE, "Loop", NodeCategory::Auxiliary)
            .with_description("Expands a list or a count into iterations")
            .with_inputs(&[Self::PORT_INPUT, Self::PORT_ITEMS])
            .with_outputs(&[Self::PORT_OUTPUT, Self::PORT_ITEM_LIST, Self::PORT_COUNT])
            .with_schema(
                ConfigSchema::new()
                    .field(
                        "loopType",
                        ConfigField::enumeration(&["forEach", "times", "while"], "forEach"),
                    )
                    .field(
                        "maxIterations",
                        ConfigField::number(DEFAULT_MAX_ITERATIONS as f64)
                            .with_range(Some(1.0), Some(ITERATION_LIMIT))
                            .with_description("Upper bound on iterations in every mode"),
                    ),
            )
    }
}

inventory::submit!(node_engine::BuiltinNode::new(
    LoopNode::descriptor,
    || Arc::new(LoopNode)
));

#[async_trait]
impl NodeExecutor for LoopNode {
    async fn execute(
        &self,
        node: &GraphNode,
        inputs: PortValues,
        _extensions: &ExecutorExtensions,
    ) -> node_engine::Result<PortValues> {
        let loop_type = LoopType::from_name(node.config_str("loopType").unwrap_or("forEach"))?;
        let max = node
            .config_f64("maxIterations")
            .filter(|m| m.is_finite())
            .map(|m| m.clamp(1.0, ITERATION_LIMIT) as usize)
            .unwrap_or(DEFAULT_MAX_ITERATIONS);

        let items = loop_type.iterate(
            inputs.get(Self::PORT_ITEMS),
            inputs.get(Self::PORT_INPUT),
            max,
        );
        let total = items.len();
        log::debug!("LoopNode {}: {:?} over {} iterations", node.id, loop_type, total);

        let records: Vec<Value> = items
            .iter()
            .enumerate()
            .map(|(index, item)| json!({"item": item, "index": index, "total": total}))
            .collect();

        let mut outputs = PortValues::new();
        outputs.insert(Self::PORT_OUTPUT.to_string(), Value::Array(records));
        outputs.insert(Self::PORT_ITEM_LIST.to_string(), Value::Array(items));
        outputs.insert(Self::PORT_COUNT.to_string(), json!(total));
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(config: Value) -> GraphNode {
        GraphNode {
            id: "node_8".to_string(),
            node_type: LoopNode::NODE_TYPE.to_string(),
            config: config.as_object().cloned().unwrap(),
            label: None,
        }
    }

    async fn run(config: Value, inputs: Value) -> PortValues {
        LoopNode
            .execute(
                &node(config),
                inputs.as_object().cloned().unwrap(),
                &ExecutorExtensions::new(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_for_each_prefers_items_port() {
        let outputs = run(
            json!({"loopType": "forEach"}),
            json!({"input": ["ignored"], "items": ["a", "b"]}),
        )
        .await;
        assert_eq!(
            outputs.get("output"),
            Some(&json!([
                {"item": "a", "index": 0, "total": 2},
                {"item": "b", "index": 1, "total": 2}
            ]))
        );
        assert_eq!(outputs.get("items"), Some(&json!(["a", "b"])));
        assert_eq!(outputs.get("count"), Some(&json!(2)));
    }

    #[test]
    fn test_for_each_sources() {
        let each = LoopType::ForEach;
        assert_eq!(each.iterate(None, Some(&json!([1, 2, 3])), 2), vec![json!(1), json!(2)]);
        assert_eq!(each.iterate(Some(&json!("x")), Some(&json!("solo")), 10), vec![json!("solo")]);
        assert!(each.iterate(None, None, 10).is_empty());
    }

    #[test]
    fn test_times_counts_from_one() {
        let times = LoopType::Times;
        assert_eq!(times.iterate(None, Some(&json!("3")), 10), vec![json!(1), json!(2), json!(3)]);
        assert_eq!(times.iterate(None, Some(&json!("abc")), 10), vec![json!(1)]);
        assert_eq!(times.iterate(None, Some(&json!(0)), 10), vec![json!(1)]);
        assert!(times.iterate(None, Some(&json!(-2)), 10).is_empty());
        assert_eq!(times.iterate(None, Some(&json!(500)), 4).len(), 4);
    }

    #[test]
    fn test_while_counts_down_or_runs_once() {
        let looping = LoopType::While;
        assert_eq!(looping.iterate(None, Some(&json!(2)), 10), vec![json!(1), json!(2)]);
        assert_eq!(looping.iterate(None, Some(&json!(1_000)), 5).len(), 5);
        assert_eq!(looping.iterate(None, Some(&json!("go")), 10), vec![json!(1)]);
        assert!(looping.iterate(None, Some(&json!(false)), 10).is_empty());
        assert!(looping.iterate(None, Some(&json!("")), 10).is_empty());
        assert!(looping.iterate(None, None, 10).is_empty());
    }

    #[tokio::test]
    async fn test_max_iterations_caps_output() {
        let outputs = run(
            json!({"loopType": "times", "maxIterations": 3}),
            json!({"input": 50}),
        )
        .await;
        assert_eq!(outputs.get("count"), Some(&json!(3)));
        assert_eq!(outputs.get("output").unwrap()[2]["total"], json!(3));
    }

    #[tokio::test]
    async fn test_unknown_loop_type_fails() {
        let err = LoopNode
            .execute(
                &node(json!({"loopType": "until"})),
                PortValues::new(),
                &ExecutorExtensions::new(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown loop type 'until'"));
    }
}
