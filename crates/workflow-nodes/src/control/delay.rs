//! Delay Node
//!
//! Waits for a configured time, then passes its input through unchanged.
//! Useful for pacing calls to rate-limited services.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use node_engine::{
    ConfigField, ConfigSchema, DescribeNode, ExecutorExtensions, GraphNode, NodeCategory,
    NodeDescriptor, NodeExecutor, PortValues,
};
use serde_json::Value;

use crate::error::NodeError;

/// Time unit of the `delay` config value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayUnit {
    Milliseconds,
    Seconds,
    Minutes,
}

impl DelayUnit {
    pub fn from_name(name: &str) -> Result<Self, NodeError> {
        match name {
            "milliseconds" => Ok(Self::Milliseconds),
            "seconds" => Ok(Self::Seconds),
            "minutes" => Ok(Self::Minutes),
            other => Err(NodeError::UnknownOption {
                kind: "time unit",
                value: other.to_string(),
            }),
        }
    }

    /// `amount` of this unit as a duration; negative amounts wait zero
    pub fn duration(self, amount: f64) -> Duration {
        let millis = match self {
            Self::Milliseconds => amount,
            Self::Seconds => amount * 1_000.0,
            Self::Minutes => amount * 60_000.0,
        };
        Duration::try_from_secs_f64(millis.max(0.0) / 1_000.0).unwrap_or(Duration::MAX)
    }
}

/// Sleeps, then forwards `input` to `output`
#[derive(Debug, Clone, Copy, Default)]
pub struct DelayNode;

impl DelayNode {
    pub const NODE_TYPE: &'static str = "delay";
    /// Port ID for the pass-through input
    pub const PORT_INPUT: &'static str = "input";
    /// Port ID for the pass-through output
    pub const PORT_OUTPUT: &'static str = "output";
}

impl DescribeNode for DelayNode {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new(Self::NODE_TYPE, "Delay", NodeCategory::Auxiliary)
            .with_description("Waits before passing the input on")
            .with_inputs(&[Self::PORT_INPUT])
            .with_outputs(&[Self::PORT_OUTPUT])
            .with_schema(
                ConfigSchema::new()
                    .field(
                        "delay",
                        ConfigField::number(1000.0)
                            .with_range(Some(0.0), None)
                            .with_description("How long to wait, in `unit`"),
                    )
                    .field(
                        "unit",
                        ConfigField::enumeration(
                            &["milliseconds", "seconds", "minutes"],
                            "milliseconds",
                        ),
                    ),
            )
    }
}

inventory::submit!(node_engine::BuiltinNode::new(
    DelayNode::descriptor,
    || Arc::new(DelayNode)
));

#[async_trait]
impl NodeExecutor for DelayNode {
    async fn execute(
        &self,
        node: &GraphNode,
        mut inputs: PortValues,
        _extensions: &ExecutorExtensions,
    ) -> node_engine::Result<PortValues> {
        let unit = DelayUnit::from_name(node.config_str("unit").unwrap_or("milliseconds"))?;
        let amount = node.config_f64("delay").filter(|d| d.is_finite()).unwrap_or(1000.0);
        let wait = unit.duration(amount);

        log::debug!("DelayNode {}: waiting {:?}", node.id, wait);
        tokio::time::sleep(wait).await;

        let mut outputs = PortValues::new();
        outputs.insert(
            Self::PORT_OUTPUT.to_string(),
            inputs.remove(Self::PORT_INPUT).unwrap_or(Value::Null),
        );
        Ok(outputs)
    }
}
