//! Data Transform Node
//!
//! Converts the input between text, JSON, number and array forms.

use std::sync::Arc;

use async_trait::async_trait;
use node_engine::{
    ConfigField, ConfigSchema, DescribeNode, ExecutorExtensions, GraphNode, NodeCategory,
    NodeDescriptor, NodeExecutor, PortValues,
};
use serde_json::{json, Value};

use crate::error::NodeError;
use crate::template::value_to_text;

/// Supported `transformType` values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    JsonParse,
    JsonStringify,
    ToString,
    ToNumber,
    ToArray,
}

impl Transform {
    pub const NAMES: [&'static str; 5] =
        ["json-parse", "json-stringify", "to-string", "to-number", "to-array"];

    pub fn from_name(name: &str) -> Result<Self, NodeError> {
        match name {
            "json-parse" => Ok(Self::JsonParse),
            "json-stringify" => Ok(Self::JsonStringify),
            "to-string" => Ok(Self::ToString),
            "to-number" => Ok(Self::ToNumber),
            "to-array" => Ok(Self::ToArray),
            other => Err(NodeError::UnknownOption {
                kind: "transform",
                value: other.to_string(),
            }),
        }
    }

    /// Apply the transform; `None` means the input port had no value
    pub fn apply(self, input: Option<Value>) -> Result<Value, NodeError> {
        match self {
            // Structured input is already parsed
            Self::JsonParse => match input {
                Some(Value::String(text)) => Ok(serde_json::from_str(&text)?),
                other => Ok(other.unwrap_or(Value::Null)),
            },
            Self::JsonStringify => Ok(Value::String(serde_json::to_string_pretty(
                &input.unwrap_or(Value::Null),
            )?)),
            Self::ToString => Ok(Value::String(
                input.as_ref().map(value_to_text).unwrap_or_default(),
            )),
            Self::ToNumber => to_number(input.as_ref()),
            Self::ToArray => Ok(match input {
                Some(Value::Array(items)) => Value::Array(items),
                Some(value) => Value::Array(vec![value]),
                None => Value::Array(Vec::new()),
            }),
        }
    }
}

fn to_number(input: Option<&Value>) -> Result<Value, NodeError> {
    let not_a_number = || NodeError::NotANumber(input.map(value_to_text).unwrap_or_default());

    let number = match input {
        Some(Value::Number(n)) => return Ok(Value::Number(n.clone())),
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::String(s)) if s.trim().is_empty() => 0.0,
        Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| not_a_number())?,
        _ => return Err(not_a_number()),
    };
    if !number.is_finite() {
        return Err(not_a_number());
    }

    if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        Ok(json!(number as i64))
    } else {
        Ok(json!(number))
    }
}

/// Converts the input between representations
#[derive(Debug, Clone, Copy, Default)]
pub struct DataTransformNode;

impl DataTransformNode {
    pub const NODE_TYPE: &'static str = "dataTransform";
    /// Port ID for the value input
    pub const PORT_INPUT: &'static str = "input";
    /// Port ID for the converted value
    pub const PORT_OUTPUT: &'static str = "output";
}

impl DescribeNode for DataTransformNode {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new(Self::NODE_TYPE, "Data Transform", NodeCategory::Auxiliary)
            .with_description("Parses, stringifies or converts the input")
            .with_inputs(&[Self::PORT_INPUT])
            .with_outputs(&[Self::PORT_OUTPUT])
            .with_schema(ConfigSchema::new().field(
                "transformType",
                ConfigField::enumeration(&Transform::NAMES, "json-parse"),
            ))
    }
}

inventory::submit!(node_engine::BuiltinNode::new(
    DataTransformNode::descriptor,
    || Arc::new(DataTransformNode)
));

#[async_trait]
impl NodeExecutor for DataTransformNode {
    async fn execute(
        &self,
        node: &GraphNode,
        mut inputs: PortValues,
        _extensions: &ExecutorExtensions,
    ) -> node_engine::Result<PortValues> {
        let transform =
            Transform::from_name(node.config_str("transformType").unwrap_or("json-parse"))?;
        log::debug!("DataTransformNode {}: {:?}", node.id, transform);

        let result = transform.apply(inputs.remove(Self::PORT_INPUT))?;

        let mut outputs = PortValues::new();
        outputs.insert(Self::PORT_OUTPUT.to_string(), result);
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_parse() {
        let parsed = Transform::JsonParse
            .apply(Some(json!(r#"{"a": [1, 2]}"#)))
            .unwrap();
        assert_eq!(parsed, json!({"a": [1, 2]}));

        // Already structured
        assert_eq!(
            Transform::JsonParse.apply(Some(json!({"a": 1}))).unwrap(),
            json!({"a": 1})
        );
        assert!(matches!(
            Transform::JsonParse.apply(Some(json!("{oops"))),
            Err(NodeError::Json(_))
        ));
    }

    #[test]
    fn test_json_stringify_is_pretty() {
        let text = Transform::JsonStringify.apply(Some(json!({"a": 1}))).unwrap();
        assert_eq!(text, json!("{\n  \"a\": 1\n}"));
    }

    #[test]
    fn test_to_string() {
        assert_eq!(Transform::ToString.apply(Some(json!(12))).unwrap(), json!("12"));
        assert_eq!(Transform::ToString.apply(Some(json!("x"))).unwrap(), json!("x"));
        assert_eq!(Transform::ToString.apply(None).unwrap(), json!(""));
    }

    #[test]
    fn test_to_number() {
        assert_eq!(Transform::ToNumber.apply(Some(json!(" 42 "))).unwrap(), json!(42));
        assert_eq!(Transform::ToNumber.apply(Some(json!("2.5"))).unwrap(), json!(2.5));
        assert_eq!(Transform::ToNumber.apply(Some(json!(true))).unwrap(), json!(1));
        assert_eq!(Transform::ToNumber.apply(Some(json!(7))).unwrap(), json!(7));

        let err = Transform::ToNumber.apply(Some(json!("abc"))).unwrap_err();
        assert_eq!(err.to_string(), "Cannot convert to number: abc");
        assert!(Transform::ToNumber.apply(None).is_err());
        assert!(Transform::ToNumber.apply(Some(json!("inf"))).is_err());
    }

    #[test]
    fn test_to_array() {
        assert_eq!(Transform::ToArray.apply(Some(json!([1]))).unwrap(), json!([1]));
        assert_eq!(Transform::ToArray.apply(Some(json!("a"))).unwrap(), json!(["a"]));
        assert_eq!(Transform::ToArray.apply(None).unwrap(), json!([]));
    }

    #[tokio::test]
    async fn test_execute_and_unknown_transform() {
        let mut node = GraphNode {
            id: "node_5".to_string(),
            node_type: DataTransformNode::NODE_TYPE.to_string(),
            config: json!({"transformType": "to-number"}).as_object().cloned().unwrap(),
            label: None,
        };
        let mut inputs = PortValues::new();
        inputs.insert("input".to_string(), json!("10"));

        let outputs = DataTransformNode
            .execute(&node, inputs.clone(), &ExecutorExtensions::new())
            .await
            .unwrap();
        assert_eq!(outputs.get("output"), Some(&json!(10)));

        node.config.insert("transformType".to_string(), json!("custom"));
        let err = DataTransformNode
            .execute(&node, inputs, &ExecutorExtensions::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown transform 'custom'"));
    }
}
