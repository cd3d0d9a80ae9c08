//! Typed configuration schemas for node types
//!
//! Every parameter a node type accepts is described by a [`ConfigField`]
//! whose [`FieldKind`] is a tagged variant with its own validator. A
//! [`ConfigSchema`] validates, coerces and default-fills a node's config
//! when the node is created or updated, so executors only ever see values
//! of the declared shape.
//!
//! Serialized, a field looks like
//! `{ "type": "enum", "options": ["a", "b"], "default": "a", "description": "..." }`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::NodeConfig;

/// Value shape of a config parameter, with its default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    /// Free text
    String {
        #[serde(default)]
        default: String,
    },
    /// Flag; accepts `true`/`false`, their string forms, and 0/1
    Boolean {
        #[serde(default)]
        default: bool,
    },
    /// Exactly one of `options`
    Enum {
        options: Vec<String>,
        #[serde(default)]
        default: String,
    },
    /// Any subset of `options`
    Multiselect {
        options: Vec<String>,
        #[serde(default)]
        default: Vec<String>,
    },
    /// Number or numeric string, optionally bounded
    Number {
        #[serde(default)]
        default: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A single config parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigField {
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Must be non-empty before the workflow may run
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
}

impl ConfigField {
    fn of(kind: FieldKind) -> Self {
        Self {
            kind,
            description: None,
            required: false,
        }
    }

    /// Create a string field
    pub fn string(default: impl Into<String>) -> Self {
        Self::of(FieldKind::String {
            default: default.into(),
        })
    }

    /// Create a boolean field
    pub fn boolean(default: bool) -> Self {
        Self::of(FieldKind::Boolean { default })
    }

    /// Create an enum field
    pub fn enumeration(options: &[&str], default: impl Into<String>) -> Self {
        Self::of(FieldKind::Enum {
            options: options.iter().map(|o| o.to_string()).collect(),
            default: default.into(),
        })
    }

    /// Create a multiselect field
    pub fn multiselect(options: &[&str], default: &[&str]) -> Self {
        Self::of(FieldKind::Multiselect {
            options: options.iter().map(|o| o.to_string()).collect(),
            default: default.iter().map(|o| o.to_string()).collect(),
        })
    }

    /// Create a number field
    pub fn number(default: f64) -> Self {
        Self::of(FieldKind::Number {
            default,
            min: None,
            max: None,
        })
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark the field as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Bound a number field; no effect on other kinds
    pub fn with_range(mut self, lower: Option<f64>, upper: Option<f64>) -> Self {
        if let FieldKind::Number { min, max, .. } = &mut self.kind {
            *min = lower;
            *max = upper;
        }
        self
    }

    /// The field's default as a JSON value
    pub fn default_value(&self) -> Value {
        match &self.kind {
            FieldKind::String { default } => Value::String(default.clone()),
            FieldKind::Boolean { default } => Value::Bool(*default),
            FieldKind::Enum { default, .. } => Value::String(default.clone()),
            FieldKind::Multiselect { default, .. } => {
                Value::Array(default.iter().cloned().map(Value::String).collect())
            }
            FieldKind::Number { default, .. } => number_value(*default),
        }
    }

    /// Check `value` against this field and return its canonical form.
    ///
    /// `null` means "unset" and yields the default.
    pub fn normalize(&self, key: &str, value: &Value) -> Result<Value, String> {
        if value.is_null() {
            return Ok(self.default_value());
        }

        match &self.kind {
            FieldKind::String { .. } => match value {
                Value::String(_) => Ok(value.clone()),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                _ => Err(format!("'{}' must be a string", key)),
            },
            FieldKind::Boolean { .. } => coerce_bool(value)
                .map(Value::Bool)
                .ok_or_else(|| format!("'{}' must be a boolean", key)),
            FieldKind::Enum { options, .. } => match value.as_str() {
                Some(s) if options.iter().any(|o| o == s) => Ok(value.clone()),
                _ => Err(format!(
                    "'{}' must be one of: {}",
                    key,
                    options.join(", ")
                )),
            },
            FieldKind::Multiselect { options, .. } => {
                let items: Vec<&Value> = match value {
                    Value::Array(items) => items.iter().collect(),
                    Value::String(_) => vec![value],
                    _ => return Err(format!("'{}' must be a list of options", key)),
                };
                let mut selected = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_str() {
                        Some(s) if options.iter().any(|o| o == s) => {
                            selected.push(Value::String(s.to_string()))
                        }
                        _ => {
                            return Err(format!(
                                "'{}' values must be drawn from: {}",
                                key,
                                options.join(", ")
                            ))
                        }
                    }
                }
                Ok(Value::Array(selected))
            }
            FieldKind::Number { min, max, .. } => {
                let n = coerce_number(value).ok_or_else(|| format!("'{}' must be a number", key))?;
                if let Some(lower) = min {
                    if n < *lower {
                        return Err(format!("'{}' must be at least {}", key, lower));
                    }
                }
                if let Some(upper) = max {
                    if n > *upper {
                        return Err(format!("'{}' must be at most {}", key, upper));
                    }
                }
                Ok(number_value(n))
            }
        }
    }

    /// Whether a required field holds an empty value
    pub fn is_missing(&self, value: Option<&Value>) -> bool {
        if !self.required {
            return false;
        }
        match value {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(Value::Array(items)) => items.is_empty(),
            Some(_) => false,
        }
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 0.0 => Some(false),
            Some(f) if f == 1.0 => Some(true),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Integral values serialize as JSON integers
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Parameter name to field, for one node type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigSchema {
    fields: BTreeMap<String, ConfigField>,
}

impl ConfigSchema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field (builder style)
    pub fn field(mut self, name: impl Into<String>, field: ConfigField) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Look up a field by parameter name
    pub fn get(&self, name: &str) -> Option<&ConfigField> {
        self.fields.get(name)
    }

    /// Iterate fields in parameter-name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigField)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Every field's default
    pub fn defaults(&self) -> NodeConfig {
        self.fields
            .iter()
            .map(|(name, field)| (name.clone(), field.default_value()))
            .collect()
    }

    /// List every violation in `config`; unknown keys are ignored
    pub fn validate(&self, config: &NodeConfig) -> Vec<String> {
        self.fields
            .iter()
            .filter_map(|(name, field)| {
                config
                    .get(name)
                    .and_then(|value| field.normalize(name, value).err())
            })
            .collect()
    }

    /// Merge `config` over the defaults and coerce every known field.
    ///
    /// Unknown keys pass through untouched.
    pub fn normalize(&self, config: &NodeConfig) -> Result<NodeConfig, Vec<String>> {
        let mut merged = self.defaults();
        let mut errors = Vec::new();

        for (key, value) in config {
            match self.fields.get(key) {
                Some(field) => match field.normalize(key, value) {
                    Ok(canonical) => {
                        merged.insert(key.clone(), canonical);
                    }
                    Err(e) => errors.push(e),
                },
                None => {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }

        if errors.is_empty() {
            Ok(merged)
        } else {
            Err(errors)
        }
    }

    /// Names of required fields left empty in `config`
    pub fn missing_required(&self, config: &NodeConfig) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(name, field)| field.is_missing(config.get(name.as_str())))
            .map(|(name, _)| name.clone())
            .collect()
    }
}
