/// Structured image descriptions and their normalized, editable form
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Result, StudioError};

/// Free-form field → value mapping produced by the analysis service.
///
/// Field order is preserved as received. Deserializes from an object or from
/// a string holding one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct StructuredDescription(Map<String, Value>);

impl StructuredDescription {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Accept either an object or a string holding a JSON object; services
    /// commonly return the structured prompt serialized as text.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::String(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => Ok(Self(map)),
                Ok(other) => Err(StudioError::Analysis(format!(
                    "expected an object, got {}",
                    json_kind(&other)
                ))),
                Err(e) => Err(StudioError::Analysis(e.to_string())),
            },
            other => Err(StudioError::Analysis(format!(
                "expected an object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn normalize(&self) -> NormalizedDescription {
        NormalizedDescription {
            fields: self
                .0
                .iter()
                .map(|(name, value)| (name.clone(), FieldValue::normalize(value)))
                .collect(),
        }
    }
}

impl From<Map<String, Value>> for StructuredDescription {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A field value after normalization: text or an ordered list of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn normalize(value: &Value) -> Self {
        match value {
            Value::Array(items) => Self::List(items.iter().map(stringify).collect()),
            other => Self::Text(stringify(other)),
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Scalars compare trimmed; lists compare element by element in order.
    pub fn differs_from(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a.trim() != b.trim(),
            (Self::List(a), Self::List(b)) => a.len() != b.len() || a.iter().zip(b).any(|(x, y)| x != y),
            _ => true,
        }
    }
}

/// Deterministic text for any JSON value. Strings are taken verbatim, `null`
/// becomes empty text, everything else is compact JSON.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Flattened snapshot of a description, in field order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NormalizedDescription {
    pub fields: Vec<(String, FieldValue)>,
}

impl NormalizedDescription {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut FieldValue> {
        self.fields
            .iter_mut()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Back to a JSON description, lists as arrays of strings.
    pub fn to_description(&self) -> StructuredDescription {
        let mut map = Map::new();
        for (name, value) in &self.fields {
            let value = match value {
                FieldValue::Text(text) => Value::String(text.clone()),
                FieldValue::List(items) => {
                    Value::Array(items.iter().cloned().map(Value::String).collect())
                }
            };
            map.insert(name.clone(), value);
        }
        StructuredDescription(map)
    }
}

impl TryFrom<Value> for StructuredDescription {
    type Error = StudioError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl From<StructuredDescription> for Value {
    fn from(description: StructuredDescription) -> Self {
        Value::Object(description.0)
    }
}
