//! Output schemas for structured model calls.
//!
//! A schema is a flat set of named fields with primitive types. It is used
//! twice per call: rendered into the backend's `responseSchema` so the model
//! is constrained up front, and applied to whatever text comes back so a
//! missing or mistyped field fails the call instead of leaking a partial
//! object to the caller.

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Primitive field types a structured flow can ask for.
///
/// No flow currently asks for integers or booleans; those variants exist for
/// the schema tests only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    #[cfg(test)]
    Integer,
    #[cfg(test)]
    Boolean,
    StringArray,
}

impl FieldType {
    fn wire_name(self) -> &'static str {
        match self {
            FieldType::String => "STRING",
            FieldType::Number => "NUMBER",
            #[cfg(test)]
            FieldType::Integer => "INTEGER",
            #[cfg(test)]
            FieldType::Boolean => "BOOLEAN",
            FieldType::StringArray => "ARRAY",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
    pub description: &'static str,
}

impl FieldSpec {
    pub const fn required(
        name: &'static str,
        field_type: FieldType,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            field_type,
            required: true,
            description,
        }
    }

    #[cfg(test)]
    pub const fn optional(
        name: &'static str,
        field_type: FieldType,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            field_type,
            required: false,
            description,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaViolation {
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' should be {expected:?}, got {actual}")]
    WrongType {
        field: &'static str,
        expected: FieldType,
        actual: &'static str,
    },
}

#[derive(Debug, Clone)]
pub struct OutputSchema {
    pub fields: Vec<FieldSpec>,
}

impl OutputSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Checks `value` against the schema and returns a normalized copy.
    ///
    /// Values that are close enough are coerced (`"55"` for a number, `"true"`
    /// for a boolean, a lone string for a string array). Fields not named by
    /// the schema are dropped.
    pub fn validate(&self, value: &Value) -> Result<Value, SchemaViolation> {
        let object = value
            .as_object()
            .ok_or_else(|| SchemaViolation::NotAnObject(kind_of(value)))?;

        let mut normalized = Map::new();
        for field in &self.fields {
            match object.get(field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        return Err(SchemaViolation::MissingField(field.name));
                    }
                }
                Some(raw) => {
                    let coerced = coerce(raw, field.field_type).ok_or(SchemaViolation::WrongType {
                        field: field.name,
                        expected: field.field_type,
                        actual: kind_of(raw),
                    })?;
                    normalized.insert(field.name.to_string(), coerced);
                }
            }
        }

        Ok(Value::Object(normalized))
    }

    /// Renders the schema in the backend's `responseSchema` dialect.
    pub fn to_response_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut property = json!({
                "type": field.field_type.wire_name(),
                "description": field.description,
            });
            if field.field_type == FieldType::StringArray {
                property["items"] = json!({ "type": "STRING" });
            }
            properties.insert(field.name.to_string(), property);
        }

        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect();

        json!({
            "type": "OBJECT",
            "properties": properties,
            "required": required,
        })
    }
}

/// A typed result that a structured flow deserializes model output into.
pub trait StructuredOutput: DeserializeOwned {
    fn schema() -> OutputSchema;
}

fn coerce(value: &Value, expected: FieldType) -> Option<Value> {
    match (expected, value) {
        (FieldType::String, Value::String(_)) => Some(value.clone()),
        (FieldType::String, Value::Number(n)) => Some(Value::String(n.to_string())),

        (FieldType::Number, Value::Number(_)) => Some(value.clone()),
        (FieldType::Number, Value::String(s)) => {
            let parsed = s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?;
            parsed.is_finite().then(|| json!(parsed))
        }

        #[cfg(test)]
        (FieldType::Integer, Value::Number(n)) => {
            if n.is_i64() || n.is_u64() {
                Some(value.clone())
            } else {
                let f = n.as_f64()?;
                (f.fract() == 0.0).then(|| json!(f as i64))
            }
        }
        #[cfg(test)]
        (FieldType::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(|i| json!(i)),

        #[cfg(test)]
        (FieldType::Boolean, Value::Bool(_)) => Some(value.clone()),
        #[cfg(test)]
        (FieldType::Boolean, Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(Value::Bool(true)),
            "false" | "no" => Some(Value::Bool(false)),
            _ => None,
        },

        (FieldType::StringArray, Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(_) => Some(item.clone()),
                Value::Number(n) => Some(Value::String(n.to_string())),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        (FieldType::StringArray, Value::String(s)) => Some(json!([s])),

        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
