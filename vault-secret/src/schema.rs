//! Write-time payload contracts.
//!
//! A [`Schema`] names the fields a secret must carry and the primitive type of
//! each. Validation reports every violation at once.

use crate::error::{ConfigError, ValidationError};
use crate::secrets::Payload;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Primitive type a schema field may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// JSON string
    Str,
    /// JSON integer (floats and booleans do not match)
    Int,
    /// JSON boolean
    Bool,
}

impl FieldType {
    /// Name as written in a schema.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::Bool => "bool",
        }
    }

    /// Whether the value has this type.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Str => value.is_string(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Bool => value.is_boolean(),
        }
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "str" => Ok(Self::Str),
            "int" => Ok(Self::Int),
            "bool" => Ok(Self::Bool),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field whose value has the wrong type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    /// Field name
    pub field: String,
    /// Type required by the schema
    pub expected: FieldType,
    /// JSON type actually found
    pub actual: &'static str,
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field `{}` must be {} but is {}",
            self.field, self.expected, self.actual
        )
    }
}

/// Field name to type contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    fields: BTreeMap<String, FieldType>,
}

impl Schema {
    /// Create an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(name.into(), field_type);
        self
    }

    /// Build a schema from a JSON object of `field: "type"` entries.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownFieldType`] when a type is not `str`, `int`
    /// or `bool`, or is not a string at all.
    pub fn from_json(map: &serde_json::Map<String, Value>) -> Result<Self, ConfigError> {
        let mut schema = Self::new();
        for (field, declared) in map {
            let field_type = declared
                .as_str()
                .ok_or_else(|| declared.to_string())
                .and_then(FieldType::from_str)
                .map_err(|type_name| ConfigError::UnknownFieldType {
                    field: field.clone(),
                    type_name,
                })?;
            schema.fields.insert(field.clone(), field_type);
        }
        Ok(schema)
    }

    /// Check the payload against every field.
    ///
    /// # Errors
    ///
    /// Returns every missing field and type mismatch, in field-name order.
    pub fn validate(&self, data: &Payload) -> Result<(), ValidationError> {
        let mut violations = ValidationError::default();

        for (field, expected) in &self.fields {
            match data.get(field) {
                None => violations.missing_fields.push(field.clone()),
                Some(value) if !expected.matches(value) => {
                    violations.type_mismatches.push(TypeMismatch {
                        field: field.clone(),
                        expected: *expected,
                        actual: json_type_name(value),
                    });
                }
                Some(_) => {}
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

/// Validate against an optional schema; no schema always passes.
///
/// # Errors
///
/// See [`Schema::validate`].
pub fn validate(data: &Payload, schema: Option<&Schema>) -> Result<(), ValidationError> {
    schema.map_or(Ok(()), |s| s.validate(data))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}
