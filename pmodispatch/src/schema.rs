//! Structural input schemas for operations
//!
//! A schema is built once at registration time and validated against the
//! raw `serde_json::Value` arguments on every invocation, before the handler
//! runs. Unknown fields are accepted; only declared fields are checked.

use serde_json::{json, Map, Value};

/// Expected shape of a single value
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    String,
    /// Entier (i64/u64); un nombre à virgule est refusé
    Integer,
    /// Nombre quelconque, entier inclus
    Number,
    Boolean,
    Array(Box<ValueKind>),
    Object,
    /// Accepte n'importe quelle valeur, y compris null
    Any,
}

impl ValueKind {
    fn name(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Integer => "integer",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Array(_) => "array",
            ValueKind::Object => "object",
            ValueKind::Any => "any",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            ValueKind::String => value.is_string(),
            ValueKind::Integer => value.is_i64() || value.is_u64(),
            ValueKind::Number => value.is_number(),
            ValueKind::Boolean => value.is_boolean(),
            ValueKind::Array(inner) => match value.as_array() {
                Some(items) => items.iter().all(|item| inner.matches(item)),
                None => false,
            },
            ValueKind::Object => value.is_object(),
            ValueKind::Any => true,
        }
    }

    fn describe(&self) -> Value {
        match self {
            ValueKind::Array(inner) => json!({"type": "array", "items": inner.describe()}),
            other => json!({"type": other.name()}),
        }
    }
}

#[derive(Debug, Clone)]
struct Field {
    name: String,
    kind: ValueKind,
    required: bool,
}

/// Declared input schema of an operation
///
/// The top level is always an object. Build with the fluent constructors:
///
/// ```rust
/// use pmodispatch::{Schema, ValueKind};
///
/// let schema = Schema::object()
///     .field("query", ValueKind::String)
///     .optional("limit", ValueKind::Integer);
///
/// assert!(schema.validate(&serde_json::json!({"query": "ai"})).is_ok());
/// assert!(schema.validate(&serde_json::json!({"limit": 3})).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Schéma objet vide (toutes les entrées objet sont acceptées)
    pub fn object() -> Self {
        Self::default()
    }

    /// Ajoute un champ obligatoire
    pub fn field(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.fields.push(Field {
            name: name.into(),
            kind,
            required: true,
        });
        self
    }

    /// Ajoute un champ optionnel
    pub fn optional(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.fields.push(Field {
            name: name.into(),
            kind,
            required: false,
        });
        self
    }

    /// Validates arguments against the declared shape
    ///
    /// `Null` is treated as an empty object so operations without arguments
    /// can be invoked with an omitted `arguments` member. Returns the first
    /// violation as a human-readable detail.
    pub fn validate(&self, arguments: &Value) -> std::result::Result<(), String> {
        let empty = Map::new();
        let map = match arguments {
            Value::Null => &empty,
            Value::Object(map) => map,
            other => {
                return Err(format!(
                    "expected an object, got {}",
                    json_type_name(other)
                ));
            }
        };

        for field in &self.fields {
            match map.get(&field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        return Err(format!("missing required field '{}'", field.name));
                    }
                }
                Some(value) => {
                    if !field.kind.matches(value) {
                        return Err(format!(
                            "field '{}' expects {}, got {}",
                            field.name,
                            field.kind.name(),
                            json_type_name(value)
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// JSON description of the schema, for module introspection
    pub fn describe(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in &self.fields {
            properties.insert(field.name.clone(), field.kind.describe());
            if field.required {
                required.push(Value::String(field.name.clone()));
            }
        }
        json!({
            "type": "object",
            "properties": Value::Object(properties),
            "required": Value::Array(required),
        })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn search_schema() -> Schema {
        Schema::object()
            .field("query", ValueKind::String)
            .optional("limit", ValueKind::Integer)
    }

    #[test]
    fn accepts_valid_arguments() {
        let schema = search_schema();
        assert!(schema.validate(&json!({"query": "ai"})).is_ok());
        assert!(schema.validate(&json!({"query": "ai", "limit": 5})).is_ok());
        // Champs inconnus tolérés
        assert!(schema.validate(&json!({"query": "ai", "extra": true})).is_ok());
    }

    #[test]
    fn rejects_missing_required() {
        let detail = search_schema().validate(&json!({"limit": 5})).unwrap_err();
        assert!(detail.contains("query"));
    }

    #[test]
    fn rejects_wrong_types() {
        let schema = search_schema();
        assert!(schema.validate(&json!({"query": 42})).is_err());
        assert!(schema.validate(&json!({"query": "x", "limit": "many"})).is_err());
        assert!(schema.validate(&json!({"query": "x", "limit": 1.5})).is_err());
        assert!(schema.validate(&json!("not an object")).is_err());
    }

    #[test]
    fn null_is_empty_object() {
        assert!(Schema::object().validate(&Value::Null).is_ok());
        assert!(search_schema().validate(&Value::Null).is_err());
    }

    #[test]
    fn array_items_checked() {
        let schema = Schema::object().field(
            "ids",
            ValueKind::Array(Box::new(ValueKind::String)),
        );
        assert!(schema.validate(&json!({"ids": ["a", "b"]})).is_ok());
        assert!(schema.validate(&json!({"ids": ["a", 1]})).is_err());
    }

    #[test]
    fn describe_lists_properties_and_required() {
        let described = search_schema().describe();
        assert_eq!(described["type"], "object");
        assert_eq!(described["properties"]["query"]["type"], "string");
        assert_eq!(described["required"], json!(["query"]));
    }
}
