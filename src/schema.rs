//! Structural descriptors for tool arguments.
//!
//! Instead of compiling a full JSON Schema validator, a tool declares its
//! accepted arguments as an explicit field table. The same descriptor drives
//! both sides of the protocol: it renders to the JSON-Schema-shaped
//! `inputSchema` that `tools/list` advertises, and it checks incoming
//! arguments at the server boundary before a handler ever runs.

use serde_json::{json, Map, Value};

/// The accepted JSON type of a single argument field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl FieldKind {
    /// The JSON Schema type name for this kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Array => "array",
            FieldKind::Object => "object",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Array => value.is_array(),
            FieldKind::Object => value.is_object(),
        }
    }

    fn describe(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

#[derive(Debug, Clone)]
struct SchemaField {
    name: String,
    kind: FieldKind,
    required: bool,
    description: Option<String>,
}

/// An ordered field table describing the arguments a tool accepts.
///
/// # Example
///
/// ```
/// use mcp_duplex::schema::{FieldKind, InputSchema};
/// use serde_json::json;
///
/// let schema = InputSchema::new()
///     .required("path", FieldKind::String, "Path of the file to delete")
///     .optional("force", FieldKind::Boolean, "Skip the confirmation prompt");
///
/// assert!(schema.validate(&json!({ "path": "/tmp/a.txt" })).is_ok());
/// assert!(schema.validate(&json!({ "force": true })).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InputSchema {
    fields: Vec<SchemaField>,
}

impl InputSchema {
    /// Creates an empty schema; it accepts any object (and missing arguments).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a required field.
    pub fn required(mut self, name: &str, kind: FieldKind, description: &str) -> Self {
        self.fields.push(SchemaField {
            name: name.to_string(),
            kind,
            required: true,
            description: Some(description.to_string()),
        });
        self
    }

    /// Adds an optional field.
    pub fn optional(mut self, name: &str, kind: FieldKind, description: &str) -> Self {
        self.fields.push(SchemaField {
            name: name.to_string(),
            kind,
            required: false,
            description: Some(description.to_string()),
        });
        self
    }

    /// Checks `arguments` against this schema.
    ///
    /// `null` arguments are treated as an empty object, since a call with no
    /// arguments omits the field entirely. Unknown extra fields are allowed.
    /// On mismatch the returned message names the offending field so it can
    /// be surfaced verbatim in a failure result.
    pub fn validate(&self, arguments: &Value) -> std::result::Result<(), String> {
        let object = match arguments {
            Value::Null => {
                if let Some(field) = self.fields.iter().find(|f| f.required) {
                    return Err(format!("missing required field '{}'", field.name));
                }
                return Ok(());
            }
            Value::Object(map) => map,
            other => {
                return Err(format!(
                    "expected an object of arguments, got {}",
                    FieldKind::describe(other)
                ))
            }
        };

        for field in &self.fields {
            match object.get(&field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        return Err(format!("missing required field '{}'", field.name));
                    }
                }
                Some(value) => {
                    if !field.kind.matches(value) {
                        return Err(format!(
                            "field '{}': expected {}, got {}",
                            field.name,
                            field.kind.type_name(),
                            FieldKind::describe(value)
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Renders the JSON-Schema-shaped discovery form carried in
    /// [`crate::types::Tool::input_schema`].
    pub fn to_json(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in &self.fields {
            let mut spec = Map::new();
            spec.insert("type".to_string(), json!(field.kind.type_name()));
            if let Some(desc) = &field.description {
                spec.insert("description".to_string(), json!(desc));
            }
            properties.insert(field.name.clone(), Value::Object(spec));
            if field.required {
                required.push(json!(field.name));
            }
        }
        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }
        Value::Object(schema)
    }
}
