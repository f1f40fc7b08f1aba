//! Argument schemas and validation.
//!
//! A schema is a JSON Schema document describing a tool's keyword arguments,
//! compiled once at construction. An empty schema disables validation.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use gate_primitives::Arguments;
use jsonschema::Validator;
use serde_json::{Map, Value, json};

use crate::registry::{ToolError, ToolResult};

/// JSON value kinds accepted by the schema builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// JSON string.
    String,
    /// Any JSON number.
    Number,
    /// JSON number without a fractional part.
    Integer,
    /// JSON boolean.
    Boolean,
    /// JSON array.
    Array,
    /// JSON object.
    Object,
    /// JSON null.
    Null,
}

impl ValueKind {
    /// Returns the JSON Schema type label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Null => "null",
        }
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
enum Compiled {
    Disabled,
    Ready(Arc<Validator>),
    Broken(String),
}

fn compile(document: &Value) -> Compiled {
    match Validator::new(document) {
        Ok(validator) => Compiled::Ready(Arc::new(validator)),
        Err(err) => Compiled::Broken(err.to_string()),
    }
}

/// Input specification for a tool: a JSON Schema document plus its compiled
/// validator.
#[derive(Clone)]
pub struct ToolSchema {
    document: Value,
    compiled: Compiled,
}

impl fmt::Debug for ToolSchema {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSchema")
            .field("document", &self.document)
            .field("validates", &!self.is_empty())
            .finish()
    }
}

impl PartialEq for ToolSchema {
    fn eq(&self, other: &Self) -> bool {
        self.is_empty() == other.is_empty() && self.document == other.document
    }
}

impl Eq for ToolSchema {}

impl Default for ToolSchema {
    fn default() -> Self {
        Self::empty()
    }
}

impl ToolSchema {
    /// Creates a schema that accepts any arguments.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            document: json!({ "type": "object", "properties": {} }),
            compiled: Compiled::Disabled,
        }
    }

    /// Returns `true` when the schema performs no validation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self.compiled, Compiled::Disabled)
    }

    /// Declares an optional property of the given kind.
    #[must_use]
    pub fn property(self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.with_property(name.into(), kind, false)
    }

    /// Declares a required property of the given kind.
    #[must_use]
    pub fn required(self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.with_property(name.into(), kind, true)
    }

    /// Rejects arguments not declared as properties.
    #[must_use]
    pub fn deny_additional(mut self) -> Self {
        if let Some(root) = self.document.as_object_mut() {
            root.insert("additionalProperties".to_owned(), Value::Bool(false));
        }
        self.recompile()
    }

    fn with_property(mut self, name: String, kind: ValueKind, required: bool) -> Self {
        if let Some(root) = self.document.as_object_mut() {
            if let Some(properties) = root
                .entry("properties")
                .or_insert_with(|| Value::Object(Map::new()))
                .as_object_mut()
            {
                properties.insert(name.clone(), json!({ "type": kind.as_str() }));
            }
            if required {
                let list = root
                    .entry("required")
                    .or_insert_with(|| Value::Array(Vec::new()))
                    .as_array_mut()
                    .filter(|list| !list.iter().any(|existing| existing == name.as_str()));
                if let Some(list) = list {
                    list.push(Value::String(name));
                }
            }
        }
        self.recompile()
    }

    fn recompile(mut self) -> Self {
        self.compiled = compile(&self.document);
        self
    }

    /// Compiles a JSON Schema document describing keyword arguments.
    ///
    /// `null` and `{}` yield an empty schema.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidSchema`] when the document is not an object
    /// schema or does not compile.
    pub fn from_json(document: &Value) -> ToolResult<Self> {
        let object = match document {
            Value::Null => return Ok(Self::empty()),
            Value::Object(object) if object.is_empty() => return Ok(Self::empty()),
            Value::Object(object) => object,
            _ => return Err(invalid("schema must be a JSON object")),
        };

        if object.get("type").is_some_and(|kind| kind != "object") {
            return Err(invalid("top-level schema type must be `object`"));
        }

        let validator = Validator::new(document).map_err(|err| invalid(err.to_string()))?;
        Ok(Self {
            document: document.clone(),
            compiled: Compiled::Ready(Arc::new(validator)),
        })
    }

    /// Returns the JSON Schema document.
    #[must_use]
    pub fn to_json(&self) -> Value {
        self.document.clone()
    }

    /// Validates arguments, collecting every violation.
    ///
    /// # Errors
    ///
    /// Returns the list of human-readable violations when validation fails.
    pub fn validate(&self, arguments: &Arguments) -> Result<(), Vec<String>> {
        let validator = match &self.compiled {
            Compiled::Disabled => return Ok(()),
            Compiled::Broken(reason) => {
                return Err(vec![format!("schema does not compile: {reason}")]);
            }
            Compiled::Ready(validator) => validator,
        };

        let instance = Value::Object(arguments.clone());
        if validator.is_valid(&instance) {
            return Ok(());
        }
        Err(validator
            .iter_errors(&instance)
            .map(|err| err.to_string())
            .collect())
    }
}

fn invalid(reason: impl Into<String>) -> ToolError {
    ToolError::InvalidSchema {
        reason: reason.into(),
    }
}
