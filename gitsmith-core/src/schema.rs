//! Operation input schemas.
//!
//! Arguments arrive from the front-end as a flat JSON object whose values are
//! strings, numbers or booleans. Each operation declares an [`InputSchema`];
//! [`InputSchema::validate`] checks an argument map against it before any
//! network call is made.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Arguments of an operation request.
pub type Arguments = serde_json::Map<String, Value>;

/// An argument failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid argument `{field}`: {reason}")]
pub struct InvalidArgument {
    pub field: String,
    pub reason: String,
}

impl InvalidArgument {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Type of a single argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Boolean,
}

impl FieldType {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.as_i64().is_some(),
            Self::Boolean => value.is_boolean(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }
}

/// One declared argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: FieldType,
    pub required: bool,
    pub description: &'static str,
    /// Accept an empty or whitespace-only string for a required field.
    #[serde(skip)]
    pub allow_blank: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldType, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            description,
            allow_blank: false,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldType, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
            allow_blank: false,
        }
    }

    /// Let a required string through even when it is blank.
    pub const fn allow_blank(mut self) -> Self {
        self.allow_blank = true;
        self
    }
}

/// Ordered list of the arguments an operation accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct InputSchema {
    fields: Vec<FieldSpec>,
}

impl InputSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Schema of an operation that takes no arguments.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check `args` against the schema.
    ///
    /// `null` counts as absent. Required strings must not be blank unless
    /// the field allows it. Names that the schema does not declare are
    /// rejected.
    pub fn validate(&self, args: &Arguments) -> Result<(), InvalidArgument> {
        for field in &self.fields {
            match args.get(field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        return Err(InvalidArgument::new(field.name, "is required"));
                    }
                }
                Some(value) => {
                    if !field.kind.matches(value) {
                        return Err(InvalidArgument::new(
                            field.name,
                            format!("expected {}, got {}", field.kind.as_str(), json_type(value)),
                        ));
                    }
                    if field.required
                        && !field.allow_blank
                        && value.as_str().is_some_and(|s| s.trim().is_empty())
                    {
                        return Err(InvalidArgument::new(field.name, "must not be empty"));
                    }
                }
            }
        }

        if let Some(unknown) = args.keys().find(|k| self.field(k.as_str()).is_none()) {
            return Err(InvalidArgument::new(unknown.as_str(), "is not a recognized argument"));
        }

        Ok(())
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Typed access to validated arguments.
pub trait ArgumentsExt {
    /// A string argument, trimmed; `None` when absent, null or blank.
    fn get_str(&self, name: &str) -> Option<&str>;

    /// A boolean argument; `None` when absent or null.
    fn get_bool(&self, name: &str) -> Option<bool>;

    /// A string argument that the schema marks as required.
    fn require_str(&self, name: &str) -> Result<&str, InvalidArgument>;
}

impl ArgumentsExt for Arguments {
    fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    fn require_str(&self, name: &str) -> Result<&str, InvalidArgument> {
        self.get_str(name)
            .ok_or_else(|| InvalidArgument::new(name, "is required"))
    }
}
