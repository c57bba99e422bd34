//! Shared types for schema compilation and validation.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the schema whose `oneOf` variants define the entity kinds.
pub const ENTITY_SCHEMA: &str = "Entity";

/// Default file name for the eagerly loaded bundle.
pub const MAIN_BUNDLE_FILE: &str = "schemas.json";

/// Default file name for the lazily loaded bundle.
pub const RUNTIME_BUNDLE_FILE: &str = "schemas.runtime.json";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Scalar type carried by a `Primitive` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    String,
    Number,
    Integer,
    Boolean,
}

impl PrimitiveType {
    /// Parse a JSON Schema `type` keyword.
    ///
    /// Returns `None` for non-scalar types (`object`, `array`, `null`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(PrimitiveType::String),
            "number" => Some(PrimitiveType::Number),
            "integer" => Some(PrimitiveType::Integer),
            "boolean" => Some(PrimitiveType::Boolean),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveType::String => "string",
            PrimitiveType::Number => "number",
            PrimitiveType::Integer => "integer",
            PrimitiveType::Boolean => "boolean",
        }
    }
}

/// Options for a single validation call.
///
/// `depth` is the current recursion depth. Validation warns once
/// `warn_depth` is reached and stops descending at `max_depth`, treating
/// anything deeper as valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidateOptions {
    pub depth: usize,
    pub warn_depth: usize,
    pub max_depth: usize,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            depth: 0,
            warn_depth: 15,
            max_depth: 20,
        }
    }
}

impl ValidateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the depth at which the depth-warning observer fires.
    pub fn warn_depth(mut self, warn_depth: usize) -> Self {
        self.warn_depth = warn_depth;
        self
    }

    /// Set the depth at which validation stops and passes.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Options for a child one level deeper.
    pub(crate) fn descend(self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self
        }
    }
}

/// Where and how compiled bundles are written.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Output directory, created if missing.
    pub dir: PathBuf,
    /// File name of the main (eager) bundle.
    pub main_file: String,
    /// File name of the runtime (lazy) bundle. Only written when non-empty.
    pub runtime_file: String,
    /// Pretty-print JSON output.
    pub pretty: bool,
}

impl OutputConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            main_file: MAIN_BUNDLE_FILE.to_string(),
            runtime_file: RUNTIME_BUNDLE_FILE.to_string(),
            pretty: false,
        }
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn main_file(mut self, name: impl Into<String>) -> Self {
        self.main_file = name.into();
        self
    }

    pub fn runtime_file(mut self, name: impl Into<String>) -> Self {
        self.runtime_file = name.into();
        self
    }
}
