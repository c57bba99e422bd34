//! Error types for document loading, plugins, and validation.

use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Errors at the document boundary: loading input, writing bundles.
///
/// Compilation itself never fails; see [`crate::compile`].
#[derive(Debug, Error)]
pub enum DocumentError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot serialize bundle: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },

    // Document errors (exit code 2)
    #[error("invalid document: {message}")]
    InvalidDocument { message: String },

    #[error("Entity schema not found in document or missing oneOf")]
    MissingEntitySchema,
}

impl DocumentError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            DocumentError::FileNotFound { .. }
            | DocumentError::ReadError { .. }
            | DocumentError::WriteError { .. } => 3,
            #[cfg(feature = "remote")]
            DocumentError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Failure inside a plugin's `matches` or `transform`.
///
/// The pipeline logs it and moves on to the next plugin.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("unsupported schema: {reason}")]
    Unsupported { reason: String },

    #[error("{0}")]
    Message(String),
}

impl From<String> for PluginError {
    fn from(message: String) -> Self {
        PluginError::Message(message)
    }
}

impl From<&str> for PluginError {
    fn from(message: &str) -> Self {
        PluginError::Message(message.to_string())
    }
}

/// Single validation failure with path context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    /// Dot/bracket path to the invalid value (e.g. `tasks[0].name`).
    pub path: String,
    /// Human-readable error message.
    pub message: String,
    /// The offending value, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: Option<Value>) -> Self {
        self.value = value;
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}
