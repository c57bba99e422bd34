//! Document loading from files, strings, and HTTP URLs.

use std::path::Path;

use serde_json::Value;

use crate::document::SchemaDocument;
use crate::error::DocumentError;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Load a JSON value from a file path.
///
/// # Errors
///
/// Returns `DocumentError::FileNotFound` if the file doesn't exist,
/// or `DocumentError::InvalidJson` if the file isn't valid JSON.
pub fn load_json(path: &Path) -> Result<Value, DocumentError> {
    if !path.exists() {
        return Err(DocumentError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| DocumentError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| DocumentError::InvalidJson { source })
}

/// Load a schema document from a file path.
pub fn load_document(path: &Path) -> Result<SchemaDocument, DocumentError> {
    SchemaDocument::from_value(load_json(path)?)
}

/// Load a schema document from a JSON string.
///
/// # Errors
///
/// Returns `DocumentError::InvalidJson` if the string isn't valid JSON.
pub fn load_document_str(content: &str) -> Result<SchemaDocument, DocumentError> {
    let value =
        serde_json::from_str(content).map_err(|source| DocumentError::InvalidJson { source })?;
    SchemaDocument::from_value(value)
}

/// Load a schema document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `DocumentError::NetworkError` if the request fails or the
/// response isn't valid JSON.
#[cfg(feature = "remote")]
pub fn load_document_url(url: &str) -> Result<SchemaDocument, DocumentError> {
    let network_error = |source| DocumentError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network_error)?;

    let value: Value = client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.json())
        .map_err(network_error)?;

    SchemaDocument::from_value(value)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a schema document from a file path or URL.
///
/// URLs require the `remote` feature.
pub fn load_document_auto(source: &str) -> Result<SchemaDocument, DocumentError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            return load_document_url(source);
        }
        #[cfg(not(feature = "remote"))]
        {
            return Err(DocumentError::InvalidDocument {
                message: format!("remote loading disabled, cannot fetch {}", source),
            });
        }
    }
    load_document(Path::new(source))
}
