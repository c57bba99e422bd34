//! Document linting - static checks that run without compiling.
//!
//! Reports:
//! - `$ref`s naming schemas absent from the document (E001)
//! - a missing or malformed `Entity` schema (W001)
//! - `Entity` variants without a `type` enum or `data` reference (W002)

use serde::Serialize;
use serde_json::Value;

use crate::document::{parse_entity_mappings, SchemaDocument};
use crate::types::ENTITY_SCHEMA;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    /// Named schema the issue is in.
    pub schema: String,
    /// JSON pointer inside the schema (e.g. "/properties/owner/$ref")
    pub path: String,
    pub message: String,
}

/// Result of linting a document.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub schemas_checked: usize,
    pub errors: usize,
    pub warnings: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl LintResult {
    /// Returns true if there are no errors.
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Lint every named schema of a document.
pub fn lint_document(document: &SchemaDocument) -> LintResult {
    let mut diagnostics = Vec::new();

    for (name, schema) in document.schemas() {
        check_refs(schema, document, name, "", &mut diagnostics);
    }
    check_entity(document, &mut diagnostics);

    let errors = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    let warnings = diagnostics.len() - errors;

    LintResult {
        schemas_checked: document.len(),
        errors,
        warnings,
        diagnostics,
    }
}

/// Recursively check $ref values in a schema.
fn check_refs(
    value: &Value,
    document: &SchemaDocument,
    schema: &str,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                if document.resolve_ref(reference).is_none() {
                    diagnostics.push(Diagnostic {
                        severity: Severity::Error,
                        code: "E001".to_string(),
                        schema: schema.to_string(),
                        path: format!("{}/$ref", path),
                        message: format!("unresolved reference: {}", reference),
                    });
                }
            }

            for (key, val) in map {
                let child_path = format!("{}/{}", path, escape_pointer(key));
                check_refs(val, document, schema, &child_path, diagnostics);
            }
        }
        Value::Array(arr) => {
            for (i, item) in arr.iter().enumerate() {
                let child_path = format!("{}/{}", path, i);
                check_refs(item, document, schema, &child_path, diagnostics);
            }
        }
        _ => {}
    }
}

fn check_entity(document: &SchemaDocument, diagnostics: &mut Vec<Diagnostic>) {
    let Ok(mappings) = parse_entity_mappings(document) else {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            code: "W001".to_string(),
            schema: ENTITY_SCHEMA.to_string(),
            path: "/".to_string(),
            message: "no Entity schema with oneOf; entity entry points will be empty".to_string(),
        });
        return;
    };

    for (i, mapping) in mappings.iter().enumerate() {
        let missing = match (mapping.state_entry.is_empty(), mapping.schema_name.is_empty()) {
            (false, false) => continue,
            (true, false) => "type enum",
            (false, true) => "data reference",
            (true, true) => "type enum and data reference",
        };
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            code: "W002".to_string(),
            schema: ENTITY_SCHEMA.to_string(),
            path: format!("/oneOf/{}", i),
            message: format!("entity variant has no {}", missing),
        });
    }
}

fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}
