//! Stately Schema Compiler
//!
//! Compiles OpenAPI-style JSON Schema documents into a typed node tree
//! and validates runtime data against it.
//!
//! Compilation resolves `$ref`s with cycle detection, classifies `oneOf`,
//! `anyOf` and `allOf` shapes into union and object nodes, and runs
//! registered plugins ahead of the built-in classifier. When plugins
//! declare entry points, output is split into a main bundle and a lazily
//! loaded runtime bundle holding the targets of reference cycles.
//!
//! # Example
//!
//! ```
//! use stately_schema::{Compiler, SchemaDocument, ValidateOptions, Validator};
//! use serde_json::json;
//!
//! let document = SchemaDocument::from_value(json!({
//!     "components": { "schemas": {
//!         "Task": {
//!             "type": "object",
//!             "properties": { "name": { "type": "string" } },
//!             "required": ["name"]
//!         }
//!     }}
//! }))
//! .unwrap();
//!
//! let output = Compiler::new().compile(&document);
//! let task = output.get("Task").unwrap();
//!
//! let mut validator = Validator::new(output.arena());
//! let result = validator.validate("", &json!({}), task, ValidateOptions::default());
//! assert!(!result.valid);
//! assert_eq!(result.errors[0].message, "Field 'name' is required");
//! ```
//!
//! # Bundle Splitting
//!
//! | Schema | Main bundle | Runtime bundle |
//! |--------|-------------|----------------|
//! | entry point | top-level key | - |
//! | target of a reference cycle | removed | top-level key |
//! | anything else | inlined where referenced | inlined where referenced |
//!
//! With no entry points every schema is a top-level key of the main bundle.

mod classifier;
mod compiler;
mod document;
mod error;
mod linter;
mod loader;
mod node;
mod plugin;
mod relative_path;
mod resolver;
mod types;
mod validator;

pub use compiler::{compile, write_bundles, CompileOutput, Compiler};
pub use document::{parse_entity_mappings, ref_name, EntityMapping, SchemaDocument};
pub use error::{DocumentError, PluginError, ValidationError};
pub use linter::{lint_document, Diagnostic, LintResult, Severity};
pub use loader::{is_url, load_document, load_document_auto, load_document_str, load_json};
pub use node::{CustomNode, Node, NodeArena, NodeId, ObjectNode, UnionVariant, Variant};
pub use plugin::{collect_entry_points, EntityEntryPoints, Plugin, PluginContext, PluginRegistry};
pub use relative_path::{RelativePathPlugin, RELATIVE_PATH_NODE};
pub use resolver::{CacheEntry, Reachability};
pub use types::{
    json_type_name, OutputConfig, PrimitiveType, ValidateOptions, ENTITY_SCHEMA, MAIN_BUNDLE_FILE,
    RUNTIME_BUNDLE_FILE,
};
pub use validator::{default_value, ValidationResult, Validator};

#[cfg(feature = "remote")]
pub use loader::load_document_url;
