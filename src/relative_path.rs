//! Plugin recognizing storage-relative path schemas.
//!
//! Two shapes are detected and compiled to a `relativePath` custom node:
//!
//! - a four-way `oneOf` of `{dir, path}` objects whose `dir` enums cover
//!   `cache`, `data`, `upload` and `config` (case-insensitive)
//! - a two-way `oneOf` of a plain string and the four-way shape above

use serde_json::Value;

use crate::error::PluginError;
use crate::node::{CustomNode, Node};
use crate::plugin::{Plugin, PluginContext};

/// `nodeType` of the emitted node.
pub const RELATIVE_PATH_NODE: &str = "relativePath";

const REQUIRED_DIRS: [&str; 4] = ["cache", "data", "upload", "config"];

#[derive(Debug, Clone, Copy, Default)]
pub struct RelativePathPlugin;

impl Plugin for RelativePathPlugin {
    fn name(&self) -> &str {
        "relative-path"
    }

    fn matches(&self, schema: &Value, _ctx: &PluginContext<'_, '_>) -> Result<bool, PluginError> {
        Ok(schema.get("oneOf").is_some())
    }

    fn transform(
        &self,
        schema: &Value,
        ctx: &mut PluginContext<'_, '_>,
    ) -> Result<Option<Node>, PluginError> {
        if is_relative_path_object(schema, ctx) || is_user_defined_path(schema, ctx) {
            return Ok(Some(Node::Custom(CustomNode::new(RELATIVE_PATH_NODE))));
        }
        Ok(None)
    }
}

/// `oneOf` variants of `schema` after dereferencing, if there are exactly `len`.
fn variants<'v, 'a: 'v>(
    schema: &'v Value,
    ctx: &PluginContext<'_, 'a>,
    len: usize,
) -> Option<Vec<&'v Value>> {
    let resolved = ctx.deref(schema)?;
    let one_of = resolved.get("oneOf")?.as_array()?;
    if one_of.len() != len {
        return None;
    }
    let variants: Vec<&Value> = one_of.iter().filter_map(|v| ctx.deref(v)).collect();
    (variants.len() == len).then_some(variants)
}

fn has_dir_path_shape(schema: &Value) -> bool {
    let Some(properties) = schema.get("properties") else {
        return false;
    };
    let dir_enum = properties
        .pointer("/dir/enum")
        .and_then(Value::as_array)
        .is_some_and(|e| !e.is_empty());
    let has_path = properties.get("path").is_some();
    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .is_some_and(|r| r.iter().any(|v| v == "dir") && r.iter().any(|v| v == "path"));
    dir_enum && has_path && required
}

fn is_relative_path_object(schema: &Value, ctx: &PluginContext<'_, '_>) -> bool {
    let Some(variants) = variants(schema, ctx, 4) else {
        return false;
    };
    if !variants.iter().all(|v| has_dir_path_shape(v)) {
        return false;
    }
    let dirs: Vec<String> = variants
        .iter()
        .filter_map(|v| v.pointer("/properties/dir/enum/0").and_then(Value::as_str))
        .map(str::to_lowercase)
        .collect();
    REQUIRED_DIRS.iter().all(|dir| dirs.iter().any(|d| d == dir))
}

fn is_user_defined_path(schema: &Value, ctx: &PluginContext<'_, '_>) -> bool {
    let Some(variants) = variants(schema, ctx, 2) else {
        return false;
    };
    let has_string = variants
        .iter()
        .any(|v| v.get("type").and_then(Value::as_str) == Some("string"));
    has_string && variants.iter().any(|v| is_relative_path_object(v, ctx))
}
