//! Structural validation of data against compiled nodes.
//!
//! The walk is permissive: only objects, nullables, arrays, maps and the
//! two enum-like unions are checked. Every other node kind accepts any
//! value, and descent stops (passing) at `max_depth`.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::ValidationError;
use crate::node::{Node, NodeArena, NodeId, ObjectNode, Variant};
use crate::types::{PrimitiveType, ValidateOptions};

/// Outcome of a validation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    fn error(error: ValidationError) -> Self {
        Self::from_errors(vec![error])
    }
}

type CacheKey = (NodeId, String, String, usize);

type DepthObserver<'a> = Box<dyn FnMut(&str, usize) + 'a>;

/// Validates values against nodes of one arena.
///
/// Results are memoized per validator unless disabled.
pub struct Validator<'a> {
    arena: &'a NodeArena,
    cache: Option<HashMap<CacheKey, ValidationResult>>,
    on_depth_warning: Option<DepthObserver<'a>>,
}

impl<'a> Validator<'a> {
    pub fn new(arena: &'a NodeArena) -> Self {
        Self {
            arena,
            cache: Some(HashMap::new()),
            on_depth_warning: None,
        }
    }

    pub fn with_memoization(mut self, enabled: bool) -> Self {
        self.cache = enabled.then(HashMap::new);
        self
    }

    /// Called with `(path, depth)` whenever `warn_depth` or `max_depth` is reached.
    pub fn on_depth_warning(mut self, observer: impl FnMut(&str, usize) + 'a) -> Self {
        self.on_depth_warning = Some(Box::new(observer));
        self
    }

    pub fn clear_cache(&mut self) {
        if let Some(cache) = &mut self.cache {
            cache.clear();
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.as_ref().map_or(0, HashMap::len)
    }

    /// Validate `data` found at `path` against `node`.
    pub fn validate(
        &mut self,
        path: &str,
        data: &Value,
        node: NodeId,
        options: ValidateOptions,
    ) -> ValidationResult {
        self.validate_node(path, Some(data), node, options)
    }

    fn validate_node(
        &mut self,
        path: &str,
        data: Option<&Value>,
        node: NodeId,
        options: ValidateOptions,
    ) -> ValidationResult {
        let key = self.cache.as_ref().map(|_| cache_key(node, path, data, options.depth));
        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(hit) = cache.get(key) {
                return hit.clone();
            }
        }

        if options.depth >= options.max_depth {
            self.notify_depth(path, options.depth);
            return ValidationResult::ok();
        }
        if options.depth >= options.warn_depth {
            warn!(path, depth = options.depth, "validation depth warning");
            self.notify_depth(path, options.depth);
        }

        let next = options.descend();
        let arena = self.arena;
        let result = match arena.get(node) {
            Node::Object(obj) => self.validate_object(path, data, obj, next),
            Node::Nullable { inner } => match data {
                None | Some(Value::Null) => ValidationResult::ok(),
                Some(_) => self.validate_node(path, data, *inner, options),
            },
            Node::Array { items } => self.validate_array(path, data, *items, next),
            Node::Map { value_schema } => self.validate_map(path, data, *value_schema, next),
            Node::TaggedUnion {
                discriminator,
                variants,
            } => self.validate_tagged(path, data, discriminator, variants, next),
            Node::UntaggedEnum { variants } => self.validate_untagged(path, data, variants, next),
            _ => ValidationResult::ok(),
        };

        if let (Some(cache), Some(key)) = (&mut self.cache, key) {
            cache.insert(key, result.clone());
        }
        result
    }

    fn notify_depth(&mut self, path: &str, depth: usize) {
        if let Some(observer) = &mut self.on_depth_warning {
            observer(path, depth);
        }
    }

    fn validate_object(
        &mut self,
        path: &str,
        data: Option<&Value>,
        obj: &ObjectNode,
        options: ValidateOptions,
    ) -> ValidationResult {
        let Some(Value::Object(fields)) = data else {
            return ValidationResult::error(
                ValidationError::new(path, "Expected an object").with_value(data.cloned()),
            );
        };

        let mut errors = Vec::new();
        for (name, &schema) in &obj.properties {
            let result = self.validate_field(
                path,
                name,
                fields.get(name),
                schema,
                obj.is_required(name),
                options,
            );
            errors.extend(result.errors);
        }
        ValidationResult::from_errors(errors)
    }

    fn validate_field(
        &mut self,
        parent: &str,
        name: &str,
        value: Option<&Value>,
        schema: NodeId,
        required: bool,
        options: ValidateOptions,
    ) -> ValidationResult {
        let path = if parent.is_empty() {
            name.to_string()
        } else {
            format!("{parent}.{name}")
        };
        let missing = matches!(value, None | Some(Value::Null));

        if required {
            let primitive = matches!(self.arena.get(schema), Node::Primitive { .. });
            let empty_string = value.and_then(Value::as_str) == Some("");
            let empty_object = value
                .and_then(Value::as_object)
                .is_some_and(|fields| fields.is_empty());
            if missing || (primitive && empty_string) || empty_object {
                return ValidationResult::error(
                    ValidationError::new(&path, format!("Field '{name}' is required"))
                        .with_value(value.cloned()),
                );
            }
        } else if missing {
            return ValidationResult::ok();
        }

        self.validate_node(&path, value, schema, options)
    }

    fn validate_array(
        &mut self,
        path: &str,
        data: Option<&Value>,
        items: NodeId,
        options: ValidateOptions,
    ) -> ValidationResult {
        let elements = match data {
            None | Some(Value::Null) => return ValidationResult::ok(),
            Some(Value::Array(elements)) => elements,
            Some(other) => {
                return ValidationResult::error(
                    ValidationError::new(path, "Expected an array").with_value(Some(other.clone())),
                )
            }
        };

        let mut errors = Vec::new();
        for (i, element) in elements.iter().enumerate() {
            let result = self.validate_node(&format!("{path}[{i}]"), Some(element), items, options);
            errors.extend(result.errors);
        }
        ValidationResult::from_errors(errors)
    }

    fn validate_map(
        &mut self,
        path: &str,
        data: Option<&Value>,
        value_schema: NodeId,
        options: ValidateOptions,
    ) -> ValidationResult {
        let entries = match data {
            None | Some(Value::Null) => return ValidationResult::ok(),
            Some(Value::Object(entries)) => entries,
            Some(other) => {
                return ValidationResult::error(
                    ValidationError::new(path, "Expected an object").with_value(Some(other.clone())),
                )
            }
        };

        let mut errors = Vec::new();
        for (key, value) in entries {
            let result = self.validate_node(&format!("{path}.{key}"), Some(value), value_schema, options);
            errors.extend(result.errors);
        }
        ValidationResult::from_errors(errors)
    }

    fn validate_tagged(
        &mut self,
        path: &str,
        data: Option<&Value>,
        discriminator: &str,
        variants: &[Variant],
        options: ValidateOptions,
    ) -> ValidationResult {
        let Some(Value::Object(fields)) = data else {
            return ValidationResult::ok();
        };

        let tag_path = format!("{path}.{discriminator}");
        let tag = match fields.get(discriminator) {
            None | Some(Value::Null) | Some(Value::Bool(false)) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(tag) => Some(tag),
        };
        let Some(tag) = tag else {
            return ValidationResult::error(
                ValidationError::new(tag_path, format!("Missing discriminator field '{discriminator}'"))
                    .with_value(data.cloned()),
            );
        };

        let tag_text = match tag {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let Some(variant) = variants.iter().find(|v| v.tag == tag_text) else {
            return ValidationResult::error(
                ValidationError::new(
                    tag_path,
                    format!("Unknown variant '{tag_text}' for discriminator '{discriminator}'"),
                )
                .with_value(Some(tag.clone())),
            );
        };

        let arena = self.arena;
        match variant.schema {
            Some(id) => match arena.get(id) {
                Node::Object(obj) => self.validate_object(path, data, obj, options),
                _ => self.validate_node(path, data, id, options),
            },
            None => ValidationResult::ok(),
        }
    }

    fn validate_untagged(
        &mut self,
        path: &str,
        data: Option<&Value>,
        variants: &[Variant],
        options: ValidateOptions,
    ) -> ValidationResult {
        let Some(Value::Object(fields)) = data else {
            return ValidationResult::ok();
        };
        if fields.is_empty() {
            return ValidationResult::ok();
        }

        let mut entries = fields.iter();
        let (Some((key, value)), None) = (entries.next(), entries.next()) else {
            return ValidationResult::error(
                ValidationError::new(path, "Untagged enum must have exactly one variant")
                    .with_value(data.cloned()),
            );
        };

        let mut tagged = variants.iter().filter(|v| &v.tag == key).peekable();
        if tagged.peek().is_none() {
            return ValidationResult::error(
                ValidationError::new(path, format!("Unknown variant '{key}' in untagged enum"))
                    .with_value(data.cloned()),
            );
        }
        match tagged.find_map(|v| v.schema) {
            Some(schema) => self.validate_node(&format!("{path}.{key}"), Some(value), schema, options),
            None => ValidationResult::ok(),
        }
    }
}

/// Stand-in for values that must be present but have no natural default.
const FILLER: &str = "_";

/// A starting value for data described by `node`.
///
/// Objects get their required fields only, each filled with a value the
/// validator accepts as present. The default of an object therefore
/// validates against that object.
pub fn default_value(arena: &NodeArena, node: NodeId) -> Value {
    match arena.get(node) {
        Node::Primitive { primitive_type, .. } => match primitive_type {
            PrimitiveType::String => Value::String(String::new()),
            PrimitiveType::Number | PrimitiveType::Integer => Value::from(0),
            PrimitiveType::Boolean => Value::Bool(false),
        },
        Node::Enum { values } => values
            .first()
            .cloned()
            .unwrap_or_else(|| Value::String(String::new())),
        Node::Array { .. } => Value::Array(Vec::new()),
        Node::Map { .. } => Value::Object(Map::new()),
        Node::Tuple { items } => items.iter().map(|&id| default_value(arena, id)).collect(),
        Node::Object(obj) => Value::Object(required_fields(arena, obj)),
        Node::Link { .. } => Value::String(String::new()),
        _ => Value::Null,
    }
}

fn required_fields(arena: &NodeArena, obj: &ObjectNode) -> Map<String, Value> {
    obj.properties
        .iter()
        .filter(|(name, _)| obj.is_required(name))
        .map(|(name, &id)| (name.clone(), present_value(arena, id)))
        .collect()
}

/// Like [`default_value`], but never null, an empty string, or an empty object.
fn present_value(arena: &NodeArena, node: NodeId) -> Value {
    match arena.get(node) {
        Node::Primitive {
            primitive_type: PrimitiveType::String,
            ..
        } => Value::String(FILLER.to_string()),
        Node::Enum { values } => values
            .iter()
            .find(|v| !v.is_null() && v.as_str() != Some(""))
            .cloned()
            .unwrap_or_else(|| Value::String(FILLER.to_string())),
        Node::Object(obj) => {
            let mut fields = required_fields(arena, obj);
            if fields.is_empty() {
                match obj.properties.first() {
                    Some((name, &id)) => {
                        fields.insert(name.clone(), present_value(arena, id));
                    }
                    None => {
                        fields.insert(FILLER.to_string(), Value::Null);
                    }
                }
            }
            Value::Object(fields)
        }
        Node::Map { value_schema } => {
            let mut entries = Map::new();
            entries.insert(FILLER.to_string(), default_value(arena, *value_schema));
            Value::Object(entries)
        }
        Node::Nullable { inner } => present_value(arena, *inner),
        Node::TaggedUnion {
            discriminator,
            variants,
        } => match variants.first() {
            Some(Variant {
                tag,
                schema: Some(id),
            }) => {
                let mut fields = match arena.get(*id) {
                    Node::Object(obj) => required_fields(arena, obj),
                    _ => Map::new(),
                };
                fields.insert(discriminator.clone(), Value::String(tag.clone()));
                Value::Object(fields)
            }
            Some(Variant { tag, schema: None }) => Value::String(tag.clone()),
            None => Value::String(FILLER.to_string()),
        },
        Node::UntaggedEnum { variants } => match variants.first() {
            Some(Variant {
                tag,
                schema: Some(id),
            }) => {
                let mut fields = Map::new();
                fields.insert(tag.clone(), default_value(arena, *id));
                Value::Object(fields)
            }
            Some(Variant { tag, schema: None }) => Value::String(tag.clone()),
            None => Value::String(FILLER.to_string()),
        },
        Node::Union { variants, .. } => match variants.first() {
            Some(variant) => present_value(arena, variant.schema),
            None => Value::String(FILLER.to_string()),
        },
        Node::Primitive { .. }
        | Node::Array { .. }
        | Node::Tuple { .. }
        | Node::Link { .. } => default_value(arena, node),
        Node::RecursiveRef { .. } | Node::Custom(_) | Node::Unknown => {
            Value::String(FILLER.to_string())
        }
    }
}

fn cache_key(node: NodeId, path: &str, data: Option<&Value>, depth: usize) -> CacheKey {
    let data = data.map_or_else(|| "undefined".to_string(), Value::to_string);
    (node, path.to_string(), data, depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveType;
    use serde_json::json;

    fn task(arena: &mut NodeArena) -> NodeId {
        let name = arena.alloc(Node::primitive(PrimitiveType::String));
        let tags = {
            let tag = arena.alloc(Node::primitive(PrimitiveType::String));
            arena.alloc(Node::Array { items: tag })
        };
        let mut obj = ObjectNode::default();
        obj.properties.insert("name".into(), name);
        obj.properties.insert("tags".into(), tags);
        obj.required.insert("name".into());
        arena.alloc(Node::Object(obj))
    }

    #[test]
    fn required_field_missing() {
        let mut arena = NodeArena::new();
        let task = task(&mut arena);
        let mut validator = Validator::new(&arena);

        let result = validator.validate("", &json!({}), task, ValidateOptions::default());
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "name");
        assert_eq!(result.errors[0].message, "Field 'name' is required");

        let result = validator.validate("", &json!({ "name": "x" }), task, ValidateOptions::default());
        assert!(result.valid);
    }

    #[test]
    fn required_primitive_rejects_empty_string() {
        let mut arena = NodeArena::new();
        let task = task(&mut arena);
        let mut validator = Validator::new(&arena);
        let result = validator.validate("task", &json!({ "name": "" }), task, ValidateOptions::default());
        assert_eq!(result.errors[0].path, "task.name");
        assert_eq!(result.errors[0].value, Some(json!("")));
    }

    #[test]
    fn array_elements_report_indexed_paths() {
        let mut arena = NodeArena::new();
        let item = task(&mut arena);
        let list = arena.alloc(Node::Array { items: item });
        let mut validator = Validator::new(&arena);

        let result = validator.validate(
            "tasks",
            &json!([{ "name": "a" }, {}, { "name": "" }]),
            list,
            ValidateOptions::default(),
        );
        let paths: Vec<_> = result.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["tasks[1].name", "tasks[2].name"]);

        let result = validator.validate("tasks", &json!("nope"), list, ValidateOptions::default());
        assert_eq!(result.errors[0].message, "Expected an array");
        assert!(validator.validate("tasks", &Value::Null, list, ValidateOptions::default()).valid);
    }

    #[test]
    fn nullable_accepts_null() {
        let mut arena = NodeArena::new();
        let inner = task(&mut arena);
        let nullable = arena.alloc(Node::Nullable { inner });
        let mut validator = Validator::new(&arena);

        assert!(validator.validate("", &Value::Null, nullable, ValidateOptions::default()).valid);
        assert!(!validator.validate("", &json!({}), nullable, ValidateOptions::default()).valid);
    }

    #[test]
    fn map_values_are_validated() {
        let mut arena = NodeArena::new();
        let value_schema = task(&mut arena);
        let map = arena.alloc(Node::Map { value_schema });
        let mut validator = Validator::new(&arena);

        let result = validator.validate("m", &json!({ "a": { "name": "x" }, "b": {} }), map, ValidateOptions::default());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "m.b.name");

        let result = validator.validate("m", &json!(3), map, ValidateOptions::default());
        assert_eq!(result.errors[0].message, "Expected an object");
    }

    #[test]
    fn tagged_union_checks_discriminator() {
        let mut arena = NodeArena::new();
        let radius = arena.alloc(Node::primitive(PrimitiveType::Number));
        let mut circle = ObjectNode::default();
        circle.properties.insert("radius".into(), radius);
        circle.required.insert("radius".into());
        let circle = arena.alloc(Node::Object(circle));
        let shape = arena.alloc(Node::TaggedUnion {
            discriminator: "kind".into(),
            variants: vec![
                Variant { tag: "circle".into(), schema: Some(circle) },
                Variant { tag: "empty".into(), schema: None },
            ],
        });
        let mut validator = Validator::new(&arena);
        let opts = ValidateOptions::default();

        let result = validator.validate("s", &json!({ "radius": 1 }), shape, opts);
        assert_eq!(result.errors[0].path, "s.kind");
        assert_eq!(result.errors[0].message, "Missing discriminator field 'kind'");

        let result = validator.validate("s", &json!({ "kind": "" }), shape, opts);
        assert_eq!(result.errors[0].message, "Missing discriminator field 'kind'");

        let result = validator.validate("s", &json!({ "kind": "hex" }), shape, opts);
        assert_eq!(result.errors[0].message, "Unknown variant 'hex' for discriminator 'kind'");

        let result = validator.validate("s", &json!({ "kind": "circle" }), shape, opts);
        assert_eq!(result.errors[0].path, "s.radius");

        assert!(validator.validate("s", &json!({ "kind": "circle", "radius": 2 }), shape, opts).valid);
        assert!(validator.validate("s", &json!({ "kind": "empty" }), shape, opts).valid);
        assert!(validator.validate("s", &json!("circle"), shape, opts).valid);
    }

    #[test]
    fn untagged_enum_with_duplicate_tag() {
        let mut arena = NodeArena::new();
        let number = arena.alloc(Node::primitive(PrimitiveType::Number));
        let mut inner = ObjectNode::default();
        inner.properties.insert("n".into(), number);
        inner.required.insert("n".into());
        let inner = arena.alloc(Node::Object(inner));
        let node = arena.alloc(Node::UntaggedEnum {
            variants: vec![
                Variant { tag: "a".into(), schema: None },
                Variant { tag: "a".into(), schema: Some(inner) },
                Variant { tag: "b".into(), schema: None },
            ],
        });
        let mut validator = Validator::new(&arena);
        let opts = ValidateOptions::default();

        assert!(validator.validate("", &json!({}), node, opts).valid);
        assert!(validator.validate("", &json!("a"), node, opts).valid);
        assert!(validator.validate("", &json!({ "b": null }), node, opts).valid);

        let result = validator.validate("v", &json!({ "a": {} }), node, opts);
        assert_eq!(result.errors[0].path, "v.a.n");

        let result = validator.validate("v", &json!({ "c": 1 }), node, opts);
        assert_eq!(result.errors[0].message, "Unknown variant 'c' in untagged enum");

        let result = validator.validate("v", &json!({ "a": {}, "b": null }), node, opts);
        assert_eq!(result.errors[0].message, "Untagged enum must have exactly one variant");
    }

    #[test]
    fn max_depth_passes_and_notifies() {
        let mut arena = NodeArena::new();
        let inner = task(&mut arena);
        let mut warnings = Vec::new();
        {
            let mut validator = Validator::new(&arena)
                .on_depth_warning(|path: &str, depth| warnings.push((path.to_string(), depth)));
            let opts = ValidateOptions::default().warn_depth(0).max_depth(1);
            let result = validator.validate("root", &json!({ "name": 5, "tags": "bad" }), inner, opts);
            // `tags` sits at depth 1, past the cutoff.
            assert!(result.valid);
        }
        assert_eq!(warnings[0], ("root".to_string(), 0));
        assert!(warnings.contains(&("root.tags".to_string(), 1)));
    }

    #[test]
    fn memoization_can_be_disabled() {
        let mut arena = NodeArena::new();
        let task = task(&mut arena);

        let mut validator = Validator::new(&arena);
        validator.validate("", &json!({ "name": "x" }), task, ValidateOptions::default());
        assert!(validator.cache_len() > 0);
        validator.clear_cache();
        assert_eq!(validator.cache_len(), 0);

        let mut validator = Validator::new(&arena).with_memoization(false);
        validator.validate("", &json!({ "name": "x" }), task, ValidateOptions::default());
        assert_eq!(validator.cache_len(), 0);
    }

    #[test]
    fn unchecked_kinds_accept_anything() {
        let mut arena = NodeArena::new();
        let primitive = arena.alloc(Node::primitive(PrimitiveType::Integer));
        let recursive = arena.alloc(Node::RecursiveRef { ref_name: "Tree".into() });
        let mut validator = Validator::new(&arena);
        let opts = ValidateOptions::default();
        assert!(validator.validate("", &json!("not a number"), primitive, opts).valid);
        assert!(validator.validate("", &json!([1, 2]), recursive, opts).valid);
    }
}
