//! Integration tests for validating data against compiled schemas.

use serde_json::{json, Value};
use stately_schema::{
    compile, default_value, CompileOutput, NodeId, SchemaDocument, ValidateOptions,
    ValidationResult, Validator,
};

fn compiled(schemas: Value) -> CompileOutput {
    let doc = SchemaDocument::from_value(json!({ "components": { "schemas": schemas } })).unwrap();
    compile(&doc, &[])
}

fn check(output: &CompileOutput, name: &str, data: Value) -> ValidationResult {
    let node = output.get(name).unwrap();
    Validator::new(output.arena()).validate("", &data, node, ValidateOptions::default())
}

fn messages(result: &ValidationResult) -> Vec<String> {
    result.errors.iter().map(ToString::to_string).collect()
}

// === Objects ===

mod objects {
    use super::*;

    fn task() -> CompileOutput {
        compiled(json!({
            "Task": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "owner": { "$ref": "#/components/schemas/User" },
                    "tags": { "type": "array", "items": { "type": "string" } },
                    "note": { "type": "string" }
                },
                "required": ["name", "owner", "tags"]
            },
            "User": {
                "type": "object",
                "properties": { "login": { "type": "string" } },
                "required": ["login"]
            }
        }))
    }

    #[test]
    fn valid_task() {
        let result = check(
            &task(),
            "Task",
            json!({ "name": "x", "owner": { "login": "ab" }, "tags": [] }),
        );
        assert!(result.valid, "{:?}", result.errors);
    }

    #[test]
    fn missing_required_fields() {
        let result = check(&task(), "Task", json!({ "note": "n" }));
        assert_eq!(
            messages(&result),
            vec![
                "name: Field 'name' is required",
                "owner: Field 'owner' is required",
                "tags: Field 'tags' is required",
            ]
        );
    }

    #[test]
    fn empty_object_fails_required_check() {
        let result = check(&task(), "Task", json!({ "name": "x", "owner": {}, "tags": [] }));
        assert_eq!(messages(&result), vec!["owner: Field 'owner' is required"]);
    }

    #[test]
    fn nested_errors_carry_full_path() {
        let result = check(
            &task(),
            "Task",
            json!({ "name": "x", "owner": { "login": "" }, "tags": ["a"] }),
        );
        assert_eq!(messages(&result), vec!["owner.login: Field 'login' is required"]);
    }

    #[test]
    fn optional_field_may_be_null() {
        let result = check(
            &task(),
            "Task",
            json!({ "name": "x", "owner": { "login": "a" }, "tags": [], "note": null }),
        );
        assert!(result.valid);
    }

    #[test]
    fn wrong_shape_for_array() {
        let result = check(
            &task(),
            "Task",
            json!({ "name": "x", "owner": { "login": "a" }, "tags": "a,b" }),
        );
        assert_eq!(messages(&result), vec!["tags: Expected an array"]);
        assert_eq!(result.errors[0].value, Some(json!("a,b")));
    }

    #[test]
    fn non_object_data() {
        let result = check(&task(), "Task", json!([1, 2]));
        assert_eq!(messages(&result), vec![": Expected an object"]);
    }
}

// === Unions ===

mod unions {
    use super::*;

    fn shapes() -> CompileOutput {
        compiled(json!({
            "Shape": { "oneOf": [
                { "type": "object", "properties": {
                    "kind": { "type": "string", "enum": ["circle"] },
                    "radius": { "type": "number" }
                }, "required": ["kind", "radius"] },
                { "type": "object", "properties": {
                    "kind": { "type": "string", "enum": ["rect"] },
                    "width": { "type": "number" }
                }, "required": ["kind", "width"] }
            ]},
            "Source": { "oneOf": [
                { "type": "object", "properties": { "file": {
                    "type": "object",
                    "properties": { "path": { "type": "string" } },
                    "required": ["path"]
                }}},
                { "type": "object", "properties": { "url": { "type": "string" } } }
            ]},
            "MaybeShape": { "oneOf": [{ "type": "null" }, { "$ref": "#/components/schemas/Shape" }] }
        }))
    }

    #[test]
    fn tagged_union_dispatch() {
        let output = shapes();
        assert!(check(&output, "Shape", json!({ "kind": "circle", "radius": 2 })).valid);

        let result = check(&output, "Shape", json!({ "kind": "rect" }));
        assert_eq!(messages(&result), vec!["width: Field 'width' is required"]);

        let result = check(&output, "Shape", json!({ "radius": 2 }));
        assert_eq!(messages(&result), vec![".kind: Missing discriminator field 'kind'"]);

        let result = check(&output, "Shape", json!({ "kind": "hexagon" }));
        assert_eq!(
            messages(&result),
            vec![".kind: Unknown variant 'hexagon' for discriminator 'kind'"]
        );
    }

    #[test]
    fn untagged_enum_dispatch() {
        let output = shapes();
        assert!(check(&output, "Source", json!({ "file": { "path": "/a" } })).valid);
        assert!(check(&output, "Source", json!({})).valid);

        let result = check(&output, "Source", json!({ "file": {} }));
        assert_eq!(messages(&result), vec![".file.path: Field 'path' is required"]);

        let result = check(&output, "Source", json!({ "ftp": "x" }));
        assert_eq!(messages(&result), vec![": Unknown variant 'ftp' in untagged enum"]);
    }

    #[test]
    fn null_is_valid_for_nullable() {
        let output = shapes();
        assert!(check(&output, "MaybeShape", Value::Null).valid);
        assert!(!check(&output, "MaybeShape", json!({ "kind": "rect" })).valid);
    }
}

// === Maps ===

mod maps {
    use super::*;

    #[test]
    fn map_values_are_checked() {
        let output = compiled(json!({
            "Env": {
                "type": "object",
                "additionalProperties": {
                    "type": "object",
                    "properties": { "value": { "type": "string" } },
                    "required": ["value"]
                }
            }
        }));
        assert!(check(&output, "Env", json!({ "HOME": { "value": "/root" } })).valid);

        let result = check(&output, "Env", json!({ "HOME": { "value": "" } }));
        assert_eq!(messages(&result), vec![".HOME.value: Field 'value' is required"]);

        let result = check(&output, "Env", json!("HOME=/root"));
        assert_eq!(messages(&result), vec![": Expected an object"]);
    }
}

// === Depth Policy ===

mod depth {
    use super::*;

    fn tree() -> (CompileOutput, NodeId) {
        let output = compiled(json!({
            "Tree": {
                "type": "object",
                "properties": {
                    "label": { "type": "string" },
                    "children": { "type": "array", "items": { "$ref": "#/components/schemas/Tree" } }
                },
                "required": ["label"]
            }
        }));
        let node = output.get("Tree").unwrap();
        (output, node)
    }

    fn nested(levels: usize) -> Value {
        let mut value = json!({ "label": "" });
        for _ in 0..levels {
            value = json!({ "label": "n", "children": [value] });
        }
        value
    }

    #[test]
    fn shallow_errors_are_found() {
        let (output, node) = tree();
        let result =
            Validator::new(output.arena()).validate("", &nested(1), node, ValidateOptions::default());
        assert_eq!(messages(&result), vec!["children[0].label: Field 'label' is required"]);
    }

    #[test]
    fn deep_data_passes_at_max_depth() {
        let (output, node) = tree();
        // The invalid label sits below the cutoff.
        let options = ValidateOptions::default().max_depth(2);
        let result = Validator::new(output.arena()).validate("", &nested(1), node, options);
        assert!(result.valid);
    }

    #[test]
    fn observer_sees_warn_depth() {
        let (output, node) = tree();
        let mut seen = Vec::new();
        let options = ValidateOptions::default().warn_depth(2).max_depth(4);
        Validator::new(output.arena())
            .on_depth_warning(|path: &str, depth| seen.push((path.to_string(), depth)))
            .validate("", &nested(3), node, options);

        assert!(!seen.is_empty());
        assert!(seen.iter().all(|(_, depth)| *depth >= 2));
    }

    #[test]
    fn memoized_and_unmemoized_agree() {
        let (output, node) = tree();
        let data = json!({ "label": "a", "children": [{ "label": "" }, { "label": "" }] });

        let mut memoized = Validator::new(output.arena());
        let first = memoized.validate("", &data, node, ValidateOptions::default());
        let again = memoized.validate("", &data, node, ValidateOptions::default());
        let plain = Validator::new(output.arena())
            .with_memoization(false)
            .validate("", &data, node, ValidateOptions::default());

        assert_eq!(first, again);
        assert_eq!(first, plain);
        assert_eq!(first.errors.len(), 2);
    }
}

// === Defaults ===

mod defaults {
    use super::*;

    fn form() -> CompileOutput {
        compiled(json!({
            "Form": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "count": { "type": "integer" },
                    "tags": { "type": "array", "items": { "type": "string" } },
                    "env": {
                        "type": "object",
                        "additionalProperties": {
                            "type": "object",
                            "properties": { "value": { "type": "string" } },
                            "required": ["value"]
                        }
                    },
                    "owner": { "$ref": "#/components/schemas/User" },
                    "prefs": {
                        "type": "object",
                        "properties": { "theme": { "type": "string" } }
                    },
                    "shape": { "oneOf": [
                        { "type": "object", "properties": {
                            "kind": { "type": "string", "enum": ["circle"] },
                            "radius": { "type": "number" }
                        }, "required": ["kind", "radius"] },
                        { "type": "object", "properties": {
                            "kind": { "type": "string", "enum": ["rect"] }
                        }}
                    ]},
                    "alias": { "type": ["string", "null"] },
                    "note": { "type": "string" }
                },
                "required": ["name", "count", "tags", "env", "owner", "prefs", "shape", "alias"]
            },
            "User": {
                "type": "object",
                "properties": { "login": { "type": "string" } },
                "required": ["login"]
            }
        }))
    }

    #[test]
    fn defaults_validate_against_their_object() {
        let output = form();
        let node = output.get("Form").unwrap();
        let defaults = default_value(output.arena(), node);

        let result =
            Validator::new(output.arena()).validate("", &defaults, node, ValidateOptions::default());
        assert!(result.valid, "{:?} for {}", result.errors, defaults);
    }

    #[test]
    fn defaults_cover_required_fields_only() {
        let output = form();
        let defaults = default_value(output.arena(), output.get("Form").unwrap());

        assert!(defaults.get("note").is_none());
        assert_eq!(defaults["count"], json!(0));
        assert_eq!(defaults["tags"], json!([]));
        assert_eq!(defaults["owner"], json!({ "login": "_" }));
        assert_eq!(defaults["shape"]["kind"], "circle");
        assert_eq!(defaults["shape"]["radius"], json!(0));
    }

    #[test]
    fn standalone_defaults() {
        let output = compiled(json!({
            "Name": { "type": "string" },
            "Status": { "type": "string", "enum": ["open", "done"] },
            "Maybe": { "type": ["integer", "null"] }
        }));
        let arena = output.arena();
        assert_eq!(default_value(arena, output.get("Name").unwrap()), json!(""));
        assert_eq!(default_value(arena, output.get("Status").unwrap()), json!("open"));
        assert_eq!(default_value(arena, output.get("Maybe").unwrap()), Value::Null);
    }
}
