//! Composition and union classification.
//!
//! Turns a raw, non-`$ref` schema into a node. Rules are tried in a fixed
//! order and the first that applies wins:
//!
//! 1. `type: [T, "null"]` - nullable via type array
//! 2. `oneOf: [T, {type: null}]` - nullable via oneOf
//! 3. `allOf` - merged object
//! 4. `oneOf`/`anyOf` - link, untagged enum, tagged union, or generic union
//! 5. structural shapes - tuple, array, map, object, enum, primitive
//!
//! The union rules are shape heuristics, not a sound discriminator.

use indexmap::IndexSet;
use serde_json::{Map, Value};

use crate::document::{ref_name, SchemaDocument};
use crate::node::{Node, NodeId, ObjectNode, UnionVariant, Variant};
use crate::resolver::{description_of, ParseContext};
use crate::types::PrimitiveType;

impl ParseContext<'_> {
    /// Classify a raw schema. `None` means no rule applies.
    pub(crate) fn classify(&mut self, schema: &Value, name: Option<&str>) -> Option<Node> {
        let map = schema.as_object()?;

        if let Some(node) = self.nullable_type_array(map, name) {
            return Some(node);
        }
        if let Some(node) = self.nullable_one_of(map, name) {
            return Some(node);
        }
        if let Some(node) = self.merge_all_of(map, name) {
            return Some(node);
        }
        for keyword in ["oneOf", "anyOf"] {
            let Some(variants) = map.get(keyword).and_then(Value::as_array) else {
                continue;
            };
            if variants.is_empty() {
                continue;
            }
            if let Some(node) = self.classify_union(variants, name) {
                return Some(node);
            }
        }
        self.classify_structural(map, name)
    }

    fn nullable_type_array(&mut self, map: &Map<String, Value>, name: Option<&str>) -> Option<Node> {
        let types = map.get("type")?.as_array()?;
        if !types.iter().any(|t| t == "null") {
            return None;
        }
        let others: Vec<&Value> = types.iter().filter(|t| *t != "null").collect();
        let [other] = others.as_slice() else {
            return None;
        };

        let mut inner = map.clone();
        inner.insert("type".to_string(), (*other).clone());
        let inner = self.parse_schema(&Value::Object(inner), name)?;
        Some(Node::Nullable { inner })
    }

    fn nullable_one_of(&mut self, map: &Map<String, Value>, name: Option<&str>) -> Option<Node> {
        let variants = map.get("oneOf")?.as_array()?;
        let (nulls, others): (Vec<&Value>, Vec<&Value>) =
            variants.iter().partition(|v| is_null_schema(v));
        if nulls.is_empty() {
            return None;
        }
        let [other] = others.as_slice() else {
            return None;
        };
        let inner = self.parse_schema(other, name)?;
        Some(Node::Nullable { inner })
    }

    fn merge_all_of(&mut self, map: &Map<String, Value>, name: Option<&str>) -> Option<Node> {
        let parts = map.get("allOf")?.as_array()?;
        let mut merged = ObjectNode::default();

        for part in parts {
            let Some(id) = self.parse_schema(part, name) else {
                continue;
            };
            match self.arena().get(id) {
                Node::Object(obj) => {
                    let obj = obj.clone();
                    merged.properties.extend(obj.properties);
                    merged.required.extend(obj.required);
                    if obj.additional_properties.is_some() {
                        merged.additional_properties = obj.additional_properties;
                    }
                    merged.merged.extend(obj.merged);
                }
                Node::Unknown => {}
                _ => merged.merged.push(id),
            }
        }

        if merged.properties.is_empty()
            && merged.merged.is_empty()
            && merged.additional_properties.is_none()
        {
            return None;
        }
        Some(Node::Object(merged))
    }

    fn classify_union(&mut self, variants: &[Value], name: Option<&str>) -> Option<Node> {
        // A variant naming a schema still being parsed cannot be inlined.
        let closes_cycle = variants
            .iter()
            .filter_map(variant_ref)
            .any(|reference| self.is_parsing(ref_name(reference)));

        let document = self.document();
        let resolved: Vec<Option<&Value>> = variants
            .iter()
            .map(|v| resolve_variant(document, v))
            .collect();
        let objects: Vec<Option<&Map<String, Value>>> = resolved
            .iter()
            .flatten()
            .filter(|v| is_object_schema(v))
            .map(|v| properties_of(v))
            .collect();

        if !closes_cycle {
            if let Some(node) = self.classify_shaped(variants, &resolved, &objects, name) {
                return Some(node);
            }
        }
        self.build_union(variants, &resolved, &objects, name)
    }

    fn classify_shaped(
        &mut self,
        variants: &[Value],
        resolved: &[Option<&Value>],
        objects: &[Option<&Map<String, Value>>],
        name: Option<&str>,
    ) -> Option<Node> {
        if let Some(node) = self.detect_link(variants, resolved, name) {
            return Some(node);
        }

        let untagged = !objects.is_empty()
            && objects
                .iter()
                .all(|props| matches!(props, Some(p) if p.len() == 1));
        if untagged {
            return self.build_untagged(variants, resolved, name);
        }
        let discriminator = find_discriminator(objects)?;
        self.build_tagged(variants, resolved, discriminator, name)
    }

    /// `{entity_type, ref} | {entity_type, inline}`
    fn detect_link(
        &mut self,
        variants: &[Value],
        resolved: &[Option<&Value>],
        name: Option<&str>,
    ) -> Option<Node> {
        if variants.len() != 2 {
            return None;
        }
        let resolved = resolved.iter().copied().collect::<Option<Vec<_>>>()?;

        let has_entity_type = resolved.iter().all(|v| {
            v.pointer("/properties/entity_type/enum")
                .and_then(Value::as_array)
                .is_some()
        });
        if !has_entity_type {
            return None;
        }

        let ref_index = resolved
            .iter()
            .position(|v| v.pointer("/properties/ref").is_some())?;
        let inline_index = resolved
            .iter()
            .position(|v| v.pointer("/properties/inline").is_some())?;
        if ref_index == inline_index {
            return None;
        }

        let inline_variant = resolved[inline_index];
        let target_type = inline_variant
            .pointer("/properties/entity_type/enum/0")
            .map(tag_of)?;
        let inline = inline_variant.pointer("/properties/inline")?;
        let inline_schema = self.inlining(variant_ref(&variants[inline_index]), |ctx| {
            ctx.parse_schema(inline, name)
        })?;
        if !matches!(self.arena().get(inline_schema), Node::Object(_)) {
            return None;
        }

        Some(Node::Link {
            target_type,
            inline_schema,
        })
    }

    fn build_untagged(
        &mut self,
        variants: &[Value],
        resolved: &[Option<&Value>],
        name: Option<&str>,
    ) -> Option<Node> {
        let mut built = Vec::new();
        for (raw, target) in variants.iter().zip(resolved) {
            let Some(variant) = *target else {
                continue;
            };
            if is_null_schema(variant) {
                continue;
            }
            if let Some(tag) = unit_tag(variant) {
                built.push(Variant { tag, schema: None });
                continue;
            }
            if !is_object_schema(variant) {
                continue;
            }
            let Some((tag, inner)) = properties_of(variant).and_then(|props| props.iter().next())
            else {
                continue;
            };
            let parsed = self.inlining(variant_ref(raw), |ctx| ctx.parse_schema(inner, name));
            let schema = match parsed {
                Some(id) => id,
                None => self.arena_mut().alloc(Node::Object(ObjectNode::default())),
            };
            built.push(Variant {
                tag: tag.clone(),
                schema: Some(schema),
            });
        }

        if built.is_empty() {
            return None;
        }
        Some(Node::UntaggedEnum { variants: built })
    }

    fn build_tagged(
        &mut self,
        variants: &[Value],
        resolved: &[Option<&Value>],
        discriminator: &str,
        name: Option<&str>,
    ) -> Option<Node> {
        let mut built = Vec::new();
        for (raw, target) in variants.iter().zip(resolved) {
            let Some(variant) = *target else {
                continue;
            };
            if is_null_schema(variant) {
                continue;
            }
            if let Some(tag) = unit_tag(variant) {
                built.push(Variant { tag, schema: None });
                continue;
            }
            if !is_object_schema(variant) {
                continue;
            }
            let Some(properties) = properties_of(variant) else {
                continue;
            };
            let Some(tag) = properties
                .get(discriminator)
                .and_then(|d| d.pointer("/enum/0"))
                .map(tag_of)
            else {
                continue;
            };

            let mut obj = self.inlining(variant_ref(raw), |ctx| {
                let mut obj = ObjectNode::default();
                for (prop, prop_schema) in properties {
                    if prop == discriminator {
                        continue;
                    }
                    if let Some(id) = ctx.parse_schema(prop_schema, name) {
                        obj.properties.insert(prop.clone(), id);
                    }
                }
                obj
            });
            obj.required = required_of(variant)
                .into_iter()
                .filter(|r| r != discriminator)
                .collect();
            let schema = self
                .arena_mut()
                .alloc_described(Node::Object(obj), description_of(variant));
            built.push(Variant {
                tag,
                schema: Some(schema),
            });
        }

        if built.is_empty() {
            return None;
        }
        Some(Node::TaggedUnion {
            discriminator: discriminator.to_string(),
            variants: built,
        })
    }

    fn build_union(
        &mut self,
        variants: &[Value],
        resolved: &[Option<&Value>],
        objects: &[Option<&Map<String, Value>>],
        name: Option<&str>,
    ) -> Option<Node> {
        let mut union = Vec::new();
        for (raw, target) in variants.iter().zip(resolved) {
            if target.map_or(false, |t| is_null_schema(t)) {
                continue;
            }
            let Some(schema) = self.parse_schema(raw, name) else {
                continue;
            };
            let label = description_of(raw).or_else(|| target.and_then(description_of));
            union.push(UnionVariant { schema, label });
        }

        if union.is_empty() {
            return None;
        }
        let keys: IndexSet<&String> = objects.iter().flatten().flat_map(|props| props.keys()).collect();
        Some(Node::Union {
            variants: union,
            keys: keys.into_iter().cloned().collect(),
        })
    }

    fn classify_structural(&mut self, map: &Map<String, Value>, name: Option<&str>) -> Option<Node> {
        let ty = map.get("type").and_then(Value::as_str);

        if ty == Some("array") {
            return Some(self.parse_array(map, name));
        }

        let has_properties = map.get("properties").and_then(Value::as_object).is_some();
        let additional = map.get("additionalProperties");
        let object_like = match ty {
            Some("object") => true,
            None => has_properties || additional.map_or(false, |a| !a.is_boolean()),
            _ => false,
        };
        if object_like {
            return self.parse_object(map, additional, has_properties, name);
        }

        if let Some(values) = map.get("enum").and_then(Value::as_array) {
            if !values.is_empty() && ty.map_or(true, |t| PrimitiveType::parse(t).is_some()) {
                return Some(Node::Enum {
                    values: values.clone(),
                });
            }
        }

        let primitive_type = ty.and_then(PrimitiveType::parse)?;
        Some(Node::Primitive {
            primitive_type,
            format: map.get("format").and_then(Value::as_str).map(String::from),
        })
    }

    fn parse_array(&mut self, map: &Map<String, Value>, name: Option<&str>) -> Node {
        if let Some(prefix) = map.get("prefixItems").and_then(Value::as_array) {
            let items: Vec<NodeId> = prefix
                .iter()
                .filter_map(|item| self.parse_schema(item, name))
                .collect();
            if items.len() == prefix.len() {
                return Node::Tuple { items };
            }
        }

        let items = match map.get("items").and_then(|i| self.parse_schema(i, name)) {
            Some(id) => id,
            None => self.arena_mut().alloc(Node::Unknown),
        };
        Node::Array { items }
    }

    fn parse_object(
        &mut self,
        map: &Map<String, Value>,
        additional: Option<&Value>,
        has_properties: bool,
        name: Option<&str>,
    ) -> Option<Node> {
        let open_map = additional.map_or(false, |a| a.is_object() || a == &Value::Bool(true));
        if open_map && !has_properties {
            let value_schema = self.parse_schema(additional?, name)?;
            return Some(Node::Map { value_schema });
        }

        let mut obj = ObjectNode::default();
        if let Some(properties) = map.get("properties").and_then(Value::as_object) {
            for (prop, prop_schema) in properties {
                if let Some(id) = self.parse_schema(prop_schema, name) {
                    obj.properties.insert(prop.clone(), id);
                }
            }
        }
        obj.required = required_of_map(map).into_iter().collect();
        if let Some(additional) = additional.filter(|a| a.is_object()) {
            obj.additional_properties = self.parse_schema(additional, name);
        }
        Some(Node::Object(obj))
    }
}

fn variant_ref(variant: &Value) -> Option<&str> {
    variant.get("$ref").and_then(Value::as_str)
}

fn resolve_variant<'v>(document: &'v SchemaDocument, variant: &'v Value) -> Option<&'v Value> {
    match variant_ref(variant) {
        Some(reference) => document.resolve_ref(reference),
        None => Some(variant),
    }
}

fn is_null_schema(schema: &Value) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("null")
}

fn is_object_schema(schema: &Value) -> bool {
    match schema.get("type").and_then(Value::as_str) {
        Some("object") => true,
        Some(_) => false,
        None => schema.get("properties").is_some_and(Value::is_object),
    }
}

fn properties_of(schema: &Value) -> Option<&Map<String, Value>> {
    schema.get("properties").and_then(Value::as_object)
}

fn required_of(schema: &Value) -> Vec<String> {
    schema.as_object().map(required_of_map).unwrap_or_default()
}

fn required_of_map(map: &Map<String, Value>) -> Vec<String> {
    map.get("required")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// A string enum variant (`{type: string, enum: [tag, ...]}`) yields its tag.
fn unit_tag(schema: &Value) -> Option<String> {
    if schema.get("type").and_then(Value::as_str) != Some("string") {
        return None;
    }
    schema.pointer("/enum/0").map(tag_of)
}

fn tag_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// First property of the first object variant that is a non-empty enum in
/// every object variant.
fn find_discriminator<'m>(objects: &[Option<&'m Map<String, Value>>]) -> Option<&'m str> {
    let first = (*objects.first()?)?;
    first
        .keys()
        .find(|field| {
            objects.iter().all(|&props| {
                props
                    .and_then(|p| p.get(field.as_str()))
                    .and_then(|f| f.get("enum"))
                    .and_then(Value::as_array)
                    .is_some_and(|e| !e.is_empty())
            })
        })
        .map(String::as_str)
}
