//! Node IR - the typed tree compiled from raw schemas.
//!
//! Nodes live in a [`NodeArena`] and refer to their children by [`NodeId`].
//! Cycles never appear as arena edges: a back-edge is always a
//! [`Node::RecursiveRef`] leaf naming its target schema. A node that is
//! referenced from several places is shared by id, so every referencing
//! site observes the same slot.

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};

use crate::types::PrimitiveType;

/// Index of a node inside its [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A compiled schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Primitive {
        primitive_type: PrimitiveType,
        format: Option<String>,
    },
    Enum {
        values: Vec<Value>,
    },
    Object(ObjectNode),
    Array {
        items: NodeId,
    },
    Map {
        value_schema: NodeId,
    },
    Tuple {
        items: Vec<NodeId>,
    },
    TaggedUnion {
        discriminator: String,
        variants: Vec<Variant>,
    },
    UntaggedEnum {
        variants: Vec<Variant>,
    },
    /// Fallback for `oneOf`/`anyOf` shapes no heuristic recognizes.
    Union {
        variants: Vec<UnionVariant>,
        /// Every property name seen across object variants.
        keys: Vec<String>,
    },
    /// Reference-by-id or inline value of an entity.
    Link {
        target_type: String,
        inline_schema: NodeId,
    },
    Nullable {
        inner: NodeId,
    },
    RecursiveRef {
        ref_name: String,
    },
    /// Node kind introduced by a plugin.
    Custom(CustomNode),
    Unknown,
}

impl Node {
    /// Wire name of this node's kind (the `nodeType` discriminator).
    pub fn kind(&self) -> &str {
        match self {
            Node::Primitive { .. } => "primitive",
            Node::Enum { .. } => "enum",
            Node::Object(_) => "object",
            Node::Array { .. } => "array",
            Node::Map { .. } => "map",
            Node::Tuple { .. } => "tuple",
            Node::TaggedUnion { .. } => "taggedUnion",
            Node::UntaggedEnum { .. } => "untaggedEnum",
            Node::Union { .. } => "union",
            Node::Link { .. } => "link",
            Node::Nullable { .. } => "nullable",
            Node::RecursiveRef { .. } => "recursiveRef",
            Node::Custom(custom) => &custom.node_type,
            Node::Unknown => "unknown",
        }
    }

    pub fn as_object(&self) -> Option<&ObjectNode> {
        match self {
            Node::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn primitive(primitive_type: PrimitiveType) -> Self {
        Node::Primitive {
            primitive_type,
            format: None,
        }
    }
}

/// Struct with named, ordered properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectNode {
    pub properties: IndexMap<String, NodeId>,
    pub required: IndexSet<String>,
    pub additional_properties: Option<NodeId>,
    /// Non-object members of an `allOf` (unions, primitives).
    pub merged: Vec<NodeId>,
}

impl ObjectNode {
    pub fn is_required(&self, name: &str) -> bool {
        self.required.contains(name)
    }
}

/// One arm of a `TaggedUnion` or `UntaggedEnum`.
///
/// `schema` is `None` for unit variants (string enums).
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub tag: String,
    pub schema: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionVariant {
    pub schema: NodeId,
    pub label: Option<String>,
}

/// Plugin-defined node. `attributes` are emitted next to `nodeType`.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomNode {
    pub node_type: String,
    pub attributes: Map<String, Value>,
}

impl CustomNode {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            attributes: Map::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    node: Node,
    description: Option<String>,
}

/// Owner of every node produced by one compilation.
#[derive(Debug, Clone, Default)]
pub struct NodeArena {
    slots: Vec<Slot>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: Node) -> NodeId {
        self.alloc_described(node, None)
    }

    pub fn alloc_described(&mut self, node: Node, description: Option<String>) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(Slot { node, description });
        id
    }

    /// Panics if `id` was not allocated by this arena.
    pub fn get(&self, id: NodeId) -> &Node {
        &self.slots[id.0].node
    }

    pub fn description(&self, id: NodeId) -> Option<&str> {
        self.slots[id.0].description.as_deref()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Every node in allocation order, including orphaned scratch nodes.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (NodeId(i), &slot.node))
    }

    /// Copy the contents of `from` into the slot `into`.
    ///
    /// Used to fill a placeholder once the schema it stands for is parsed.
    /// A description already on the placeholder wins over the source's.
    pub(crate) fn fill(&mut self, into: NodeId, from: NodeId) {
        if into == from {
            return;
        }
        let source = self.slots[from.0].clone();
        let slot = &mut self.slots[into.0];
        slot.node = source.node;
        if slot.description.is_none() {
            slot.description = source.description;
        }
    }

    /// Serialize a node with every child inlined.
    ///
    /// Terminates because back-edges are `RecursiveRef` leaves.
    pub fn to_value(&self, id: NodeId) -> Value {
        let slot = &self.slots[id.0];
        let mut out = Map::new();
        out.insert("nodeType".into(), Value::String(slot.node.kind().to_string()));

        match &slot.node {
            Node::Primitive {
                primitive_type,
                format,
            } => {
                out.insert("primitiveType".into(), primitive_type.as_str().into());
                if let Some(format) = format {
                    out.insert("format".into(), format.clone().into());
                }
            }
            Node::Enum { values } => {
                out.insert("values".into(), Value::Array(values.clone()));
            }
            Node::Object(obj) => self.object_fields(obj, &mut out),
            Node::Array { items } => {
                out.insert("items".into(), self.to_value(*items));
            }
            Node::Map { value_schema } => {
                out.insert("valueSchema".into(), self.to_value(*value_schema));
            }
            Node::Tuple { items } => {
                out.insert("items".into(), self.to_values(items));
            }
            Node::TaggedUnion {
                discriminator,
                variants,
            } => {
                out.insert("discriminator".into(), discriminator.clone().into());
                out.insert("variants".into(), self.variants_value(variants));
            }
            Node::UntaggedEnum { variants } => {
                out.insert("variants".into(), self.variants_value(variants));
            }
            Node::Union { variants, keys } => {
                let variants = variants
                    .iter()
                    .map(|variant| {
                        let mut entry = Map::new();
                        entry.insert("schema".into(), self.to_value(variant.schema));
                        if let Some(label) = &variant.label {
                            entry.insert("label".into(), label.clone().into());
                        }
                        Value::Object(entry)
                    })
                    .collect();
                out.insert("variants".into(), Value::Array(variants));
                if !keys.is_empty() {
                    out.insert(
                        "keys".into(),
                        keys.iter().cloned().map(Value::String).collect(),
                    );
                }
            }
            Node::Link {
                target_type,
                inline_schema,
            } => {
                out.insert("targetType".into(), target_type.clone().into());
                out.insert("inlineSchema".into(), self.to_value(*inline_schema));
            }
            Node::Nullable { inner } => {
                out.insert("innerSchema".into(), self.to_value(*inner));
            }
            Node::RecursiveRef { ref_name } => {
                out.insert("refName".into(), ref_name.clone().into());
            }
            Node::Custom(custom) => {
                for (key, value) in &custom.attributes {
                    if key != "nodeType" && key != "description" {
                        out.insert(key.clone(), value.clone());
                    }
                }
            }
            Node::Unknown => {}
        }

        if let Some(description) = &slot.description {
            out.insert("description".into(), description.clone().into());
        }
        Value::Object(out)
    }

    fn to_values(&self, ids: &[NodeId]) -> Value {
        Value::Array(ids.iter().map(|id| self.to_value(*id)).collect())
    }

    fn object_fields(&self, obj: &ObjectNode, out: &mut Map<String, Value>) {
        let properties = obj
            .properties
            .iter()
            .map(|(name, id)| (name.clone(), self.to_value(*id)))
            .collect();
        out.insert("properties".into(), Value::Object(properties));
        out.insert(
            "required".into(),
            obj.required.iter().cloned().map(Value::String).collect(),
        );
        if let Some(additional) = obj.additional_properties {
            out.insert("additionalProperties".into(), self.to_value(additional));
        }
        if !obj.merged.is_empty() {
            out.insert("merged".into(), self.to_values(&obj.merged));
        }
    }

    fn variants_value(&self, variants: &[Variant]) -> Value {
        variants
            .iter()
            .map(|variant| {
                let mut entry = Map::new();
                entry.insert("tag".into(), variant.tag.clone().into());
                entry.insert(
                    "schema".into(),
                    variant
                        .schema
                        .map(|id| self.to_value(id))
                        .unwrap_or(Value::Null),
                );
                Value::Object(entry)
            })
            .collect()
    }
}
