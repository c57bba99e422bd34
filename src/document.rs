//! Schema documents and entity mappings.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::DocumentError;
use crate::types::{json_type_name, ENTITY_SCHEMA};

/// Table of named raw schemas, plus the raw value it was read from.
#[derive(Debug, Clone, Default)]
pub struct SchemaDocument {
    schemas: IndexMap<String, Value>,
    raw: Value,
}

impl SchemaDocument {
    /// Build a document from a parsed JSON value.
    ///
    /// An OpenAPI document contributes `components.schemas`; any other
    /// object is taken as the schema table itself.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::InvalidDocument` if the value (or its
    /// `components.schemas`) is not an object.
    pub fn from_value(raw: Value) -> Result<Self, DocumentError> {
        let table = match raw.pointer("/components/schemas") {
            Some(schemas) => schemas,
            None => &raw,
        };
        let Some(table) = table.as_object() else {
            return Err(DocumentError::InvalidDocument {
                message: format!("expected schema table object, got {}", json_type_name(table)),
            });
        };
        let schemas = table
            .iter()
            .map(|(name, schema)| (name.clone(), schema.clone()))
            .collect();
        Ok(Self { schemas, raw })
    }

    /// Build a document from named schemas.
    pub fn from_schemas<I, K>(schemas: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let schemas: IndexMap<String, Value> =
            schemas.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let raw = Value::Object(
            schemas
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );
        Self { schemas, raw }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schemas.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Look up the raw schema a `$ref` string points at.
    pub fn resolve_ref(&self, reference: &str) -> Option<&Value> {
        self.get(ref_name(reference))
    }

    /// Schema names in document order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn schemas(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.schemas.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The full value the document was built from.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Schema name named by a `$ref`: its final `/`-separated segment.
///
/// `#/components/schemas/Task` and `#/Task` both name `Task`.
pub fn ref_name(reference: &str) -> &str {
    reference.rsplit('/').next().unwrap_or(reference)
}

/// One entity kind declared by the `Entity` schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityMapping {
    /// Discriminator value of the variant (`properties.type.enum[0]`).
    pub state_entry: String,
    /// Schema holding the entity's data (`properties.data.$ref`).
    pub schema_name: String,
}

/// Read the entity kinds from the `Entity` schema's `oneOf` variants.
///
/// Variants without a `type` enum or a `data` reference map to empty strings.
///
/// # Errors
///
/// Returns `DocumentError::MissingEntitySchema` if there is no `Entity`
/// schema or it has no `oneOf`.
pub fn parse_entity_mappings(document: &SchemaDocument) -> Result<Vec<EntityMapping>, DocumentError> {
    let variants = document
        .get(ENTITY_SCHEMA)
        .and_then(|entity| entity.get("oneOf"))
        .and_then(Value::as_array)
        .ok_or(DocumentError::MissingEntitySchema)?;

    Ok(variants
        .iter()
        .map(|variant| {
            let state_entry = variant
                .pointer("/properties/type/enum/0")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let schema_name = variant
                .pointer("/properties/data/$ref")
                .and_then(Value::as_str)
                .map(ref_name)
                .unwrap_or_default()
                .to_string();
            EntityMapping {
                state_entry,
                schema_name,
            }
        })
        .collect())
}
