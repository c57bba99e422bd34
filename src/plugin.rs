//! Transform plugins.
//!
//! Plugins are consulted, in registration order, before the built-in
//! classifier runs on any raw schema fragment. The first plugin that
//! returns a node wins; its node is used as-is. A plugin that errors is
//! logged and treated as declining.
//!
//! Plugins can also declare entry points, which switches compilation into
//! bundle-splitting mode (see [`crate::compile`]).

use indexmap::IndexSet;
use serde_json::Value;

use crate::document::{parse_entity_mappings, SchemaDocument};
use crate::error::PluginError;
use crate::node::{Node, NodeId};
use crate::resolver::ParseContext;

/// A schema-to-node transform.
pub trait Plugin {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Schema names this plugin wants compiled as entry points.
    fn entry_points(&self, _document: &SchemaDocument) -> Vec<String> {
        Vec::new()
    }

    /// Whether `transform` should be called for this schema.
    fn matches(&self, _schema: &Value, _ctx: &PluginContext<'_, '_>) -> Result<bool, PluginError> {
        Ok(true)
    }

    /// Produce a node for `schema`, or `None` to pass to the next plugin.
    fn transform(
        &self,
        schema: &Value,
        ctx: &mut PluginContext<'_, '_>,
    ) -> Result<Option<Node>, PluginError>;
}

/// View of the running compilation handed to plugins.
pub struct PluginContext<'c, 'a> {
    inner: &'c mut ParseContext<'a>,
    schema_name: Option<&'c str>,
}

impl<'c, 'a> PluginContext<'c, 'a> {
    pub(crate) fn new(inner: &'c mut ParseContext<'a>, schema_name: Option<&'c str>) -> Self {
        Self { inner, schema_name }
    }

    /// Name of the schema being parsed, if known.
    pub fn schema_name(&self) -> Option<&str> {
        self.schema_name
    }

    pub fn document(&self) -> &'a SchemaDocument {
        self.inner.document()
    }

    /// Raw schema a `$ref` string points at.
    pub fn resolve_ref(&self, reference: &str) -> Option<&'a Value> {
        self.inner.document().resolve_ref(reference)
    }

    /// The schema itself, or its target when it is a `$ref`.
    pub fn deref<'v>(&self, schema: &'v Value) -> Option<&'v Value>
    where
        'a: 'v,
    {
        match schema.get("$ref").and_then(Value::as_str) {
            Some(reference) => self.resolve_ref(reference),
            None => Some(schema),
        }
    }

    /// Run the full pipeline on a nested schema.
    pub fn parse_schema(&mut self, schema: &Value, schema_name: Option<&str>) -> Option<NodeId> {
        self.inner.parse_schema(schema, schema_name)
    }

    /// Store a node built by the plugin and return its id.
    pub fn alloc(&mut self, node: Node) -> NodeId {
        self.inner.arena_mut().alloc(node)
    }

    /// Read a node produced earlier in this compilation.
    pub fn node(&self, id: NodeId) -> &Node {
        self.inner.arena().get(id)
    }
}

/// Ordered list of plugins for one compiler.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: impl Plugin + 'static) {
        self.plugins.push(Box::new(plugin));
    }

    /// Replace the installed plugins.
    pub fn replace(&mut self, plugins: Vec<Box<dyn Plugin>>) {
        self.plugins = plugins;
    }

    pub fn clear(&mut self) {
        self.plugins.clear();
    }

    pub fn as_slice(&self) -> &[Box<dyn Plugin>] {
        &self.plugins
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.iter().map(|p| p.name())
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Union of every plugin's entry points, in plugin order, deduplicated.
pub fn collect_entry_points(document: &SchemaDocument, plugins: &[Box<dyn Plugin>]) -> IndexSet<String> {
    let mut entry_points = IndexSet::new();
    for plugin in plugins {
        let declared = plugin.entry_points(document);
        if !declared.is_empty() {
            tracing::debug!(
                plugin = plugin.name(),
                count = declared.len(),
                "plugin declared entry points"
            );
            entry_points.extend(declared);
        }
    }
    entry_points
}

/// Declares each entity's data schema as an entry point.
///
/// Never transforms schemas.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityEntryPoints;

impl Plugin for EntityEntryPoints {
    fn name(&self) -> &str {
        "entity-entry-points"
    }

    fn entry_points(&self, document: &SchemaDocument) -> Vec<String> {
        let Ok(mappings) = parse_entity_mappings(document) else {
            return Vec::new();
        };
        let names: IndexSet<String> = mappings
            .into_iter()
            .map(|m| m.schema_name)
            .filter(|name| !name.is_empty())
            .collect();
        names.into_iter().collect()
    }

    fn matches(&self, _schema: &Value, _ctx: &PluginContext<'_, '_>) -> Result<bool, PluginError> {
        Ok(false)
    }

    fn transform(
        &self,
        _schema: &Value,
        _ctx: &mut PluginContext<'_, '_>,
    ) -> Result<Option<Node>, PluginError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed(&'static str, Vec<&'static str>);

    impl Plugin for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn entry_points(&self, _document: &SchemaDocument) -> Vec<String> {
            self.1.iter().map(|s| s.to_string()).collect()
        }

        fn transform(
            &self,
            _schema: &Value,
            _ctx: &mut PluginContext<'_, '_>,
        ) -> Result<Option<Node>, PluginError> {
            Ok(None)
        }
    }

    #[test]
    fn registry_keeps_order() {
        let mut registry = PluginRegistry::new();
        registry.register(Fixed("a", vec![]));
        registry.register(Fixed("b", vec![]));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["a", "b"]);

        registry.replace(vec![Box::new(Fixed("c", vec![]))]);
        assert_eq!(registry.len(), 1);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn entry_points_are_unioned_in_order() {
        let doc = SchemaDocument::default();
        let plugins: Vec<Box<dyn Plugin>> = vec![
            Box::new(Fixed("a", vec!["Task", "Pipeline"])),
            Box::new(Fixed("b", vec!["Pipeline", "Source"])),
        ];
        let entry_points = collect_entry_points(&doc, &plugins);
        assert_eq!(
            entry_points.into_iter().collect::<Vec<_>>(),
            vec!["Task", "Pipeline", "Source"]
        );
    }

    #[test]
    fn entity_entry_points_from_entity_schema() {
        let doc = SchemaDocument::from_schemas([
            (
                "Entity",
                json!({ "oneOf": [
                    { "properties": { "type": { "enum": ["task"] }, "data": { "$ref": "#/Task" } } },
                    { "properties": { "type": { "enum": ["other_task"] }, "data": { "$ref": "#/Task" } } },
                    { "properties": { "type": { "enum": ["unit"] } } }
                ]}),
            ),
            ("Task", json!({ "type": "object" })),
        ]);
        assert_eq!(EntityEntryPoints.entry_points(&doc), vec!["Task"]);
    }

    #[test]
    fn entity_entry_points_without_entity_schema() {
        let doc = SchemaDocument::from_schemas([("Task", json!({ "type": "object" }))]);
        assert!(EntityEntryPoints.entry_points(&doc).is_empty());
    }
}
