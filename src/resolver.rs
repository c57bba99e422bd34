//! Reference resolution and cycle breaking.
//!
//! Every raw fragment goes through the same pipeline: plugins first, then
//! `$ref` handling, then the built-in classifier. Named references are
//! memoized per compilation in a [`ReferenceCache`]:
//!
//! | State | Effect of a `$ref` to it |
//! |-------|--------------------------|
//! | `Uninitialized` | allocate a placeholder, mark `Parsing`, parse the target into it |
//! | `Parsing` | cycle: emit `RecursiveRef`, record the target as reached via recursion |
//! | `Complete` | return the shared node id |

use std::collections::HashMap;

use indexmap::IndexSet;
use serde_json::Value;
use tracing::{debug, warn};

use crate::document::{ref_name, SchemaDocument};
use crate::node::{Node, NodeArena, NodeId};
use crate::plugin::{Plugin, PluginContext};

/// Parse state of one named schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheEntry {
    #[default]
    Uninitialized,
    Parsing {
        placeholder: NodeId,
    },
    Complete {
        node: NodeId,
    },
}

/// Per-compilation memo of named schemas.
#[derive(Debug, Default)]
pub struct ReferenceCache {
    entries: HashMap<String, CacheEntry>,
}

impl ReferenceCache {
    pub fn entry(&self, name: &str) -> CacheEntry {
        self.entries.get(name).copied().unwrap_or_default()
    }

    fn begin(&mut self, name: &str, placeholder: NodeId) {
        self.entries
            .insert(name.to_string(), CacheEntry::Parsing { placeholder });
    }

    fn complete(&mut self, name: &str, node: NodeId) {
        self.entries
            .insert(name.to_string(), CacheEntry::Complete { node });
    }

    fn reset(&mut self, name: &str) {
        self.entries.remove(name);
    }

    fn restore(&mut self, name: &str, entry: CacheEntry) {
        match entry {
            CacheEntry::Uninitialized => self.reset(name),
            entry => {
                self.entries.insert(name.to_string(), entry);
            }
        }
    }
}

/// Which schemas a compilation reached, and how.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reachability {
    /// Reached by at least one path that did not cross a detected cycle.
    pub reached_directly: IndexSet<String>,
    /// Target of a detected cycle.
    pub reached_via_recursion: IndexSet<String>,
}

/// State of one compilation run.
pub(crate) struct ParseContext<'a> {
    document: &'a SchemaDocument,
    plugins: &'a [Box<dyn Plugin>],
    arena: NodeArena,
    cache: ReferenceCache,
    reachability: Reachability,
    // Not scoped per DFS branch: once a cycle is seen, the rest of the
    // entry point's traversal counts as recursive.
    in_recursive_path: bool,
}

impl<'a> ParseContext<'a> {
    pub(crate) fn new(document: &'a SchemaDocument, plugins: &'a [Box<dyn Plugin>]) -> Self {
        Self {
            document,
            plugins,
            arena: NodeArena::new(),
            cache: ReferenceCache::default(),
            reachability: Reachability::default(),
            in_recursive_path: false,
        }
    }

    pub(crate) fn document(&self) -> &'a SchemaDocument {
        self.document
    }

    pub(crate) fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub(crate) fn arena_mut(&mut self) -> &mut NodeArena {
        &mut self.arena
    }

    pub(crate) fn reachability(&self) -> &Reachability {
        &self.reachability
    }

    #[cfg(test)]
    pub(crate) fn cache(&self) -> &ReferenceCache {
        &self.cache
    }

    pub(crate) fn into_parts(self) -> (NodeArena, Reachability) {
        (self.arena, self.reachability)
    }

    /// Start a fresh traversal from a root.
    pub(crate) fn begin_root(&mut self) {
        self.in_recursive_path = false;
    }

    pub(crate) fn mark_reached(&mut self, name: &str) {
        self.reachability.reached_directly.insert(name.to_string());
    }

    /// Forget a schema's cached node so the next visit parses it afresh.
    pub(crate) fn reset(&mut self, name: &str) {
        self.cache.reset(name);
    }

    pub(crate) fn is_parsing(&self, name: &str) -> bool {
        matches!(self.cache.entry(name), CacheEntry::Parsing { .. })
    }

    /// Run `f` with the schema named by `reference` marked `Parsing`.
    ///
    /// Used when a referenced schema's body is inlined without going
    /// through [`resolve_reference`](Self::resolve_reference). A `$ref`
    /// back to it from inside `f` becomes a `RecursiveRef`. The previous
    /// cache entry is restored afterwards.
    pub(crate) fn inlining<T>(&mut self, reference: Option<&str>, f: impl FnOnce(&mut Self) -> T) -> T {
        let Some(name) = reference.map(ref_name) else {
            return f(self);
        };
        let previous = self.cache.entry(name);
        let placeholder = self.arena.alloc(Node::Unknown);
        self.cache.begin(name, placeholder);
        if !self.in_recursive_path {
            self.mark_reached(name);
        }

        let result = f(self);
        self.cache.restore(name, previous);
        result
    }

    /// Parse a named schema from its raw definition and record it `Complete`.
    ///
    /// A schema already complete is returned without reparsing.
    pub(crate) fn parse_root(&mut self, name: &str) -> Option<NodeId> {
        if let CacheEntry::Complete { node } = self.cache.entry(name) {
            return Some(node);
        }
        let document = self.document;
        let schema = document.get(name)?;
        let parsed = self.parse_schema(schema, Some(name))?;
        self.cache.complete(name, parsed);
        Some(parsed)
    }

    /// Parse any raw fragment into the arena.
    ///
    /// Returns `None` only for JSON `null` and unresolvable references.
    pub(crate) fn parse_schema(&mut self, schema: &Value, schema_name: Option<&str>) -> Option<NodeId> {
        if schema.is_null() {
            return None;
        }

        if let Some(node) = self.run_plugins(schema, schema_name) {
            return Some(node);
        }

        if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
            return self.resolve_reference(reference, schema);
        }

        let node = self.classify(schema, schema_name).unwrap_or(Node::Unknown);
        Some(self.arena.alloc_described(node, description_of(schema)))
    }

    fn run_plugins(&mut self, schema: &Value, schema_name: Option<&str>) -> Option<NodeId> {
        let plugins = self.plugins;
        for plugin in plugins {
            let mut ctx = PluginContext::new(self, schema_name);
            match plugin.matches(schema, &ctx) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(error) => {
                    warn!(plugin = plugin.name(), %error, "plugin failed");
                    continue;
                }
            }
            match plugin.transform(schema, &mut ctx) {
                Ok(Some(node)) => {
                    return Some(self.arena.alloc_described(node, description_of(schema)));
                }
                Ok(None) => {}
                Err(error) => warn!(plugin = plugin.name(), %error, "plugin failed"),
            }
        }
        None
    }

    fn resolve_reference(&mut self, reference: &str, site: &Value) -> Option<NodeId> {
        let name = ref_name(reference);

        match self.cache.entry(name) {
            CacheEntry::Parsing { .. } => {
                debug!(reference, "circular reference detected");
                self.reachability
                    .reached_via_recursion
                    .insert(name.to_string());
                self.in_recursive_path = true;
                let node = Node::RecursiveRef {
                    ref_name: name.to_string(),
                };
                Some(self.arena.alloc_described(node, description_of(site)))
            }
            CacheEntry::Complete { node } => {
                if !self.in_recursive_path {
                    self.mark_reached(name);
                }
                Some(node)
            }
            CacheEntry::Uninitialized => {
                let document = self.document;
                let Some(target) = document.get(name) else {
                    warn!(reference, "could not resolve reference");
                    return None;
                };

                let placeholder = self.arena.alloc(Node::Unknown);
                self.cache.begin(name, placeholder);
                if !self.in_recursive_path {
                    self.mark_reached(name);
                }

                if let Some(parsed) = self.parse_schema(target, Some(name)) {
                    self.arena.fill(placeholder, parsed);
                }
                self.cache.complete(name, placeholder);
                Some(placeholder)
            }
        }
    }
}

/// The `description` keyword of a raw schema.
pub(crate) fn description_of(schema: &Value) -> Option<String> {
    schema
        .get("description")
        .and_then(Value::as_str)
        .map(String::from)
}
