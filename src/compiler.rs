//! Bundle compilation and reachability-based splitting.
//!
//! With no declared entry points every named schema is compiled into the
//! main bundle. Otherwise only entry points become top-level keys, and
//! every schema found to be the target of a reference cycle is compiled a
//! second time, on its own, into the runtime bundle for lazy loading.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::document::SchemaDocument;
use crate::error::DocumentError;
use crate::node::{Node, NodeArena, NodeId};
use crate::plugin::{collect_entry_points, Plugin, PluginRegistry};
use crate::resolver::{ParseContext, Reachability};
use crate::types::OutputConfig;

/// A compiler with its own ordered plugin list.
#[derive(Debug, Default)]
pub struct Compiler {
    plugins: PluginRegistry,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plugin. Plugins run in the order they are added.
    pub fn with_plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.register(plugin);
        self
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn plugins_mut(&mut self) -> &mut PluginRegistry {
        &mut self.plugins
    }

    pub fn compile(&self, document: &SchemaDocument) -> CompileOutput {
        compile(document, self.plugins.as_slice())
    }
}

/// Result of one compilation.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    arena: NodeArena,
    main: IndexMap<String, NodeId>,
    runtime: IndexMap<String, NodeId>,
    reachability: Reachability,
}

impl CompileOutput {
    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    /// Eagerly loaded schemas, by name.
    pub fn main(&self) -> &IndexMap<String, NodeId> {
        &self.main
    }

    /// Lazily loaded recursion targets, by name.
    pub fn runtime(&self) -> &IndexMap<String, NodeId> {
        &self.runtime
    }

    pub fn reachability(&self) -> &Reachability {
        &self.reachability
    }

    /// Look up a top-level schema in the main bundle, then the runtime bundle.
    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.main
            .get(name)
            .or_else(|| self.runtime.get(name))
            .copied()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.arena.get(id)
    }

    pub fn main_bundle(&self) -> Value {
        self.bundle(&self.main)
    }

    pub fn runtime_bundle(&self) -> Value {
        self.bundle(&self.runtime)
    }

    fn bundle(&self, entries: &IndexMap<String, NodeId>) -> Value {
        let map: Map<String, Value> = entries
            .iter()
            .map(|(name, id)| (name.clone(), self.arena.to_value(*id)))
            .collect();
        Value::Object(map)
    }
}

/// Compile a document with an explicit plugin list.
pub fn compile(document: &SchemaDocument, plugins: &[Box<dyn Plugin>]) -> CompileOutput {
    let entry_points = collect_entry_points(document, plugins);
    let mut ctx = ParseContext::new(document, plugins);
    let mut main = IndexMap::new();
    let mut runtime = IndexMap::new();

    if entry_points.is_empty() {
        debug!(schemas = document.len(), "no entry points, compiling every schema");
        for name in document.names() {
            ctx.begin_root();
            match ctx.parse_root(name) {
                Some(id) => {
                    main.insert(name.to_string(), id);
                }
                None => warn!(schema = name, "schema failed to parse"),
            }
        }
    } else {
        for name in &entry_points {
            if !document.contains(name) {
                warn!(schema = %name, "entry point not found in document");
                continue;
            }
            debug!(schema = %name, "parsing entry point");
            ctx.begin_root();
            ctx.mark_reached(name);
            match ctx.parse_root(name) {
                Some(id) => {
                    main.insert(name.clone(), id);
                }
                None => warn!(schema = %name, "schema failed to parse"),
            }
        }

        // Names found while re-parsing are appended to the set and
        // visited in turn.
        let mut index = 0;
        while let Some(name) = ctx
            .reachability()
            .reached_via_recursion
            .get_index(index)
            .cloned()
        {
            index += 1;
            let Some(schema) = document.get(&name) else {
                continue;
            };
            debug!(schema = %name, "parsing runtime schema");
            ctx.reset(&name);
            ctx.begin_root();
            match ctx.parse_schema(schema, Some(&name)) {
                Some(id) => {
                    runtime.insert(name, id);
                }
                None => warn!(schema = %name, "schema failed to parse"),
            }
        }

        let recursive = &ctx.reachability().reached_via_recursion;
        main.retain(|name, _| !recursive.contains(name));
    }

    info!(
        main = main.len(),
        runtime = runtime.len(),
        "compiled schema bundles"
    );

    let (arena, reachability) = ctx.into_parts();
    CompileOutput {
        arena,
        main,
        runtime,
        reachability,
    }
}

/// Write the bundles as JSON files under `config.dir`.
///
/// The runtime file is written only when the runtime bundle is non-empty.
/// Returns the paths written.
pub fn write_bundles(output: &CompileOutput, config: &OutputConfig) -> Result<Vec<PathBuf>, DocumentError> {
    fs::create_dir_all(&config.dir).map_err(|source| DocumentError::WriteError {
        path: config.dir.clone(),
        source,
    })?;

    let mut written = Vec::new();
    let main_path = config.dir.join(&config.main_file);
    write_json(&main_path, &output.main_bundle(), config.pretty)?;
    written.push(main_path);

    if !output.runtime.is_empty() {
        let runtime_path = config.dir.join(&config.runtime_file);
        write_json(&runtime_path, &output.runtime_bundle(), config.pretty)?;
        written.push(runtime_path);
    }

    Ok(written)
}

fn write_json(path: &Path, value: &impl Serialize, pretty: bool) -> Result<(), DocumentError> {
    let mut content = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|source| DocumentError::Serialize { source })?;
    content.push('\n');

    debug!(path = %path.display(), bytes = content.len(), "writing bundle");
    fs::write(path, content).map_err(|source| DocumentError::WriteError {
        path: path.to_path_buf(),
        source,
    })
}
