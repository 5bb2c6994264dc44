//! Module/package dependency graph and its query interpreter.
//!
//! A [`DepGraph`] layers two node kinds on a [`HierarchicalDigraph`]:
//! modules at depth 0 and the packages they contain at depth 1. Import
//! edges between packages roll up into weighted module edges.
//!
//! # Example
//!
//! ```rust
//! use depscope::depgraph::{DepGraph, Level};
//! use depscope::parser::{ModuleInfo, PackageInfo};
//!
//! let mut main = ModuleInfo::new("example.com/app", "");
//! main.main = true;
//! let mut graph = DepGraph::new(main);
//! graph.add_module(ModuleInfo::new("example.com/lib", "v1.0.0")).unwrap();
//!
//! graph.add_package(PackageInfo::new("example.com/app", "example.com/app")).unwrap();
//! graph.add_package(PackageInfo::new("example.com/lib", "example.com/lib")).unwrap();
//! graph.add_import("example.com/app", "example.com/lib").unwrap();
//!
//! let deps = graph.successors(Level::Modules, "example.com/app").unwrap();
//! assert_eq!(deps.names(), vec!["example.com/lib"]);
//! ```

mod build;
mod filters;
mod module;
mod package;
mod query;

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::graph::{GraphError, HierarchicalDigraph, Node, NodeRefs};
use crate::parser::{ModuleInfo, PackageInfo};

pub use filters::{ArbitraryModules, Filter, NonSharedModules, QueryFilter, Target, TargetModules};
pub use module::{module_hash, Module, VersionConstraint};
pub use package::{package_hash, Package};
pub use query::{NodeSet, QueryError, QueryErrorKind};

/// Errors raised by dependency graph operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Parse(#[from] crate::query::ParseError),
}

/// Result type alias for dependency graph operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Granularity at which queries and filters operate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Level {
    #[default]
    Modules,
    Packages,
}

impl Level {
    /// Depth of this level in the hierarchical graph.
    pub fn depth(self) -> usize {
        match self {
            Level::Modules => 0,
            Level::Packages => 1,
        }
    }

    /// Hash of the node with the given name at this level.
    pub fn hash(self, name: &str) -> String {
        match self {
            Level::Modules => module_hash(name),
            Level::Packages => package_hash(name),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Modules => write!(f, "modules"),
            Level::Packages => write!(f, "packages"),
        }
    }
}

/// A node of the dependency graph.
#[derive(Debug, Clone, PartialEq)]
pub enum DepNode {
    Module(Module),
    Package(Package),
}

impl DepNode {
    pub fn as_module(&self) -> Option<&Module> {
        match self {
            DepNode::Module(m) => Some(m),
            DepNode::Package(_) => None,
        }
    }

    pub fn as_package(&self) -> Option<&Package> {
        match self {
            DepNode::Package(p) => Some(p),
            DepNode::Module(_) => None,
        }
    }

    pub fn is_test_only(&self) -> bool {
        match self {
            DepNode::Module(m) => m.is_test_only(),
            DepNode::Package(p) => p.is_test_only(),
        }
    }

    pub(crate) fn set_test_only(&mut self, test_only: bool) {
        match self {
            DepNode::Module(m) => m.test_only = test_only,
            DepNode::Package(p) => p.test_only = test_only,
        }
    }
}

impl Node for DepNode {
    fn name(&self) -> &str {
        match self {
            DepNode::Module(m) => m.path(),
            DepNode::Package(p) => p.import_path(),
        }
    }

    fn hash(&self) -> String {
        match self {
            DepNode::Module(m) => m.hash(),
            DepNode::Package(p) => p.hash(),
        }
    }

    fn parent_hash(&self) -> Option<String> {
        match self {
            DepNode::Module(_) => None,
            DepNode::Package(p) => Some(p.module_hash()),
        }
    }

    fn can_have_children(&self) -> bool {
        matches!(self, DepNode::Module(_))
    }
}

/// Dependency graph of a main module.
#[derive(Debug, Clone)]
pub struct DepGraph {
    main: String,
    graph: HierarchicalDigraph<DepNode>,
    /// Replacement path to the path of the module it replaces
    replaces: HashMap<String, String>,
}

impl DepGraph {
    /// Creates a graph holding only the main module.
    pub fn new(main: ModuleInfo) -> Self {
        let mut graph = Self {
            main: main.path.clone(),
            graph: HierarchicalDigraph::new(),
            replaces: HashMap::new(),
        };
        graph.register_module(main);
        graph
    }

    fn register_module(&mut self, info: ModuleInfo) -> bool {
        let hash = module_hash(&info.path);
        if self.graph.contains(&hash) {
            return false;
        }
        if let Some(replace) = &info.replace {
            self.replaces.insert(replace.path.clone(), info.path.clone());
        }
        debug!(module = %info.path, version = %info.selected_version(), "Adding module");
        self.graph
            .add_node(DepNode::Module(Module::from_info(info)))
            .is_ok()
    }

    /// Path of the main module.
    pub fn main_path(&self) -> &str {
        &self.main
    }

    /// The main module, unless a filter removed it.
    pub fn main_module(&self) -> Option<&Module> {
        self.get_module(&self.main)
    }

    /// The underlying hierarchical graph.
    pub fn graph(&self) -> &HierarchicalDigraph<DepNode> {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut HierarchicalDigraph<DepNode> {
        &mut self.graph
    }

    /// Adds a module. Adding a path that already exists returns the
    /// existing module unchanged.
    pub fn add_module(&mut self, info: ModuleInfo) -> Result<&Module> {
        let path = info.path.clone();
        self.register_module(info);
        self.get_module(&path)
            .ok_or_else(|| Error::Graph(GraphError::NodeNotFound { hash: module_hash(&path) }))
    }

    /// Resolves a module path, following replacements.
    fn resolve<'a>(&'a self, path: &'a str) -> &'a str {
        match self.replaces.get(path) {
            Some(replaced) => replaced,
            None => path,
        }
    }

    /// Looks up a module by path. Replacement paths resolve to the module
    /// they replace.
    pub fn get_module(&self, path: &str) -> Option<&Module> {
        self.graph
            .get_node(&module_hash(self.resolve(path)))
            .ok()
            .and_then(DepNode::as_module)
    }

    pub(crate) fn get_module_mut(&mut self, path: &str) -> Option<&mut Module> {
        let hash = module_hash(self.resolve(path));
        match self.graph.get_node_mut(&hash) {
            Ok(DepNode::Module(m)) => Some(m),
            _ => None,
        }
    }

    /// Adds a package under its owning module.
    pub fn add_package(&mut self, info: PackageInfo) -> Result<&Package> {
        let Some(module) = info.module_path() else {
            return Err(GraphError::NodeNotFound {
                hash: package_hash(&info.import_path),
            }
            .into());
        };
        let module = self.resolve(module).to_string();
        let hash = package_hash(&info.import_path);

        self.graph
            .add_node(DepNode::Package(Package::new(info, module)))?;
        self.get_package_by_hash(&hash)
    }

    fn get_package_by_hash(&self, hash: &str) -> Result<&Package> {
        self.graph
            .get_node(hash)?
            .as_package()
            .ok_or_else(|| Error::Graph(GraphError::NodeNotFound { hash: hash.to_string() }))
    }

    /// Adds an import edge between two packages. The owning modules gain
    /// a rolled-up edge.
    pub fn add_import(&mut self, src: &str, dst: &str) -> Result<()> {
        Ok(self.graph.add_edge(&package_hash(src), &package_hash(dst))?)
    }

    /// Looks up a package by import path.
    pub fn get_package(&self, import_path: &str) -> Option<&Package> {
        self.get_package_by_hash(&package_hash(import_path)).ok()
    }

    /// All modules sorted by path.
    pub fn modules(&self) -> Vec<&Module> {
        self.graph
            .get_level(Level::Modules.depth())
            .iter()
            .filter_map(|r| self.graph.get_node(&r.hash).ok())
            .filter_map(DepNode::as_module)
            .collect()
    }

    /// All packages sorted by import path.
    pub fn packages(&self) -> Vec<&Package> {
        self.graph
            .get_level(Level::Packages.depth())
            .iter()
            .filter_map(|r| self.graph.get_node(&r.hash).ok())
            .filter_map(DepNode::as_package)
            .collect()
    }

    /// Nodes of a level, sorted by name.
    pub fn level(&self, level: Level) -> NodeRefs {
        self.graph.get_level(level.depth())
    }

    /// Weighted successors of a node.
    pub fn successors(&self, level: Level, name: &str) -> Result<NodeRefs> {
        Ok(self.graph.successors(&level.hash(name))?)
    }

    /// Weighted predecessors of a node.
    pub fn predecessors(&self, level: Level, name: &str) -> Result<NodeRefs> {
        Ok(self.graph.predecessors(&level.hash(name))?)
    }

    /// Deletes a node and everything nested under it.
    pub fn delete(&mut self, level: Level, name: &str) -> Result<()> {
        Ok(self.graph.delete_node(&level.hash(name))?)
    }
}
