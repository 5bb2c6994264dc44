//! Composable graph reductions.
//!
//! Filters consume a graph and hand back the reduced one; callers that need
//! to keep the original clone it first.

use std::collections::{HashSet, VecDeque};

use semver::Version;
use tracing::{debug, warn};

use crate::query::{parse, Expr};

use super::{module_hash, DepGraph, Level, Result};

/// A reduction applied to a dependency graph.
pub trait Filter {
    fn apply(&self, graph: DepGraph) -> Result<DepGraph>;
}

/// Keeps only the nodes selected by a query.
#[derive(Debug, Clone)]
pub struct QueryFilter {
    pub expr: Expr,
    pub level: Level,
}

impl QueryFilter {
    pub fn new(expr: Expr, level: Level) -> Self {
        Self { expr, level }
    }

    /// Parses `query` into a filter for the given level.
    pub fn parse(query: &str, level: Level) -> Result<Self> {
        Ok(Self::new(parse(query)?, level))
    }
}

impl Filter for QueryFilter {
    fn apply(&self, mut graph: DepGraph) -> Result<DepGraph> {
        let removed = graph.apply_query(&self.expr, self.level)?;
        debug!(query = %self.expr, removed, "Applied query");
        Ok(graph)
    }
}

/// Removes the named modules and everything they contain.
#[derive(Debug, Clone, Default)]
pub struct ArbitraryModules {
    pub modules: Vec<String>,
}

impl Filter for ArbitraryModules {
    fn apply(&self, mut graph: DepGraph) -> Result<DepGraph> {
        for module in &self.modules {
            if graph.delete(Level::Modules, module).is_err() {
                warn!(module = %module, "Could not remove module from graph");
            }
        }
        Ok(graph)
    }
}

/// Prunes modules that nothing else shares: leaves with at most one
/// predecessor, followed up their chain while each step stays unshared.
#[derive(Debug, Clone, Default)]
pub struct NonSharedModules {
    /// Modules that are never pruned. The main module is always kept.
    pub excludes: Vec<String>,
}

impl NonSharedModules {
    fn is_unshared_leaf(
        graph: &DepGraph,
        excludes: &HashSet<&str>,
        name: &str,
    ) -> Result<bool> {
        if excludes.contains(name) || name == graph.main_path() {
            return Ok(false);
        }
        Ok(graph.successors(Level::Modules, name)?.is_empty()
            && graph.predecessors(Level::Modules, name)?.len() <= 1)
    }
}

impl Filter for NonSharedModules {
    fn apply(&self, mut graph: DepGraph) -> Result<DepGraph> {
        debug!("Pruning modules that only have one predecessor");
        if !self.excludes.is_empty() {
            debug!(excludes = ?self.excludes, "Excluding modules from pruning");
        }
        let excludes: HashSet<&str> = self.excludes.iter().map(String::as_str).collect();

        loop {
            let mut leaf = None;
            for node in graph.level(Level::Modules) {
                if Self::is_unshared_leaf(&graph, &excludes, &node.name)? {
                    leaf = Some(node.name);
                    break;
                }
            }
            let Some(mut leaf) = leaf else {
                return Ok(graph);
            };

            loop {
                let pred = graph
                    .predecessors(Level::Modules, &leaf)?
                    .into_iter()
                    .next();
                debug!(module = %leaf, "Pruning unshared module");
                graph.delete(Level::Modules, &leaf)?;

                match pred {
                    Some(pred) if Self::is_unshared_leaf(&graph, &excludes, &pred.name)? => {
                        leaf = pred.name;
                    }
                    _ => break,
                }
            }
        }
    }
}

/// A module whose consumers should be kept, optionally restricted to the
/// consumers that prevent the use of `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub module: String,
    pub version: Option<String>,
}

impl Target {
    pub fn new(module: impl Into<String>, version: Option<String>) -> Self {
        Self {
            module: module.into(),
            version,
        }
    }
}

/// Keeps only the modules on a predecessor chain leading to a target.
#[derive(Debug, Clone, Default)]
pub struct TargetModules {
    pub targets: Vec<Target>,
}

fn parse_version(raw: &str) -> Option<Version> {
    Version::parse(raw.trim_start_matches('v')).ok()
}

impl TargetModules {
    /// Whether `consumer` requires a version of the target newer than the
    /// filter version. Missing or unparsable versions keep the consumer.
    fn consumer_matches(graph: &DepGraph, consumer: &str, target: &Target) -> bool {
        let Some(wanted) = target.version.as_deref() else {
            return true;
        };
        let Some(required) = graph
            .get_module(consumer)
            .and_then(|m| m.version_constraints.get(&module_hash(&target.module)))
            .map(|c| c.target.as_str())
        else {
            return true;
        };

        match (parse_version(required), parse_version(wanted)) {
            (Some(required), Some(wanted)) => required > wanted,
            _ => {
                warn!(required, wanted, "Could not compare versions");
                true
            }
        }
    }

    fn mark(&self, graph: &DepGraph, target: &Target, keep: &mut HashSet<String>) -> Result<()> {
        if graph.get_module(&target.module).is_none() {
            warn!(module = %target.module, "Target module not found in graph");
            return Ok(());
        }
        keep.insert(target.module.clone());

        debug!(module = %target.module, version = ?target.version, "Marking subgraph");
        let mut todo = VecDeque::new();
        for consumer in graph.predecessors(Level::Modules, &target.module)? {
            if Self::consumer_matches(graph, &consumer.name, target) {
                debug!(module = %consumer.name, "Keeping module");
                keep.insert(consumer.name.clone());
                todo.push_back(consumer.name);
            }
        }

        while let Some(name) = todo.pop_front() {
            for pred in graph.predecessors(Level::Modules, &name)? {
                if keep.insert(pred.name.clone()) {
                    debug!(module = %pred.name, "Keeping module");
                    todo.push_back(pred.name);
                }
            }
        }
        Ok(())
    }
}

impl Filter for TargetModules {
    fn apply(&self, mut graph: DepGraph) -> Result<DepGraph> {
        if self.targets.is_empty() {
            return Ok(graph);
        }

        let mut keep = HashSet::new();
        for target in &self.targets {
            self.mark(&graph, target, &mut keep)?;
        }

        debug!("Pruning irrelevant modules");
        for node in graph.level(Level::Modules) {
            if !keep.contains(&node.name) {
                debug!(module = %node.name, "Pruning module");
                graph.delete(Level::Modules, &node.name)?;
            }
        }
        Ok(graph)
    }
}
