//! Construction of a [`DepGraph`] from resolved dependency metadata.
//!
//! Import edges between packages form the backbone of the graph. Module
//! requirements reported by `go mod graph` are then overlaid as version
//! constraints, and `// indirect` markers are read from each module's
//! go.mod file.

use std::collections::{BTreeSet, VecDeque};

use tracing::{debug, warn};

use crate::graph::{GraphError, Node};
use crate::parser::{
    is_standard_lib, parse_indirects, read_go_mod, ModuleInfo, ModuleSet, PackageInfo,
};

use super::module::{module_hash, VersionConstraint};
use super::package::package_hash;
use super::{DepGraph, Error, Level, Result};

/// One line of `go mod graph` output.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Requirement<'a> {
    source: &'a str,
    source_version: &'a str,
    target: &'a str,
    target_version: &'a str,
}

fn is_token(s: &str) -> bool {
    !s.is_empty() && !s.contains('@')
}

/// Parses `source[@version] target@version`.
fn parse_requirement(line: &str) -> Option<Requirement<'_>> {
    let mut fields = line.split_whitespace();
    let (Some(source), Some(target), None) = (fields.next(), fields.next(), fields.next()) else {
        return None;
    };

    let (source, source_version) = source.split_once('@').unwrap_or((source, ""));
    let (target, target_version) = target.split_once('@')?;
    if !is_token(source)
        || source_version.contains('@')
        || !is_token(target)
        || !is_token(target_version)
    {
        return None;
    }

    Some(Requirement {
        source,
        source_version,
        target,
        target_version,
    })
}

impl DepGraph {
    /// Builds the dependency graph of `modules.main`.
    ///
    /// # Arguments
    ///
    /// * `modules` - Resolved build list
    /// * `packages` - Package import listing, possibly empty
    /// * `mod_graph` - Raw `go mod graph` output, if available
    pub fn build(
        modules: &ModuleSet,
        packages: &[PackageInfo],
        mod_graph: Option<&str>,
    ) -> Result<Self> {
        debug!(main = %modules.main.path, "Creating dependency graph");

        let mut graph = DepGraph::new(modules.main.clone());
        for module in &modules.dependencies {
            graph.add_module(module.clone())?;
        }

        graph.add_packages(packages);
        graph.add_import_edges()?;
        if !packages.is_empty() {
            graph.mark_test_dependencies()?;
        }
        if let Some(mod_graph) = mod_graph {
            graph.overlay_version_constraints(mod_graph, packages.is_empty())?;
        }
        graph.read_indirects();
        graph.prune_disconnected()?;

        debug!(
            modules = graph.level(Level::Modules).len(),
            packages = graph.level(Level::Packages).len(),
            edges = graph.graph().edge_count(),
            "Dependency graph ready"
        );
        Ok(graph)
    }

    fn add_packages(&mut self, packages: &[PackageInfo]) {
        for info in packages {
            if info.module.is_none() {
                debug!(package = %info.import_path, "Skipping package without module");
                continue;
            }
            match self.add_package(info.clone()) {
                Ok(pkg) => debug!(
                    package = %pkg.import_path(),
                    module = %pkg.module,
                    "Added package"
                ),
                Err(Error::Graph(GraphError::NodeAlreadyExists { .. })) => {
                    warn!(package = %info.import_path, "Skipping duplicate package")
                }
                Err(e) => warn!(
                    package = %info.import_path,
                    module = info.module_path().unwrap_or_default(),
                    error = %e,
                    "Encountered package in unknown module"
                ),
            }
        }
    }

    /// Adds an edge for every import between known packages. Packages of
    /// the main module also contribute their test imports.
    fn add_import_edges(&mut self) -> Result<()> {
        let mut edges = Vec::new();
        for pkg in self.packages() {
            let mut imports: BTreeSet<&str> = pkg.info.imports.iter().map(String::as_str).collect();
            if pkg.module == self.main_path() {
                imports.extend(pkg.info.test_imports.iter().map(String::as_str));
                imports.extend(pkg.info.x_test_imports.iter().map(String::as_str));
            }

            for import in imports {
                if is_standard_lib(import) || import == pkg.import_path() {
                    continue;
                }
                if self.get_package(import).is_none() {
                    warn!(
                        package = %pkg.import_path(),
                        import,
                        "Detected import of unknown package"
                    );
                    continue;
                }
                edges.push((pkg.hash(), package_hash(import)));
            }
        }

        for (src, dst) in edges {
            debug!(source = %src, target = %dst, "Adding package dependency");
            self.graph_mut().add_edge(&src, &dst)?;
        }
        Ok(())
    }

    /// Flags every node not reachable through non-test imports from the
    /// main module's non-test packages as test-only.
    fn mark_test_dependencies(&mut self) -> Result<()> {
        debug!("Marking non-test dependencies");

        let hashes: Vec<String> = self.graph().nodes().map(Node::hash).collect();
        for hash in &hashes {
            self.graph_mut().get_node_mut(hash)?.set_test_only(true);
        }
        let main = self.main.clone();
        if let Some(module) = self.get_module_mut(&main) {
            module.test_only = false;
        }

        let mut todo: VecDeque<String> = self
            .packages()
            .into_iter()
            .filter(|p| p.module == main && !p.info.is_test_package())
            .map(|p| p.import_path().to_string())
            .collect();
        let mut seen: BTreeSet<String> = todo.iter().cloned().collect();

        while let Some(next) = todo.pop_front() {
            let hash = package_hash(&next);
            let node = self.graph_mut().get_node_mut(&hash)?;
            node.set_test_only(false);
            let Some(pkg) = node.as_package() else {
                continue;
            };
            let module = pkg.module.clone();
            let imports: Vec<String> = pkg
                .info
                .imports
                .iter()
                .filter(|imp| !is_standard_lib(imp))
                .cloned()
                .collect();

            if let Some(module) = self.get_module_mut(&module) {
                module.test_only = false;
            }
            for import in imports {
                if self.get_package(&import).is_some() && seen.insert(import.clone()) {
                    todo.push_back(import);
                }
            }
        }
        Ok(())
    }

    /// Records module requirements from `go mod graph` output as version
    /// constraints on existing module edges. With `add_missing` set, edges
    /// absent from the import graph are created instead of skipped.
    pub fn overlay_version_constraints(
        &mut self,
        mod_graph: &str,
        add_missing: bool,
    ) -> Result<()> {
        debug!("Overlaying module requirements onto the import graph");
        let mut stale = 0usize;

        for line in mod_graph.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let Some(req) = parse_requirement(line) else {
                warn!(line, "Skipping ill-formed line in module graph");
                continue;
            };

            let Some(source) = self.get_module(req.source) else {
                warn!(
                    source = req.source,
                    target = req.target,
                    "Requirement starts at an unknown module"
                );
                continue;
            };
            let Some(target) = self.get_module(req.target) else {
                warn!(
                    source = req.source,
                    target = req.target,
                    "Requirement ends at an unknown module"
                );
                continue;
            };
            if req.source_version != source.info.version {
                debug!(
                    source = req.source,
                    version = req.source_version,
                    target = req.target,
                    "Skipping requirement of unused source version"
                );
                stale += 1;
                continue;
            }

            let (source_path, target_path) = (source.path().to_string(), target.path().to_string());
            let (src_hash, dst_hash) = (module_hash(&source_path), module_hash(&target_path));
            if src_hash == dst_hash {
                continue;
            }
            if self.graph().edge_weight(&src_hash, &dst_hash) == 0 {
                if !add_missing {
                    debug!(
                        source = %source_path,
                        target = %target_path,
                        "Skipping requirement absent from import graph"
                    );
                    stale += 1;
                    continue;
                }
                self.graph_mut().add_edge(&src_hash, &dst_hash)?;
            }

            debug!(
                source = %source_path,
                target = %target_path,
                version = req.target_version,
                "Recording version constraint"
            );
            if let Some(module) = self.get_module_mut(&source_path) {
                module.version_constraints.insert(
                    dst_hash,
                    VersionConstraint {
                        source: req.source_version.to_string(),
                        target: req.target_version.to_string(),
                    },
                );
            }
        }

        if stale > 0 {
            warn!(count = stale, "Dropped stale or shadowed module requirements");
        }
        Ok(())
    }

    /// Reads `// indirect` markers from the go.mod file of every module.
    fn read_indirects(&mut self) {
        let modules: Vec<(String, ModuleInfo)> = self
            .modules()
            .into_iter()
            .map(|m| (m.path().to_string(), m.info.clone()))
            .collect();

        for (path, info) in modules {
            let content = match read_go_mod(&info) {
                Ok(Some(content)) => content,
                Ok(None) => continue,
                Err(e) => {
                    warn!(module = %path, error = %e, "Failed to read go.mod file");
                    continue;
                }
            };
            let indirects = parse_indirects(&content);
            debug!(
                module = %path,
                count = indirects.len(),
                "Found indirect dependencies"
            );
            if let Some(module) = self.get_module_mut(&path) {
                module.indirects.extend(indirects);
            }
        }
    }

    /// Removes modules other than the main one that have no edges at all.
    fn prune_disconnected(&mut self) -> Result<()> {
        let disconnected: Vec<String> = self
            .level(Level::Modules)
            .iter()
            .filter(|m| m.name != self.main)
            .filter(|m| {
                self.graph().predecessors(&m.hash).is_ok_and(|p| p.is_empty())
                    && self.graph().successors(&m.hash).is_ok_and(|s| s.is_empty())
            })
            .map(|m| m.hash.clone())
            .collect();

        for hash in disconnected {
            debug!(module = %hash, "Removing module not connected to the graph");
            self.graph_mut().delete_node(&hash)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_set() -> ModuleSet {
        let mut main = ModuleInfo::new("example.com/app", "");
        main.main = true;
        ModuleSet {
            main,
            dependencies: vec![
                ModuleInfo::new("example.com/lib", "v1.2.0"),
                ModuleInfo::new("example.com/util", "v0.3.0"),
                ModuleInfo::new("example.com/testkit", "v1.0.0"),
                ModuleInfo::new("example.com/unused", "v2.0.0"),
            ],
        }
    }

    fn package(path: &str, module: &str, imports: &[&str]) -> PackageInfo {
        let mut info = PackageInfo::new(path, module);
        info.imports = imports.iter().map(|s| s.to_string()).collect();
        info
    }

    fn packages() -> Vec<PackageInfo> {
        let mut app = package("example.com/app", "example.com/app", &["fmt", "example.com/lib"]);
        app.test_imports = vec!["example.com/testkit".to_string()];
        vec![
            app,
            package(
                "example.com/lib",
                "example.com/lib",
                &["example.com/util/a", "example.com/util/b"],
            ),
            package("example.com/util/a", "example.com/util", &["strings"]),
            package("example.com/util/b", "example.com/util", &[]),
            package("example.com/testkit", "example.com/testkit", &["example.com/util/a"]),
        ]
    }

    #[test]
    fn test_parse_requirement() {
        assert_eq!(
            parse_requirement("a.com/x b.com/y@v1.0.0"),
            Some(Requirement {
                source: "a.com/x",
                source_version: "",
                target: "b.com/y",
                target_version: "v1.0.0",
            })
        );
        assert_eq!(
            parse_requirement("a.com/x@v0.1.0 b.com/y@v1.0.0").map(|r| r.source_version),
            Some("v0.1.0")
        );
        assert!(parse_requirement("a.com/x").is_none());
        assert!(parse_requirement("a.com/x b.com/y").is_none());
        assert!(parse_requirement("a.com/x b.com/y@v1 extra").is_none());
        assert!(parse_requirement("a.com/x@v1@v2 b.com/y@v1").is_none());
    }

    #[test]
    fn test_build_reads_indirect_markers() {
        let dir = tempfile::TempDir::new().unwrap();
        let go_mod = dir.path().join("go.mod");
        std::fs::write(
            &go_mod,
            "module example.com/lib\n\nrequire example.com/util v0.3.0 // indirect\n",
        )
        .unwrap();

        let mut modules = module_set();
        modules.dependencies[0].go_mod = Some(go_mod.to_string_lossy().into_owned());
        modules.dependencies[1].go_mod = Some("/nonexistent/depscope/go.mod".into());
        let graph = DepGraph::build(&modules, &packages(), None).unwrap();

        let lib = graph.get_module("example.com/lib").unwrap();
        assert_eq!(lib.indirects.len(), 1);
        assert!(lib.is_indirect("example.com/util"));
        assert!(graph.get_module("example.com/util").unwrap().indirects.is_empty());
    }

    #[test]
    fn test_build_rolls_up_imports() {
        let graph = DepGraph::build(&module_set(), &packages(), None).unwrap();

        let lib = graph.successors(Level::Modules, "example.com/lib").unwrap();
        assert_eq!(lib.names(), vec!["example.com/util"]);
        assert_eq!(lib.weight("module example.com/util"), 2);

        let app = graph.successors(Level::Modules, "example.com/app").unwrap();
        assert_eq!(app.names(), vec!["example.com/lib", "example.com/testkit"]);
    }

    #[test]
    fn test_build_prunes_disconnected_modules() {
        let graph = DepGraph::build(&module_set(), &packages(), None).unwrap();

        assert!(graph.get_module("example.com/unused").is_none());
        assert!(graph.main_module().is_some());
        assert_eq!(graph.modules().len(), 4);
    }

    #[test]
    fn test_build_marks_test_dependencies() {
        let graph = DepGraph::build(&module_set(), &packages(), None).unwrap();

        assert!(!graph.get_module("example.com/lib").unwrap().is_test_only());
        assert!(!graph.get_module("example.com/util").unwrap().is_test_only());
        assert!(graph.get_module("example.com/testkit").unwrap().is_test_only());
        assert!(!graph.get_package("example.com/util/b").unwrap().is_test_only());
        assert!(graph.get_package("example.com/testkit").unwrap().is_test_only());
    }

    #[test]
    fn test_build_skips_unknown_packages() {
        let mut pkgs = packages();
        pkgs.push(package("other.com/x", "other.com", &[]));
        pkgs.push(package("example.com/lib/sub", "example.com/lib", &["missing.com/pkg"]));

        let graph = DepGraph::build(&module_set(), &pkgs, None).unwrap();
        assert!(graph.get_package("other.com/x").is_none());
        assert!(graph.get_package("example.com/lib/sub").is_some());
    }

    #[test]
    fn test_overlay_records_constraints_on_existing_edges() {
        let mod_graph = "\
example.com/app example.com/lib@v1.2.0
example.com/lib@v1.2.0 example.com/util@v0.3.0
example.com/lib@v1.1.0 example.com/util@v0.2.0
example.com/app example.com/unused@v2.0.0
not a valid line
";
        let graph = DepGraph::build(&module_set(), &packages(), Some(mod_graph)).unwrap();

        let lib = graph.get_module("example.com/lib").unwrap();
        assert_eq!(
            lib.version_constraints.get("module example.com/util"),
            Some(&VersionConstraint {
                source: "v1.2.0".to_string(),
                target: "v0.3.0".to_string(),
            })
        );
        let app = graph.main_module().unwrap();
        assert_eq!(app.version_constraints.len(), 1);
        assert!(graph.get_module("example.com/unused").is_none());
    }

    #[test]
    fn test_overlay_adds_edges_without_packages() {
        let mod_graph = "\
example.com/app example.com/lib@v1.2.0
example.com/lib@v1.2.0 example.com/util@v0.3.0
";
        let graph = DepGraph::build(&module_set(), &[], Some(mod_graph)).unwrap();

        assert_eq!(
            graph.successors(Level::Modules, "example.com/app").unwrap().names(),
            vec!["example.com/lib"]
        );
        assert_eq!(graph.modules().len(), 3);
        assert!(!graph.get_module("example.com/lib").unwrap().is_test_only());
    }
}
