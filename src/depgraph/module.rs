//! Module nodes: the coarse level of the dependency graph.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::parser::ModuleInfo;

/// Hash of the module node with the given path.
pub fn module_hash(path: &str) -> String {
    format!("module {}", path)
}

/// Versions declared on a module-level requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    /// Version of the requiring module that declares the requirement
    pub source: String,
    /// Minimum version required of the target
    pub target: String,
}

/// A module of the dependency graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub info: ModuleInfo,
    /// Paths of requirements marked `// indirect` in this module's go.mod
    pub indirects: HashSet<String>,
    /// Declared requirements keyed by target module hash
    pub version_constraints: HashMap<String, VersionConstraint>,
    pub(crate) test_only: bool,
}

impl Module {
    /// Creates a module from a path and a version.
    pub fn new(path: impl Into<String>, version: impl Into<String>) -> Self {
        Self::from_info(ModuleInfo::new(path, version))
    }

    pub fn from_info(info: ModuleInfo) -> Self {
        Self {
            info,
            indirects: HashSet::new(),
            version_constraints: HashMap::new(),
            test_only: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.info.path
    }

    pub fn hash(&self) -> String {
        module_hash(&self.info.path)
    }

    /// Version in use, taking replacements into account.
    pub fn selected_version(&self) -> &str {
        self.info.selected_version()
    }

    /// Publication time of the version in use.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.info.timestamp()
    }

    /// Whether the module is only reachable through test imports.
    pub fn is_test_only(&self) -> bool {
        self.test_only
    }

    /// Returns true if `target` is an `// indirect` requirement of this module.
    pub fn is_indirect(&self, target: &str) -> bool {
        self.indirects.contains(target)
    }
}
