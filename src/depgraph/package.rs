//! Package nodes: the fine level of the dependency graph.

use crate::parser::PackageInfo;

use super::module::module_hash;

/// Hash of the package node with the given import path.
pub fn package_hash(import_path: &str) -> String {
    format!("package {}", import_path)
}

/// A package of the dependency graph, nested under its owning module.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub info: PackageInfo,
    /// Path of the owning module node. Replaced modules resolve to the
    /// module that replaces them.
    pub module: String,
    pub(crate) test_only: bool,
}

impl Package {
    pub fn new(info: PackageInfo, module: impl Into<String>) -> Self {
        Self {
            info,
            module: module.into(),
            test_only: false,
        }
    }

    pub fn import_path(&self) -> &str {
        &self.info.import_path
    }

    pub fn hash(&self) -> String {
        package_hash(&self.info.import_path)
    }

    pub fn module_hash(&self) -> String {
        module_hash(&self.module)
    }

    /// Whether the package is an external test package or only reachable
    /// through test imports.
    pub fn is_test_only(&self) -> bool {
        self.test_only || self.info.is_test_package()
    }
}
