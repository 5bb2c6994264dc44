//! Shared types for dependency metadata.
//!
//! These structures mirror the JSON records emitted by `go list -json -m`
//! for modules and `go list -json` for packages. Only the fields needed
//! for graph construction are captured; unknown fields are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A resolved module record.
///
/// # Example
///
/// ```
/// use depscope::parser::types::ModuleInfo;
///
/// let json = r#"{"Path": "example.com/lib", "Version": "v1.2.0"}"#;
/// let module: ModuleInfo = serde_json::from_str(json).unwrap();
/// assert_eq!(module.path, "example.com/lib");
/// assert_eq!(module.selected_version(), "v1.2.0");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct ModuleInfo {
    /// Module path, e.g. `github.com/foo/bar`.
    pub path: String,

    /// Version required by the build list. Empty for the main module.
    pub version: String,

    /// Whether this is the main module of the analysed project.
    pub main: bool,

    /// Whether the module is only an indirect requirement.
    pub indirect: bool,

    /// Module substituted for this one, if any.
    pub replace: Option<Box<ModuleInfo>>,

    /// Publication time of the version.
    pub time: Option<DateTime<Utc>>,

    /// Directory holding the module sources.
    pub dir: Option<String>,

    /// Path to the module's `go.mod` file.
    pub go_mod: Option<String>,

    /// Set when the build tool failed to load the module.
    pub error: Option<ModuleError>,
}

impl ModuleInfo {
    /// Creates a module record with a path and a version.
    pub fn new(path: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// Version in use: the replacement's version when replaced.
    pub fn selected_version(&self) -> &str {
        match &self.replace {
            Some(replace) => &replace.version,
            None => &self.version,
        }
    }

    /// Publication time of the version in use.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match &self.replace {
            Some(replace) => replace.time,
            None => self.time,
        }
    }
}

impl fmt::Display for ModuleInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version.is_empty() {
            write!(f, "{}", self.path)
        } else {
            write!(f, "{}@{}", self.path, self.version)
        }
    }
}

/// Error attached to a module record that could not be loaded.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct ModuleError {
    pub err: String,
}

/// Import information for a single package.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct PackageInfo {
    /// Full import path of the package.
    pub import_path: String,

    /// Name from the `package` clause; `_test` suffixed for external tests.
    pub name: String,

    /// Module owning the package. Absent for standard-library packages.
    pub module: Option<ModuleInfo>,

    /// Imports of the non-test sources.
    pub imports: Vec<String>,

    /// Additional imports of in-package test files.
    pub test_imports: Vec<String>,

    /// Imports of the external `_test` package.
    pub x_test_imports: Vec<String>,
}

impl PackageInfo {
    /// Creates a package record owned by `module`.
    pub fn new(import_path: impl Into<String>, module: impl Into<String>) -> Self {
        let import_path = import_path.into();
        let name = import_path
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            import_path,
            name,
            module: Some(ModuleInfo::new(module, "")),
            ..Self::default()
        }
    }

    /// Path of the owning module, if known.
    pub fn module_path(&self) -> Option<&str> {
        self.module.as_ref().map(|m| m.path.as_str())
    }

    /// Returns true if the package only exists for tests.
    pub fn is_test_package(&self) -> bool {
        self.name.ends_with("_test")
    }
}

/// Returns true for standard-library import paths, whose first path
/// element carries no domain.
pub fn is_standard_lib(import_path: &str) -> bool {
    !import_path
        .split('/')
        .next()
        .unwrap_or_default()
        .contains('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_info_deserialize() {
        let json = r#"{
            "Path": "github.com/foo/bar",
            "Version": "v1.4.0",
            "Time": "2019-03-04T10:00:00Z",
            "Indirect": true,
            "GoMod": "/tmp/mod/github.com/foo/bar@v1.4.0/go.mod",
            "GoVersion": "1.12"
        }"#;
        let module: ModuleInfo = serde_json::from_str(json).unwrap();

        assert_eq!(module.path, "github.com/foo/bar");
        assert!(module.indirect);
        assert!(!module.main);
        assert!(module.time.is_some());
        assert_eq!(
            module.go_mod.as_deref(),
            Some("/tmp/mod/github.com/foo/bar@v1.4.0/go.mod")
        );
    }

    #[test]
    fn test_selected_version_follows_replace() {
        let json = r#"{
            "Path": "github.com/foo/bar",
            "Version": "v1.4.0",
            "Time": "2019-03-04T10:00:00Z",
            "Replace": {
                "Path": "github.com/fork/bar",
                "Version": "v1.5.0",
                "Time": "2020-01-01T00:00:00Z"
            }
        }"#;
        let module: ModuleInfo = serde_json::from_str(json).unwrap();

        assert_eq!(module.selected_version(), "v1.5.0");
        assert_eq!(
            module.timestamp().map(|t| t.to_rfc3339()),
            Some("2020-01-01T00:00:00+00:00".to_string())
        );
    }

    #[test]
    fn test_module_display() {
        assert_eq!(ModuleInfo::new("a.com/b", "v1.0.0").to_string(), "a.com/b@v1.0.0");
        assert_eq!(ModuleInfo::new("a.com/b", "").to_string(), "a.com/b");
    }

    #[test]
    fn test_package_info_deserialize() {
        let json = r#"{
            "ImportPath": "github.com/foo/bar/baz",
            "Name": "baz",
            "Module": {"Path": "github.com/foo/bar", "Version": "v1.0.0"},
            "Imports": ["fmt", "github.com/dead/beef"],
            "XTestImports": ["testing"]
        }"#;
        let pkg: PackageInfo = serde_json::from_str(json).unwrap();

        assert_eq!(pkg.module_path(), Some("github.com/foo/bar"));
        assert_eq!(pkg.imports.len(), 2);
        assert!(pkg.test_imports.is_empty());
        assert_eq!(pkg.x_test_imports, vec!["testing".to_string()]);
        assert!(!pkg.is_test_package());
    }

    #[test]
    fn test_package_info_new() {
        let pkg = PackageInfo::new("example.com/mod/sub", "example.com/mod");
        assert_eq!(pkg.name, "sub");
        assert_eq!(pkg.module_path(), Some("example.com/mod"));
    }

    #[test]
    fn test_is_standard_lib() {
        assert!(is_standard_lib("fmt"));
        assert!(is_standard_lib("net/http"));
        assert!(!is_standard_lib("github.com/foo/bar"));
        assert!(!is_standard_lib("golang.org/x/net"));
    }
}
