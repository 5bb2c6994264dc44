//! Parser for `go list -json` output.
//!
//! The build tool prints one JSON object per record, concatenated without
//! separators. Module listings come from `go list -json -m all` and package
//! listings from `go list -json ./...` (or any wider package pattern).

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::types::{ModuleInfo, PackageInfo};

/// Errors that can occur while reading dependency metadata.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Failed to read the file from disk.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse JSON content.
    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Every module record was missing or failed to load.
    #[error("unable to load any module information")]
    NoModules,
}

/// Result type alias for parser operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// The resolved build list of a project.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleSet {
    /// The module being analysed.
    pub main: ModuleInfo,
    /// Every other successfully loaded module, in listing order.
    pub dependencies: Vec<ModuleInfo>,
}

impl ModuleSet {
    /// Iterates over the main module followed by its dependencies.
    pub fn iter(&self) -> impl Iterator<Item = &ModuleInfo> {
        std::iter::once(&self.main).chain(self.dependencies.iter())
    }

    /// Total number of modules including the main one.
    pub fn len(&self) -> usize {
        self.dependencies.len() + 1
    }

    /// Always false: a module set holds at least the main module.
    pub fn is_empty(&self) -> bool {
        false
    }
}

fn parse_stream<T: DeserializeOwned>(content: &str) -> ParseResult<Vec<T>> {
    serde_json::Deserializer::from_str(content)
        .into_iter::<T>()
        .map(|record| record.map_err(ParseError::from))
        .collect()
}

/// Parses a module listing.
///
/// Records carrying an error are skipped. The main module is the record
/// flagged `Main`, or the first record when none is flagged.
///
/// # Example
///
/// ```
/// use depscope::parser::go_list::parse_modules_str;
///
/// let listing = r#"
/// {"Path": "example.com/app", "Main": true}
/// {"Path": "example.com/lib", "Version": "v1.0.0"}
/// "#;
/// let modules = parse_modules_str(listing).unwrap();
/// assert_eq!(modules.main.path, "example.com/app");
/// assert_eq!(modules.dependencies.len(), 1);
/// ```
pub fn parse_modules_str(content: &str) -> ParseResult<ModuleSet> {
    let mut main = None;
    let mut dependencies = Vec::new();

    for module in parse_stream::<ModuleInfo>(content)? {
        if let Some(error) = &module.error {
            warn!(
                module = %module.path,
                error = %error.err,
                "Unable to retrieve information for module"
            );
            continue;
        }
        if module.main && main.is_none() {
            main = Some(module);
        } else {
            dependencies.push(module);
        }
    }

    let main = match main {
        Some(main) => main,
        None if !dependencies.is_empty() => {
            let first = dependencies.remove(0);
            debug!(module = %first.path, "No module flagged as main, using first record");
            first
        }
        None => return Err(ParseError::NoModules),
    };

    debug!(main = %main.path, modules = dependencies.len() + 1, "Parsed module listing");
    Ok(ModuleSet { main, dependencies })
}

/// Parses a module listing from a file.
pub fn parse_modules_file(path: &Path) -> ParseResult<ModuleSet> {
    let content = fs::read_to_string(path)?;
    parse_modules_str(&content)
}

/// Parses a package listing.
pub fn parse_packages_str(content: &str) -> ParseResult<Vec<PackageInfo>> {
    let packages = parse_stream::<PackageInfo>(content)?;
    debug!(packages = packages.len(), "Parsed package listing");
    Ok(packages)
}

/// Parses a package listing from a file.
pub fn parse_packages_file(path: &Path) -> ParseResult<Vec<PackageInfo>> {
    let content = fs::read_to_string(path)?;
    parse_packages_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_MODULES: &str = r#"{
        "Path": "github.com/example/app",
        "Main": true,
        "Dir": "/src/app",
        "GoMod": "/src/app/go.mod"
}
{
        "Path": "github.com/foo/bar",
        "Version": "v1.2.0",
        "Time": "2019-05-01T12:00:00Z"
}
{
        "Path": "github.com/broken/mod",
        "Version": "v0.1.0",
        "Error": {"Err": "module lookup disabled"}
}
{
        "Path": "github.com/old/lib",
        "Version": "v0.3.0",
        "Replace": {"Path": "github.com/new/lib", "Version": "v0.4.0"}
}"#;

    #[test]
    fn test_parse_modules() {
        let modules = parse_modules_str(SAMPLE_MODULES).unwrap();

        assert_eq!(modules.main.path, "github.com/example/app");
        assert_eq!(modules.len(), 3);
        let paths: Vec<_> = modules.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["github.com/example/app", "github.com/foo/bar", "github.com/old/lib"]
        );
        assert_eq!(modules.dependencies[1].selected_version(), "v0.4.0");
    }

    #[test]
    fn test_parse_modules_without_main_flag() {
        let listing = r#"{"Path": "a.com/first"} {"Path": "a.com/second", "Version": "v1.0.0"}"#;
        let modules = parse_modules_str(listing).unwrap();

        assert_eq!(modules.main.path, "a.com/first");
        assert_eq!(modules.dependencies.len(), 1);
    }

    #[test]
    fn test_parse_modules_empty_is_fatal() {
        assert!(matches!(parse_modules_str(""), Err(ParseError::NoModules)));

        let only_errors = r#"{"Path": "a.com/x", "Error": {"Err": "boom"}}"#;
        assert!(matches!(
            parse_modules_str(only_errors),
            Err(ParseError::NoModules)
        ));
    }

    #[test]
    fn test_parse_modules_invalid_json() {
        let result = parse_modules_str(r#"{"Path": "a.com/x"} { invalid"#);
        assert!(matches!(result, Err(ParseError::JsonError(_))));
    }

    #[test]
    fn test_parse_packages() {
        let listing = r#"
{
        "ImportPath": "github.com/example/app",
        "Name": "main",
        "Module": {"Path": "github.com/example/app", "Main": true},
        "Imports": ["fmt", "github.com/foo/bar"]
}
{
        "ImportPath": "github.com/foo/bar",
        "Name": "bar",
        "Module": {"Path": "github.com/foo/bar", "Version": "v1.2.0"}
}"#;
        let packages = parse_packages_str(listing).unwrap();

        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].imports, vec!["fmt", "github.com/foo/bar"]);
        assert_eq!(packages[1].module_path(), Some("github.com/foo/bar"));
    }

    #[test]
    fn test_parse_missing_file() {
        let result = parse_packages_file(Path::new("/nonexistent/packages.json"));
        assert!(matches!(result, Err(ParseError::IoError(_))));
    }
}
