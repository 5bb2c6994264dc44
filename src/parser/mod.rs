//! Parser module for dependency metadata.
//!
//! This module reads the resolved module and package records that the Go
//! toolchain reports and turns them into typed structures that the graph
//! builder in [`crate::depgraph`] consumes.
//!
//! # Supported Inputs
//!
//! - **`go list -json -m all`** - module build list
//! - **`go list -json <packages>`** - package import listing
//! - **`go.mod`** - `// indirect` markers and `replace` directives
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use depscope::parser::{parse_modules_file, parse_packages_file};
//!
//! let modules = parse_modules_file(Path::new("modules.json")).unwrap();
//! let packages = parse_packages_file(Path::new("packages.json")).unwrap();
//!
//! println!("{} depends on {} modules", modules.main.path, modules.dependencies.len());
//! ```

pub mod go_list;
pub mod go_mod;
pub mod types;

pub use go_list::{
    parse_modules_file, parse_modules_str, parse_packages_file, parse_packages_str, ModuleSet,
    ParseError, ParseResult,
};

pub use go_mod::{go_mod_path, parse_indirects, parse_replaces, read_go_mod, ReplaceDirective};

pub use types::{is_standard_lib, ModuleError, ModuleInfo, PackageInfo};
