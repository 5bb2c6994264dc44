//! Reading of the go.mod manifests that module records point at.
//!
//! Only the two directives the analyses need are understood: `// indirect`
//! markers on requirements and `replace` directives. Everything else in the
//! file is ignored.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::go_list::ParseResult;
use super::types::ModuleInfo;

/// A `replace` directive from a go.mod file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceDirective {
    /// Path of the module being replaced
    pub original: String,
    /// Module path or local directory used instead
    pub replacement: String,
    /// Version of the replacement, empty for local directories
    pub version: String,
}

/// Locates the go.mod file describing `info`.
///
/// Replaced modules are described by their replacement. An explicit `GoMod`
/// path wins, otherwise a `go.mod` inside the module directory (or a local
/// replacement path) is used if it exists.
pub fn go_mod_path(info: &ModuleInfo) -> Option<PathBuf> {
    let info = info.replace.as_deref().unwrap_or(info);
    if let Some(go_mod) = info.go_mod.as_deref().filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(go_mod));
    }

    info.dir
        .iter()
        .map(|dir| Path::new(dir).join("go.mod"))
        .chain(std::iter::once(Path::new(&info.path).join("go.mod")))
        .find(|candidate| candidate.is_file())
}

/// Reads the go.mod file of `info`. Returns `Ok(None)` when the module has
/// no go.mod file that can be located.
pub fn read_go_mod(info: &ModuleInfo) -> ParseResult<Option<String>> {
    let Some(path) = go_mod_path(info) else {
        debug!(module = %info.path, "No go.mod file found");
        return Ok(None);
    };
    debug!(module = %info.path, go_mod = %path.display(), "Reading go.mod file");
    Ok(Some(fs::read_to_string(path)?))
}

fn strip_comment(line: &str) -> &str {
    line.split_once("//").map_or(line, |(code, _)| code)
}

/// Extracts the paths of `// indirect` requirements from go.mod content.
///
/// # Example
///
/// ```
/// use depscope::parser::parse_indirects;
///
/// let go_mod = "module a.com/x\n\nrequire (\n\tb.com/y v1.0.0 // indirect\n\tc.com/z v0.2.0\n)\n";
/// assert_eq!(parse_indirects(go_mod), vec!["b.com/y"]);
/// ```
pub fn parse_indirects(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let line = line.strip_prefix("require ").unwrap_or(line);
            let requirement = line.strip_suffix("// indirect")?;
            let mut fields = requirement.split_whitespace();
            match (fields.next(), fields.next(), fields.next()) {
                (Some(path), Some(_version), None) => Some(path.to_string()),
                _ => None,
            }
        })
        .collect()
}

/// Parses `original [version] => replacement [version]`.
fn parse_replace(directive: &str) -> Option<ReplaceDirective> {
    let (lhs, rhs) = directive.split_once("=>")?;

    let mut lhs = lhs.split_whitespace();
    let (Some(original), _, None) = (lhs.next(), lhs.next(), lhs.next()) else {
        return None;
    };
    let mut rhs = rhs.split_whitespace();
    let (Some(replacement), version, None) = (rhs.next(), rhs.next(), rhs.next()) else {
        return None;
    };

    Some(ReplaceDirective {
        original: original.to_string(),
        replacement: replacement.to_string(),
        version: version.unwrap_or_default().to_string(),
    })
}

/// Extracts `replace` directives, both single-line and block form, in file
/// order.
///
/// # Example
///
/// ```
/// use depscope::parser::parse_replaces;
///
/// let go_mod = "module a.com/x\n\nreplace b.com/y => ./y\n";
/// let replaces = parse_replaces(go_mod);
/// assert_eq!(replaces[0].original, "b.com/y");
/// assert_eq!(replaces[0].replacement, "./y");
/// assert!(replaces[0].version.is_empty());
/// ```
pub fn parse_replaces(content: &str) -> Vec<ReplaceDirective> {
    let mut replaces = Vec::new();
    let mut in_block = false;

    for line in content.lines() {
        let line = strip_comment(line).trim();
        if line.is_empty() {
            continue;
        }

        let directive = if in_block {
            if line.starts_with(')') {
                in_block = false;
                continue;
            }
            line
        } else {
            let Some(rest) = line.strip_prefix("replace") else {
                continue;
            };
            if rest.trim_start().starts_with('(') {
                in_block = true;
                continue;
            }
            if !rest.starts_with(char::is_whitespace) {
                continue;
            }
            rest
        };

        match parse_replace(directive) {
            Some(replace) => replaces.push(replace),
            None => debug!(line = %line, "Ignoring malformed replace directive"),
        }
    }
    replaces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replace(original: &str, replacement: &str, version: &str) -> ReplaceDirective {
        ReplaceDirective {
            original: original.into(),
            replacement: replacement.into(),
            version: version.into(),
        }
    }

    #[test]
    fn test_parse_indirects() {
        let go_mod = "module a.com/x

go 1.20

require (
\tb.com/y v1.0.0 // indirect
\tc.com/z v0.2.0
)

require d.com/w v0.0.1 // indirect
";
        assert_eq!(parse_indirects(go_mod), vec!["b.com/y", "d.com/w"]);
    }

    #[test]
    fn test_parse_single_replace() {
        assert_eq!(
            parse_replaces("replace originalA => overrideA v1.0.0"),
            vec![replace("originalA", "overrideA", "v1.0.0")]
        );
        assert_eq!(
            parse_replaces("replace originalA v0.1.0 => overrideA v1.0.0"),
            vec![replace("originalA", "overrideA", "v1.0.0")]
        );
    }

    #[test]
    fn test_parse_replace_block() {
        let go_mod = "
replace (
\toriginalB => overrideB v1.0.0
\toriginalC => ./overrideC
)
";
        assert_eq!(
            parse_replaces(go_mod),
            vec![
                replace("originalB", "overrideB", "v1.0.0"),
                replace("originalC", "./overrideC", ""),
            ]
        );
    }

    #[test]
    fn test_parse_replaces_in_full_go_mod() {
        let go_mod = "module github.com/foo/bar

go 1.12

require (
\tgithub.com/my-dep/A v1.2.0
\tgithub.com/my-dep/B v1.9.2-201905291510-0123456789ab // indirect
\toriginalB v0.4.3
\toriginalC v0.2.3
\toriginalD v0.1.0
)

// Override this because its upstream is broken.
replace originalC => ./overrideC // Bar

// Moar overrides.
replace (
\t// Foo.
\toriginalB => overrideB v1.0.0
\toriginalD => ./overrideD
)

replacements are not directives
replace garbage
";
        assert_eq!(
            parse_replaces(go_mod),
            vec![
                replace("originalC", "./overrideC", ""),
                replace("originalB", "overrideB", "v1.0.0"),
                replace("originalD", "./overrideD", ""),
            ]
        );
    }

    #[test]
    fn test_go_mod_path() {
        let mut info = ModuleInfo::new("moduleA", "v1.0.0");
        assert_eq!(go_mod_path(&info), None);

        info.go_mod = Some("testdata/moduleA/go.mod".into());
        assert_eq!(
            go_mod_path(&info),
            Some(PathBuf::from("testdata/moduleA/go.mod"))
        );

        let mut replaced = ModuleInfo::new("moduleC", "v0.1.0");
        replaced.go_mod = Some("nowhere".into());
        replaced.replace = Some(Box::new(info));
        assert_eq!(
            go_mod_path(&replaced),
            Some(PathBuf::from("testdata/moduleA/go.mod"))
        );
    }

    #[test]
    fn test_go_mod_path_falls_back_to_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("go.mod"), "module local\n").unwrap();

        let mut info = ModuleInfo::new("local", "");
        info.dir = Some(dir.path().to_string_lossy().into_owned());
        assert_eq!(go_mod_path(&info), Some(dir.path().join("go.mod")));
        assert_eq!(
            read_go_mod(&info).unwrap().as_deref(),
            Some("module local\n")
        );

        let by_path = ModuleInfo::new(dir.path().to_string_lossy(), "");
        assert_eq!(go_mod_path(&by_path), Some(dir.path().join("go.mod")));
    }

    #[test]
    fn test_read_go_mod_missing_file() {
        let mut info = ModuleInfo::new("moduleD", "v0.0.1");
        info.go_mod = Some("/nonexistent/depscope/go.mod".into());
        assert!(read_go_mod(&info).is_err());
    }
}
