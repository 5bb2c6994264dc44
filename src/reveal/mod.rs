//! Reveal `replace` directives hidden in dependencies.
//!
//! The build tool only honours `replace` directives of the main module.
//! Dependencies that rely on their own replacements silently build against
//! something else once they are consumed, so this module collects every
//! replacement declared anywhere in the graph and flags the ones the main
//! module already mirrors.
//!
//! # Example
//!
//! ```ignore
//! use depscope::reveal::Replacements;
//!
//! let replacements = Replacements::find(&graph)
//!     .filter_on_offenders(&["example.com/lib".to_string()]);
//! print!("{}", replacements);
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use tracing::{debug, warn};

use crate::depgraph::DepGraph;
use crate::parser::{parse_replaces, read_go_mod, ModuleInfo, ReplaceDirective};

/// A `replace` directive together with the module declaring it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    /// Module whose go.mod declares the replacement
    pub offender: String,
    pub original: String,
    pub replacement: String,
    /// Empty when the replacement is a local directory
    pub version: String,
}

impl Replacement {
    fn new(offender: &str, directive: ReplaceDirective) -> Self {
        Self {
            offender: offender.to_string(),
            original: directive.original,
            replacement: directive.replacement,
            version: directive.version,
        }
    }
}

/// Every replacement found in the dependencies of a main module, grouped by
/// the module being replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Replacements {
    main: String,
    /// Replacements declared by the main module: original to replacement
    top_level: BTreeMap<String, String>,
    /// Replacements by original module, sorted by offender
    by_original: BTreeMap<String, Vec<Replacement>>,
}

fn read_replaces(info: &ModuleInfo) -> Option<Vec<ReplaceDirective>> {
    match read_go_mod(info) {
        Ok(Some(content)) => Some(parse_replaces(&content)),
        Ok(None) => None,
        Err(e) => {
            warn!(module = %info.path, error = %e, "Failed to read go.mod file");
            None
        }
    }
}

impl Replacements {
    /// Collects the `replace` directives of every module in `graph`.
    ///
    /// Modules without a readable go.mod file are skipped. A replaced module
    /// is represented by its replacement, which is then reported as the
    /// offender.
    pub fn find(graph: &DepGraph) -> Self {
        let mut replacements = Self {
            main: graph.main_path().to_string(),
            ..Self::default()
        };

        if let Some(main) = graph.main_module() {
            for directive in read_replaces(&main.info).unwrap_or_default() {
                replacements
                    .top_level
                    .insert(directive.original, directive.replacement);
            }
        }
        debug!(count = replacements.top_level.len(), "Found top-level replacements");

        for module in graph.modules() {
            if module.path() == graph.main_path() {
                continue;
            }
            let offender = module
                .info
                .replace
                .as_deref()
                .map_or(module.path(), |r| r.path.as_str());
            let Some(directives) = read_replaces(&module.info) else {
                debug!(module = %module.path(), "Skipping module without go.mod file");
                continue;
            };

            for directive in directives {
                let replacement = Replacement::new(offender, directive);
                let entries = replacements
                    .by_original
                    .entry(replacement.original.clone())
                    .or_default();
                if !entries.contains(&replacement) {
                    entries.push(replacement);
                }
            }
        }

        for entries in replacements.by_original.values_mut() {
            entries.sort_by(|a, b| {
                (&a.offender, &a.replacement).cmp(&(&b.offender, &b.replacement))
            });
        }
        debug!(
            count = replacements.by_original.len(),
            "Found replaced modules"
        );
        replacements
    }

    /// Path of the main module.
    pub fn main(&self) -> &str {
        &self.main
    }

    /// Replacement the main module declares for `original`, if any.
    pub fn top_level(&self, original: &str) -> Option<&str> {
        self.top_level.get(original).map(String::as_str)
    }

    /// Paths of the replaced modules, sorted.
    pub fn replaced_modules(&self) -> impl Iterator<Item = &str> {
        self.by_original.keys().map(String::as_str)
    }

    /// Replacements of `original`, sorted by offender.
    pub fn replacements_of(&self, original: &str) -> &[Replacement] {
        self.by_original
            .get(original)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.by_original.is_empty()
    }

    /// Keeps only the replacements declared by one of `offenders`. An empty
    /// list keeps everything.
    pub fn filter_on_offenders(&self, offenders: &[String]) -> Self {
        if offenders.is_empty() {
            return self.clone();
        }
        let offenders: HashSet<&str> = offenders.iter().map(String::as_str).collect();

        let by_original = self
            .by_original
            .iter()
            .filter_map(|(original, entries)| {
                let kept: Vec<Replacement> = entries
                    .iter()
                    .filter(|r| offenders.contains(r.offender.as_str()))
                    .cloned()
                    .collect();
                (!kept.is_empty()).then(|| (original.clone(), kept))
            })
            .collect();

        Self {
            main: self.main.clone(),
            top_level: self.top_level.clone(),
            by_original,
        }
    }

    /// Keeps only the replacements of the modules in `originals`. An empty
    /// list keeps everything.
    pub fn filter_on_originals(&self, originals: &[String]) -> Self {
        if originals.is_empty() {
            return self.clone();
        }

        let by_original = originals
            .iter()
            .filter_map(|original| {
                let entries = self.by_original.get(original)?;
                Some((original.clone(), entries.clone()))
            })
            .collect();

        Self {
            main: self.main.clone(),
            top_level: self.top_level.clone(),
            by_original,
        }
    }
}

fn width<'a>(values: impl Iterator<Item = &'a str>) -> usize {
    values.map(|v| v.chars().count()).max().unwrap_or(0)
}

impl fmt::Display for Replacements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut matched = false;

        for (original, entries) in &self.by_original {
            writeln!(f, "'{}' is replaced:", original)?;

            let offender_width = width(entries.iter().map(|r| r.offender.as_str()));
            let replacement_width = width(entries.iter().map(|r| r.replacement.as_str()));
            let version_width = width(entries.iter().map(|r| r.version.as_str()));

            for entry in entries {
                let mark = if self.top_level(original) == Some(entry.replacement.as_str()) {
                    matched = true;
                    " ✓ "
                } else {
                    "   "
                };

                if entry.version.is_empty() {
                    writeln!(
                        f,
                        "{}{:<ow$} -> {}",
                        mark,
                        entry.offender,
                        entry.replacement,
                        ow = offender_width
                    )?;
                } else {
                    writeln!(
                        f,
                        "{}{:<ow$} -> {:<rw$} @ {:>vw$}",
                        mark,
                        entry.offender,
                        entry.replacement,
                        entry.version,
                        ow = offender_width,
                        rw = replacement_width,
                        vw = version_width
                    )?;
                }
            }
            writeln!(f)?;
        }

        if matched {
            writeln!(f, "[✓] Match with a top-level replace in '{}'", self.main)?;
        }
        Ok(())
    }
}
