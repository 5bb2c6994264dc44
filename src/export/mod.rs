//! Export of a reduced dependency graph.
//!
//! This module provides exporters that serialise one level of a
//! [`DepGraph`]: JSON carries nodes and weighted edges, CSV carries the
//! weighted edge list.

pub mod csv;
pub mod json;

use std::io::{self, Write};

use crate::depgraph::{DepGraph, DepNode, Level};

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// JSON format - machine-readable, nodes and edges
    #[default]
    Json,
    /// CSV format - edge list
    Csv,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(format!(
                "Unknown export format: '{}'. Valid formats: json, csv",
                s
            )),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Csv => write!(f, "csv"),
        }
    }
}

/// A node of the exported level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportNode {
    pub name: String,
    /// Selected version, for modules
    pub version: Option<String>,
    /// Owning module, for packages
    pub module: Option<String>,
    pub test_only: bool,
}

/// A weighted edge between two nodes of the exported level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEdge {
    pub source: String,
    pub target: String,
    pub weight: usize,
}

/// Snapshot of one level of a graph, ready for export.
#[derive(Debug, Clone)]
pub struct ExportData {
    /// Path of the main module
    pub main: String,
    pub level: Level,
    /// Nodes sorted by name
    pub nodes: Vec<ExportNode>,
    /// Edges sorted by source, then target
    pub edges: Vec<ExportEdge>,
}

impl ExportData {
    /// Collects the nodes and edges of `level`.
    pub fn new(graph: &DepGraph, level: Level) -> Self {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();

        for node in graph.level(level) {
            let Ok(dep) = graph.graph().get_node(&node.hash) else {
                continue;
            };
            let (version, module) = match dep {
                DepNode::Module(m) => (Some(m.selected_version().to_string()), None),
                DepNode::Package(p) => (None, Some(p.module.clone())),
            };
            nodes.push(ExportNode {
                name: node.name.clone(),
                version,
                module,
                test_only: dep.is_test_only(),
            });

            if let Ok(successors) = graph.graph().successors(&node.hash) {
                edges.extend(successors.into_iter().map(|s| ExportEdge {
                    source: node.name.clone(),
                    target: s.name,
                    weight: s.weight,
                }));
            }
        }

        Self {
            main: graph.main_path().to_string(),
            level,
            nodes,
            edges,
        }
    }

    /// Number of exported nodes marked test-only
    pub fn test_only_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.test_only).count()
    }
}

/// Trait for exporters.
pub trait Exporter {
    /// Export the data to the given writer.
    fn export<W: Write>(&self, data: &ExportData, writer: &mut W) -> io::Result<()>;
}

/// Export data in the specified format.
pub fn export<W: Write>(format: ExportFormat, data: &ExportData, writer: &mut W) -> io::Result<()> {
    match format {
        ExportFormat::Json => json::JsonExporter.export(data, writer),
        ExportFormat::Csv => csv::CsvExporter.export(data, writer),
    }
}

/// Export data to a string.
pub fn export_to_string(format: ExportFormat, data: &ExportData) -> io::Result<String> {
    let mut buffer = Vec::new();
    export(format, data, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::parser::{ModuleInfo, PackageInfo};

    /// Two packages of app import lib, rolling up into a weight 2 module edge.
    pub(crate) fn sample_graph() -> DepGraph {
        let mut graph = DepGraph::new(ModuleInfo::new("example.com/app", ""));
        graph
            .add_module(ModuleInfo::new("example.com/lib", "v1.2.0"))
            .unwrap();
        for (path, module) in [
            ("example.com/app", "example.com/app"),
            ("example.com/app/cmd", "example.com/app"),
            ("example.com/lib", "example.com/lib"),
        ] {
            graph.add_package(PackageInfo::new(path, module)).unwrap();
        }
        graph.add_import("example.com/app", "example.com/lib").unwrap();
        graph.add_import("example.com/app/cmd", "example.com/lib").unwrap();
        graph
    }

    #[test]
    fn test_export_format_from_str() {
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("markdown".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_export_format_display() {
        assert_eq!(format!("{}", ExportFormat::Json), "json");
        assert_eq!(format!("{}", ExportFormat::Csv), "csv");
    }

    #[test]
    fn test_module_level_data() {
        let data = ExportData::new(&sample_graph(), Level::Modules);

        assert_eq!(data.main, "example.com/app");
        assert_eq!(data.nodes.len(), 2);
        assert_eq!(data.nodes[1].name, "example.com/lib");
        assert_eq!(data.nodes[1].version.as_deref(), Some("v1.2.0"));
        assert_eq!(
            data.edges,
            vec![ExportEdge {
                source: "example.com/app".into(),
                target: "example.com/lib".into(),
                weight: 2,
            }]
        );
        assert_eq!(data.test_only_count(), 0);
    }

    #[test]
    fn test_package_level_data() {
        let data = ExportData::new(&sample_graph(), Level::Packages);

        assert_eq!(data.nodes.len(), 3);
        assert_eq!(data.nodes[1].module.as_deref(), Some("example.com/app"));
        assert!(data.nodes[1].version.is_none());
        assert_eq!(data.edges.len(), 2);
        assert!(data.edges.iter().all(|e| e.weight == 1));
    }
}
