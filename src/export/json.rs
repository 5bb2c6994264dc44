//! JSON export implementation.
//!
//! Exports the nodes and weighted edges of a level for machine-readable output.

use super::{ExportData, Exporter};
use serde::Serialize;
use std::io::{self, Write};

/// JSON exporter implementation.
pub struct JsonExporter;

/// Serializable node for JSON output.
#[derive(Serialize)]
struct JsonNode<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    module: Option<&'a str>,
    test_only: bool,
}

/// Serializable edge for JSON output.
#[derive(Serialize)]
struct JsonEdge<'a> {
    source: &'a str,
    target: &'a str,
    weight: usize,
}

/// Summary statistics for JSON output.
#[derive(Serialize)]
struct JsonSummary {
    nodes: usize,
    edges: usize,
    test_only: usize,
}

/// Root JSON export structure.
#[derive(Serialize)]
struct JsonExport<'a> {
    main: &'a str,
    level: String,
    summary: JsonSummary,
    nodes: Vec<JsonNode<'a>>,
    edges: Vec<JsonEdge<'a>>,
}

impl Exporter for JsonExporter {
    fn export<W: Write>(&self, data: &ExportData, writer: &mut W) -> io::Result<()> {
        let nodes = data
            .nodes
            .iter()
            .map(|n| JsonNode {
                name: &n.name,
                version: n.version.as_deref(),
                module: n.module.as_deref(),
                test_only: n.test_only,
            })
            .collect();

        let edges = data
            .edges
            .iter()
            .map(|e| JsonEdge {
                source: &e.source,
                target: &e.target,
                weight: e.weight,
            })
            .collect();

        let export = JsonExport {
            main: &data.main,
            level: data.level.to_string(),
            summary: JsonSummary {
                nodes: data.nodes.len(),
                edges: data.edges.len(),
                test_only: data.test_only_count(),
            },
            nodes,
            edges,
        };

        let json = serde_json::to_string_pretty(&export)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        writeln!(writer, "{}", json)
    }
}
