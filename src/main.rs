use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use depscope::analysis::DepAnalysis;
use depscope::depgraph::{
    ArbitraryModules, DepGraph, Filter, Level, NonSharedModules, QueryFilter, Target,
    TargetModules,
};
use depscope::export::{export, ExportData, ExportFormat};
use depscope::parser::{parse_modules_file, parse_packages_file, PackageInfo};
use depscope::reveal::Replacements;

#[derive(Parser)]
#[command(name = "depscope")]
#[command(version)]
#[command(
    about = "Hierarchical dependency graph analyzer with a set-based query language",
    long_about = None
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Metadata files the dependency graph is built from.
#[derive(clap::Args)]
struct Inputs {
    /// Module records as emitted by `go list -m -json all`
    #[arg(short, long)]
    modules: PathBuf,

    /// Package records as emitted by `go list -deps -test -json ./...`
    #[arg(short, long)]
    packages: Option<PathBuf>,

    /// Requirement lines as emitted by `go mod graph`
    #[arg(long)]
    mod_graph: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reduce the dependency graph with a query and export the result
    Graph {
        /// Query selecting the nodes to keep, e.g. `deps(example.com/app) - test.com/...`
        query: String,

        #[command(flatten)]
        inputs: Inputs,

        /// Evaluate the query against packages instead of modules
        #[arg(long)]
        package_level: bool,

        /// Modules to drop before querying
        #[arg(long = "drop", value_name = "MODULE")]
        drop_modules: Vec<String>,

        /// Only keep chains leading to MODULE[@VERSION]
        #[arg(long = "target", value_name = "MODULE[@VERSION]")]
        targets: Vec<String>,

        /// Prune modules that only a single other module depends on
        #[arg(long)]
        prune_unshared: bool,

        /// Output format (json, csv)
        #[arg(short, long, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print statistics about the dependency graph
    Analyse {
        #[command(flatten)]
        inputs: Inputs,

        /// Print the statistics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the `replace` directives declared by dependencies
    Reveal {
        #[command(flatten)]
        inputs: Inputs,

        /// Only show replacements declared by these modules
        #[arg(short, long, value_delimiter = ',', value_name = "MODULE")]
        sources: Vec<String>,

        /// Only show replacements of these modules
        #[arg(short, long, value_delimiter = ',', value_name = "MODULE")]
        targets: Vec<String>,
    },
    /// Show version information
    Version,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("DEPSCOPE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "depscope=debug"
        } else {
            "depscope=warn"
        })
    });

    let format = env::var("DEPSCOPE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(io::stderr))
                .init();
        }
    }
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn load_graph(inputs: &Inputs) -> Result<DepGraph> {
    info!(path = %inputs.modules.display(), "Loading module metadata");
    let modules = parse_modules_file(&inputs.modules)
        .with_context(|| format!("failed to load modules from {}", inputs.modules.display()))?;

    let packages: Vec<PackageInfo> = match &inputs.packages {
        Some(path) => {
            info!(path = %path.display(), "Loading package metadata");
            parse_packages_file(path)
                .with_context(|| format!("failed to load packages from {}", path.display()))?
        }
        None => Vec::new(),
    };

    let mod_graph = inputs.mod_graph.as_deref().map(read_file).transpose()?;

    let graph = DepGraph::build(&modules, &packages, mod_graph.as_deref())
        .context("failed to build the dependency graph")?;
    info!(
        modules = graph.modules().len(),
        packages = graph.packages().len(),
        "Built dependency graph"
    );
    Ok(graph)
}

fn parse_target(raw: &str) -> Target {
    match raw.split_once('@') {
        Some((module, version)) => Target::new(module, Some(version.to_string())),
        None => Target::new(raw, None),
    }
}

fn writer_for(output: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match output {
        Some(path) => Box::new(
            fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Some(Commands::Graph {
            query,
            inputs,
            package_level,
            drop_modules,
            targets,
            prune_unshared,
            format,
            output,
        }) => {
            let level = if package_level {
                Level::Packages
            } else {
                Level::Modules
            };
            let mut graph = load_graph(&inputs)?;

            if !drop_modules.is_empty() {
                graph = ArbitraryModules {
                    modules: drop_modules,
                }
                .apply(graph)?;
            }
            if !targets.is_empty() {
                graph = TargetModules {
                    targets: targets.iter().map(|t| parse_target(t)).collect(),
                }
                .apply(graph)?;
            }
            if prune_unshared {
                graph = NonSharedModules::default().apply(graph)?;
            }

            info!(%query, %level, "Applying query");
            let filter = QueryFilter::parse(&query, level)
                .with_context(|| format!("invalid query '{}'", query))?;
            let graph = filter
                .apply(graph)
                .with_context(|| format!("failed to evaluate query '{}'", query))?;

            let data = ExportData::new(&graph, level);
            let mut writer = writer_for(output.as_deref())?;
            export(format, &data, &mut writer).context("failed to write graph")?;
            writer.flush()?;
        }
        Some(Commands::Analyse { inputs, json }) => {
            let graph = load_graph(&inputs)?;
            let analysis = DepAnalysis::new(&graph, Utc::now());
            if json {
                println!("{}", analysis.to_json()?);
            } else {
                print!("{}", analysis);
            }
        }
        Some(Commands::Reveal {
            inputs,
            sources,
            targets,
        }) => {
            let graph = load_graph(&inputs)?;
            let replacements = Replacements::find(&graph)
                .filter_on_offenders(&sources)
                .filter_on_originals(&targets);
            if replacements.is_empty() {
                info!("No replacements found");
            }
            print!("{}", replacements);
        }
        Some(Commands::Version) => {
            println!("depscope v{}", env!("CARGO_PKG_VERSION"));
        }
        None => {
            println!("depscope - Hierarchical dependency graph analyzer");
            println!("Run 'depscope graph <QUERY> --modules <FILE>' to reduce a dependency graph");
            println!("Run 'depscope --help' for more information");
        }
    }

    Ok(())
}
