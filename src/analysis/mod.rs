//! Statistics over a dependency graph.
//!
//! # Features
//!
//! - Direct and indirect dependency counts
//! - Mean and maximum age of the selected versions, with a per-month distribution
//! - Mean and maximum inbound arity (how many modules consume a dependency)
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use depscope::analysis::DepAnalysis;
//! use depscope::depgraph::DepGraph;
//! use depscope::parser::ModuleInfo;
//!
//! let graph = DepGraph::new(ModuleInfo::new("example.com/app", ""));
//! let analysis = DepAnalysis::new(&graph, Utc::now());
//! assert_eq!(analysis.direct_dependency_count, 0);
//! println!("{}", analysis);
//! ```

pub mod stats;

pub use stats::DepAnalysis;
