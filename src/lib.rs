//! depscope - Hierarchical dependency graph analyzer with a set-based query language
//!
//! This crate builds a two-level graph of modules and the packages they
//! contain from resolved dependency metadata, and reduces it with queries
//! such as `deps(example.com/app) - rdeps(test.com/...:test)`.

pub mod analysis;
pub mod depgraph;
pub mod export;
pub mod graph;
pub mod parser;
pub mod query;
pub mod reveal;
