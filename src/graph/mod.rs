//! Generic hierarchical graph primitives.
//!
//! This module provides the [`HierarchicalDigraph`] container together with
//! the [`Node`] capability every stored node implements. Edges are weighted
//! and roll up from children to their parents.
//!
//! # Example
//!
//! ```rust
//! use depscope::depgraph::{DepNode, Module};
//! use depscope::graph::HierarchicalDigraph;
//!
//! let mut graph = HierarchicalDigraph::new();
//! graph.add_node(DepNode::Module(Module::new("example.com/a", "v1.0.0"))).unwrap();
//! graph.add_node(DepNode::Module(Module::new("example.com/b", "v1.2.0"))).unwrap();
//! graph.add_edge("module example.com/a", "module example.com/b").unwrap();
//!
//! assert_eq!(graph.node_count(), 2);
//! assert_eq!(graph.edge_weight("module example.com/a", "module example.com/b"), 1);
//! ```

mod digraph;
mod node;

pub use digraph::{GraphError, HierarchicalDigraph, Result};
pub use node::{Node, NodeRef, NodeRefs};
