//! Node capability and weighted adjacency views.
//!
//! Every node kind stored in a [`HierarchicalDigraph`](super::HierarchicalDigraph)
//! implements [`Node`]. Adjacency itself lives inside the digraph; callers
//! observe it through [`NodeRefs`], a name-sorted snapshot that carries the
//! multiplicity of each reference.

use petgraph::stable_graph::NodeIndex;

/// Capability shared by every node of a hierarchical digraph.
///
/// Nodes never hold references to each other. The parent relation is
/// declared by hash and resolved by the graph, which is the sole owner of
/// all nodes.
pub trait Node {
    /// Stable dependency path of the node (e.g. `"github.com/foo/bar"`).
    fn name(&self) -> &str;

    /// Level-qualified unique key (e.g. `"module github.com/foo/bar"`).
    fn hash(&self) -> String;

    /// Hash of the node this one nests under, if any.
    fn parent_hash(&self) -> Option<String>;

    /// Whether finer-grained nodes may nest under this one.
    fn can_have_children(&self) -> bool;
}

/// A reference to a graph member together with its multiplicity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    /// Index of the referenced node inside its graph
    pub index: NodeIndex,
    /// Level-qualified hash of the referenced node
    pub hash: String,
    /// Name of the referenced node
    pub name: String,
    /// Edge weight for adjacency listings, 1 for plain listings
    pub weight: usize,
}

/// A deterministic, name-sorted collection of node references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeRefs {
    refs: Vec<NodeRef>,
}

impl NodeRefs {
    /// Builds a collection, sorting references by name then hash.
    pub(crate) fn from_unsorted(mut refs: Vec<NodeRef>) -> Self {
        refs.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.hash.cmp(&b.hash)));
        Self { refs }
    }

    /// Returns the number of referenced nodes.
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Returns true if no node is referenced.
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Looks up a reference by node hash.
    pub fn get(&self, hash: &str) -> Option<&NodeRef> {
        self.refs.iter().find(|r| r.hash == hash)
    }

    /// Returns true if the node with the given hash is referenced.
    pub fn contains(&self, hash: &str) -> bool {
        self.get(hash).is_some()
    }

    /// Weight of the reference to `hash`, 0 when absent.
    pub fn weight(&self, hash: &str) -> usize {
        self.get(hash).map_or(0, |r| r.weight)
    }

    /// Iterates over the references in name order.
    pub fn iter(&self) -> std::slice::Iter<'_, NodeRef> {
        self.refs.iter()
    }

    /// Names of the referenced nodes in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.refs.iter().map(|r| r.name.as_str()).collect()
    }

    /// Hashes of the referenced nodes, in name order.
    pub fn hashes(&self) -> Vec<String> {
        self.refs.iter().map(|r| r.hash.clone()).collect()
    }
}

impl IntoIterator for NodeRefs {
    type Item = NodeRef;
    type IntoIter = std::vec::IntoIter<NodeRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.refs.into_iter()
    }
}

impl<'a> IntoIterator for &'a NodeRefs {
    type Item = &'a NodeRef;
    type IntoIter = std::slice::Iter<'a, NodeRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.refs.iter()
    }
}
