//! Two-level weighted digraph built on petgraph.
//!
//! Nodes live at a depth given by the length of their parent chain. Edges
//! only connect nodes of equal depth, and every edge between two children
//! rolls up into an edge between their parents. The weight of a parent edge
//! counts the child edges that produced it.

use std::collections::HashMap;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use tracing::debug;

use super::node::{Node, NodeRef, NodeRefs};

/// Structural errors raised by [`HierarchicalDigraph`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// No node with this hash is a member of the graph.
    #[error("node not found: node hash {hash:?}")]
    NodeNotFound { hash: String },

    /// A node with the same hash is already a member of the graph.
    #[error("node with identical hash already exists in graph: node hash {hash:?}")]
    NodeAlreadyExists { hash: String },

    /// The declared parent does not accept children.
    #[error("node {parent:?} cannot contain child nodes")]
    ChildlessParent { parent: String },

    /// Source and target of an edge are the same node.
    #[error("self-edges are not allowed: node hash {hash:?}")]
    SelfEdge { hash: String },

    /// Source and target of an edge sit at different depths.
    #[error(
        "edges not allowed between nodes of different hierarchical levels: \
         node {src:?} ({src_depth}) - node {dst:?} ({dst_depth})"
    )]
    CrossLevel {
        src: String,
        src_depth: usize,
        dst: String,
        dst_depth: usize,
    },

    /// The edge to delete does not exist.
    #[error("edge not found: {src:?} -> {dst:?}")]
    EdgeNotFound { src: String, dst: String },
}

/// Result type alias for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Clone)]
struct Slot<N> {
    node: N,
    parent: Option<NodeIndex>,
    children: Option<Vec<NodeIndex>>,
}

/// A directed graph whose nodes nest at most one level deep.
///
/// The graph owns every node. Parents are tracked by index, children by an
/// index list on the parent slot, so no reference cycles exist. Cloning the
/// graph yields an independent deep copy.
#[derive(Debug, Clone)]
pub struct HierarchicalDigraph<N> {
    graph: StableDiGraph<Slot<N>, usize>,
    members: HashMap<String, NodeIndex>,
}

impl<N: Node> Default for HierarchicalDigraph<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Node> HierarchicalDigraph<N> {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self {
            graph: StableDiGraph::default(),
            members: HashMap::new(),
        }
    }

    /// Adds a node to the graph.
    ///
    /// Fails if a node with the same hash is already present or if the node
    /// declares a parent that is not a member yet. On success the node is
    /// appended to its parent's children.
    pub fn add_node(&mut self, node: N) -> Result<NodeIndex> {
        let hash = node.hash();
        debug!(node = %hash, "adding node to graph");

        if self.members.contains_key(&hash) {
            return Err(GraphError::NodeAlreadyExists { hash });
        }

        let parent = match node.parent_hash() {
            Some(parent_hash) => {
                let Some(&pidx) = self.members.get(&parent_hash) else {
                    return Err(GraphError::NodeNotFound { hash: parent_hash });
                };
                if self.graph[pidx].children.is_none() {
                    return Err(GraphError::ChildlessParent {
                        parent: parent_hash,
                    });
                }
                Some(pidx)
            }
            None => None,
        };

        let children = node.can_have_children().then(Vec::new);
        let idx = self.graph.add_node(Slot {
            node,
            parent,
            children,
        });
        if let Some(pidx) = parent {
            if let Some(children) = self.graph[pidx].children.as_mut() {
                children.push(idx);
            }
        }
        self.members.insert(hash, idx);
        Ok(idx)
    }

    /// Deletes a node together with its children and every incident edge.
    ///
    /// If the parent of the deleted node is left without children it is
    /// deleted as well, recursively up the ancestor chain.
    pub fn delete_node(&mut self, hash: &str) -> Result<()> {
        let idx = self.index_or_err(hash)?;
        debug!(node = %hash, "deleting node from graph");

        let parent = self.graph[idx].parent;
        self.remove_subtree(idx);

        if let Some(pidx) = parent {
            let emptied = self.graph[pidx]
                .children
                .as_ref()
                .is_some_and(|c| c.is_empty());
            if emptied {
                let parent_hash = self.graph[pidx].node.hash();
                debug!(node = %parent_hash, "deleting parent left without children");
                self.delete_node(&parent_hash)?;
            }
        }
        Ok(())
    }

    /// Adds an edge between two nodes of the same depth.
    ///
    /// The edge is rolled up through the ancestor chain: each pair of
    /// parents gains one unit of weight until the parents coincide or the
    /// top level is reached.
    pub fn add_edge(&mut self, src: &str, dst: &str) -> Result<()> {
        let (mut s, mut d) = self.edge_endpoints(src, dst)?;

        loop {
            if s == d {
                break;
            }
            debug!(
                source = %self.graph[s].node.hash(),
                target = %self.graph[d].node.hash(),
                "adding edge to graph"
            );
            match self.graph.find_edge(s, d) {
                Some(e) => self.graph[e] += 1,
                None => {
                    self.graph.add_edge(s, d, 1);
                }
            }

            match (self.graph[s].parent, self.graph[d].parent) {
                (Some(ps), Some(pd)) => {
                    s = ps;
                    d = pd;
                }
                _ => break,
            }
        }
        Ok(())
    }

    /// Removes one unit of weight from an edge and from every rolled-up
    /// ancestor edge. An edge disappears once its weight reaches zero.
    pub fn delete_edge(&mut self, src: &str, dst: &str) -> Result<()> {
        let (s, d) = self.edge_endpoints(src, dst)?;
        if self.graph.find_edge(s, d).is_none() {
            return Err(GraphError::EdgeNotFound {
                src: src.to_string(),
                dst: dst.to_string(),
            });
        }
        self.release_edge(s, d, 1);
        Ok(())
    }

    /// Returns the node with the given hash.
    pub fn get_node(&self, hash: &str) -> Result<&N> {
        let idx = self.index_or_err(hash)?;
        Ok(&self.graph[idx].node)
    }

    /// Returns a mutable reference to the node with the given hash.
    pub fn get_node_mut(&mut self, hash: &str) -> Result<&mut N> {
        let idx = self.index_or_err(hash)?;
        Ok(&mut self.graph[idx].node)
    }

    /// Returns every node whose parent chain has length `depth`, sorted by name.
    pub fn get_level(&self, depth: usize) -> NodeRefs {
        let refs = self
            .graph
            .node_indices()
            .filter(|&idx| self.depth(idx) == depth)
            .map(|idx| self.node_ref(idx, 1))
            .collect();
        NodeRefs::from_unsorted(refs)
    }

    /// Returns true if a node with the given hash is a member.
    pub fn contains(&self, hash: &str) -> bool {
        self.members.contains_key(hash)
    }

    /// Nodes with an edge towards the given node.
    pub fn predecessors(&self, hash: &str) -> Result<NodeRefs> {
        let idx = self.index_or_err(hash)?;
        Ok(self.adjacent(idx, Direction::Incoming))
    }

    /// Nodes the given node has an edge towards.
    pub fn successors(&self, hash: &str) -> Result<NodeRefs> {
        let idx = self.index_or_err(hash)?;
        Ok(self.adjacent(idx, Direction::Outgoing))
    }

    /// Children nested under the given node. Empty for nodes that cannot
    /// have children.
    pub fn children(&self, hash: &str) -> Result<NodeRefs> {
        let idx = self.index_or_err(hash)?;
        let refs = self.graph[idx]
            .children
            .iter()
            .flatten()
            .map(|&c| self.node_ref(c, 1))
            .collect();
        Ok(NodeRefs::from_unsorted(refs))
    }

    /// The node the given node nests under, if any.
    pub fn parent(&self, hash: &str) -> Result<Option<&N>> {
        let idx = self.index_or_err(hash)?;
        Ok(self.graph[idx].parent.map(|p| &self.graph[p].node))
    }

    /// Weight of the edge between two nodes, 0 when absent.
    pub fn edge_weight(&self, src: &str, dst: &str) -> usize {
        match (self.members.get(src), self.members.get(dst)) {
            (Some(&s), Some(&d)) => self
                .graph
                .find_edge(s, d)
                .map_or(0, |e| self.graph[e]),
            _ => 0,
        }
    }

    /// Depth of a member node, `None` if the hash is unknown.
    pub fn node_depth(&self, hash: &str) -> Option<usize> {
        self.members.get(hash).map(|&idx| self.depth(idx))
    }

    /// Returns the number of member nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of distinct edges across all levels.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Checks if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Iterates over all member nodes in no particular order.
    pub fn nodes(&self) -> impl Iterator<Item = &N> {
        self.graph.node_weights().map(|slot| &slot.node)
    }

    fn index_or_err(&self, hash: &str) -> Result<NodeIndex> {
        self.members
            .get(hash)
            .copied()
            .ok_or_else(|| GraphError::NodeNotFound {
                hash: hash.to_string(),
            })
    }

    fn depth(&self, mut idx: NodeIndex) -> usize {
        let mut depth = 0;
        while let Some(parent) = self.graph[idx].parent {
            depth += 1;
            idx = parent;
        }
        depth
    }

    fn node_ref(&self, idx: NodeIndex, weight: usize) -> NodeRef {
        let node = &self.graph[idx].node;
        NodeRef {
            index: idx,
            hash: node.hash(),
            name: node.name().to_string(),
            weight,
        }
    }

    fn adjacent(&self, idx: NodeIndex, direction: Direction) -> NodeRefs {
        let refs = self
            .graph
            .edges_directed(idx, direction)
            .map(|edge| {
                let other = match direction {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                self.node_ref(other, *edge.weight())
            })
            .collect();
        NodeRefs::from_unsorted(refs)
    }

    fn edge_endpoints(&self, src: &str, dst: &str) -> Result<(NodeIndex, NodeIndex)> {
        let s = self.index_or_err(src)?;
        let d = self.index_or_err(dst)?;
        if s == d {
            return Err(GraphError::SelfEdge {
                hash: src.to_string(),
            });
        }

        let (src_depth, dst_depth) = (self.depth(s), self.depth(d));
        if src_depth != dst_depth {
            return Err(GraphError::CrossLevel {
                src: src.to_string(),
                src_depth,
                dst: dst.to_string(),
                dst_depth,
            });
        }
        Ok((s, d))
    }

    /// Decrements an edge and its rolled-up ancestors by `amount`.
    fn release_edge(&mut self, mut s: NodeIndex, mut d: NodeIndex, amount: usize) {
        loop {
            if s == d {
                break;
            }
            if let Some(e) = self.graph.find_edge(s, d) {
                if self.graph[e] <= amount {
                    debug!(
                        source = %self.graph[s].node.hash(),
                        target = %self.graph[d].node.hash(),
                        "removing edge from graph"
                    );
                    self.graph.remove_edge(e);
                } else {
                    self.graph[e] -= amount;
                }
            }

            match (self.graph[s].parent, self.graph[d].parent) {
                (Some(ps), Some(pd)) => {
                    s = ps;
                    d = pd;
                }
                _ => break,
            }
        }
    }

    /// Removes a node after its children, releasing every incident edge.
    fn remove_subtree(&mut self, idx: NodeIndex) {
        let mut children = self.graph[idx].children.clone().unwrap_or_default();
        children.sort_by(|a, b| self.graph[*a].node.name().cmp(self.graph[*b].node.name()));
        for child in children {
            self.remove_subtree(child);
        }

        let incident: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .chain(self.graph.edges_directed(idx, Direction::Incoming))
            .map(|edge| (edge.source(), edge.target(), *edge.weight()))
            .collect();
        for (s, d, weight) in incident {
            self.release_edge(s, d, weight);
        }

        if let Some(pidx) = self.graph[idx].parent {
            if let Some(siblings) = self.graph[pidx].children.as_mut() {
                siblings.retain(|&c| c != idx);
            }
        }

        if let Some(slot) = self.graph.remove_node(idx) {
            debug!(node = %slot.node.hash(), "removed node from members");
            self.members.remove(&slot.node.hash());
        }
    }
}
