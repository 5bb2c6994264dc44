//! Evaluation of query expressions against a [`DepGraph`].
//!
//! Expressions evaluate to a set of node names at a chosen [`Level`]. Only
//! `shared()` mutates the graph while evaluating, which is why evaluation
//! takes `&mut self` and is named [`DepGraph::evaluate_and_prune`].

use std::collections::{BTreeSet, VecDeque};

use tracing::{debug, warn};

use crate::graph::Node;
use crate::query::{BinaryOp, Expr, ExprKind, Span};

use super::{DepGraph, Level, Result};

/// Names of the nodes matched by a query, in sorted order.
pub type NodeSet = BTreeSet<String>;

/// Reason an expression could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryErrorKind {
    #[error("cannot process integers, booleans or lists")]
    InvalidOperand,

    #[error("expression contains more than one ':' character")]
    TooManyAnnotations,

    #[error("undefined path annotation '{0}'")]
    UnknownAnnotation(String),

    #[error("expected {expected} argument(s) but received {received}")]
    ArgumentCount {
        expected: &'static str,
        received: usize,
    },

    #[error("expected an integer as second argument but got '{0}'")]
    NotAnInteger(String),

    #[error("unknown function {0:?}")]
    UnknownFunction(String),
}

/// A semantic error in a parsed query, tied to the offending expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{span}: {expr} - {kind}")]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub span: Span,
    /// Rendered form of the offending expression
    pub expr: String,
}

impl QueryError {
    fn new(kind: QueryErrorKind, expr: &Expr) -> Self {
        Self {
            kind,
            span: expr.span,
            expr: expr.to_string(),
        }
    }
}

/// A parsed path pattern with its optional annotation.
struct PathPattern<'a> {
    prefix: Option<&'a str>,
    exact: &'a str,
    with_tests: bool,
}

impl<'a> PathPattern<'a> {
    fn parse(value: &'a str, expr: &Expr) -> std::result::Result<Self, QueryError> {
        let mut parts = value.split(':');
        let path = parts.next().unwrap_or_default();
        let with_tests = match (parts.next(), parts.next()) {
            (None, _) => false,
            (Some("test"), None) => true,
            (Some(annotation), None) => {
                return Err(QueryError::new(
                    QueryErrorKind::UnknownAnnotation(annotation.to_string()),
                    expr,
                ))
            }
            (Some(_), Some(_)) => {
                return Err(QueryError::new(QueryErrorKind::TooManyAnnotations, expr))
            }
        };

        Ok(Self {
            prefix: path.strip_suffix("/..."),
            exact: path,
            with_tests,
        })
    }

    fn matches(&self, name: &str) -> bool {
        match self.prefix {
            Some(prefix) => {
                name == prefix
                    || name
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            None => name == self.exact,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Forwards,
    Backwards,
}

impl DepGraph {
    /// Commits a query: every node at `level` whose name the query does
    /// not match is deleted. Returns the number of nodes deleted.
    pub fn apply_query(&mut self, expr: &Expr, level: Level) -> Result<usize> {
        let targets = self.evaluate_and_prune(expr, level)?;

        debug!("Removing unselected nodes");
        let mut removed = 0;
        for node in self.level(level) {
            if targets.contains(&node.name) || !self.graph().contains(&node.hash) {
                continue;
            }
            debug!(node = %node.name, "Removing node");
            self.graph_mut().delete_node(&node.hash)?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Evaluates an expression into the names of matching nodes at `level`.
    ///
    /// `shared()` calls delete the leaves they prune from the graph, so the
    /// graph may shrink even when the caller only wants the set.
    pub fn evaluate_and_prune(&mut self, expr: &Expr, level: Level) -> Result<NodeSet> {
        debug!(query = %expr, %level, "Computing matching nodes");
        let set = match &expr.kind {
            ExprKind::Bool(_) | ExprKind::Integer(_) | ExprKind::List(_) => {
                return Err(QueryError::new(QueryErrorKind::InvalidOperand, expr).into())
            }
            ExprKind::String(value) => self.match_names(value, expr, level)?,
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.evaluate_and_prune(lhs, level)?;
                let rhs = self.evaluate_and_prune(rhs, level)?;
                // A `shared()` on the right may have deleted names the left matched.
                let mut set = combine(*op, lhs, rhs);
                set.retain(|name| self.graph().contains(&level.hash(name)));
                if set.is_empty() {
                    warn!(query = %expr, "Empty query result");
                }
                set
            }
            ExprKind::Func { name, args } => match name.as_str() {
                "deps" => self.traverse(expr, args, Direction::Forwards, level)?,
                "rdeps" => self.traverse(expr, args, Direction::Backwards, level)?,
                "shared" => self.shared(expr, args, level)?,
                _ => {
                    return Err(QueryError::new(
                        QueryErrorKind::UnknownFunction(name.clone()),
                        expr,
                    )
                    .into())
                }
            },
        };
        debug!(query = %expr, nodes = set.len(), "Found node set");
        Ok(set)
    }

    fn match_names(&self, value: &str, expr: &Expr, level: Level) -> Result<NodeSet> {
        let pattern = PathPattern::parse(value, expr)?;

        let mut set = NodeSet::new();
        for node in self.level(level) {
            let Ok(dep) = self.graph().get_node(&node.hash) else {
                continue;
            };
            if !pattern.matches(dep.name()) {
                continue;
            }
            if !pattern.with_tests && dep.is_test_only() {
                debug!(name = %node.name, "Discarded node as it is a test dependency");
                continue;
            }
            set.insert(node.name);
        }

        if set.is_empty() {
            warn!(query = %expr, "Empty query result");
        }
        Ok(set)
    }

    /// `deps(X[, depth])` and `rdeps(X[, depth])`.
    fn traverse(
        &mut self,
        expr: &Expr,
        args: &[Expr],
        direction: Direction,
        level: Level,
    ) -> Result<NodeSet> {
        if args.is_empty() || args.len() > 2 {
            return Err(QueryError::new(
                QueryErrorKind::ArgumentCount {
                    expected: "1 or 2",
                    received: args.len(),
                },
                expr,
            )
            .into());
        }
        let max_depth = match args.get(1) {
            None => None,
            Some(Expr {
                kind: ExprKind::Integer(depth),
                ..
            }) => Some(*depth),
            Some(other) => {
                return Err(QueryError::new(
                    QueryErrorKind::NotAnInteger(other.to_string()),
                    expr,
                )
                .into())
            }
        };
        debug!(?max_depth, "Maximum depth for traversal set");

        let seeds = self.evaluate_and_prune(&args[0], level)?;
        let mut set = NodeSet::new();
        for seed in seeds {
            if !self.graph().contains(&level.hash(&seed)) {
                debug!(name = %seed, "Skipping seed deleted by an earlier prune");
                continue;
            }
            let mut seen = BTreeSet::from([seed.clone()]);
            let mut todo = VecDeque::from([(seed, 0usize)]);

            while let Some((name, depth)) = todo.pop_front() {
                set.insert(name.clone());
                if max_depth.is_some_and(|max| depth >= max) {
                    continue;
                }

                let hash = level.hash(&name);
                let next = match direction {
                    Direction::Forwards => self.graph().successors(&hash)?,
                    Direction::Backwards => self.graph().predecessors(&hash)?,
                };
                for dep in next {
                    if seen.insert(dep.name.clone()) {
                        todo.push_back((dep.name, depth + 1));
                    }
                }
            }
        }

        if set.is_empty() {
            warn!(query = %expr, "Empty query result");
        }
        Ok(set)
    }

    /// `shared(X)`.
    fn shared(&mut self, expr: &Expr, args: &[Expr], level: Level) -> Result<NodeSet> {
        if args.len() != 1 {
            return Err(QueryError::new(
                QueryErrorKind::ArgumentCount {
                    expected: "exactly 1",
                    received: args.len(),
                },
                expr,
            )
            .into());
        }
        let set = self.evaluate_and_prune(&args[0], level)?;
        let set = self.prune_private_leaves(set, level)?;

        if set.is_empty() {
            warn!(query = %expr, "Empty query result");
        }
        Ok(set)
    }

    /// Repeatedly removes members of `set` that have no successor in the
    /// set and a single predecessor in the set, deleting them from the
    /// graph as well. The sole predecessor of each removed node is checked
    /// in turn, so private chains collapse onto their first shared node.
    pub fn prune_private_leaves(
        &mut self,
        mut set: NodeSet,
        level: Level,
    ) -> Result<NodeSet> {
        let mut todo = VecDeque::new();
        for name in &set {
            if self.private_leaf_predecessor(&set, name, level)?.is_some() {
                todo.push_back(name.clone());
            }
        }

        while let Some(name) = todo.pop_front() {
            if !set.contains(&name) {
                continue;
            }
            let Some(pred) = self.private_leaf_predecessor(&set, &name, level)? else {
                continue;
            };

            debug!(name = %name, "Removing node from set");
            set.remove(&name);
            self.graph_mut().delete_node(&level.hash(&name))?;

            if self.private_leaf_predecessor(&set, &pred, level)?.is_some() {
                todo.push_back(pred);
            }
        }
        Ok(set)
    }

    /// If `name` is a private leaf of `set`, returns its sole in-set
    /// predecessor.
    fn private_leaf_predecessor(
        &self,
        set: &NodeSet,
        name: &str,
        level: Level,
    ) -> Result<Option<String>> {
        let hash = level.hash(name);
        if !self.graph().contains(&hash) {
            return Ok(None);
        }

        let successors = self.graph().successors(&hash)?;
        if successors.iter().any(|s| set.contains(&s.name)) {
            return Ok(None);
        }

        let predecessors = self.graph().predecessors(&hash)?;
        let mut in_set = predecessors.iter().filter(|p| set.contains(&p.name));
        match (in_set.next(), in_set.next()) {
            (Some(pred), None) => Ok(Some(pred.name.clone())),
            _ => Ok(None),
        }
    }
}

fn combine(op: BinaryOp, lhs: NodeSet, rhs: NodeSet) -> NodeSet {
    match op {
        BinaryOp::Union => lhs.union(&rhs).cloned().collect(),
        BinaryOp::Intersect => lhs.intersection(&rhs).cloned().collect(),
        BinaryOp::Subtract => lhs.difference(&rhs).cloned().collect(),
        BinaryOp::Delta => lhs.symmetric_difference(&rhs).cloned().collect(),
    }
}
