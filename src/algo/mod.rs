//! Graph algorithms written against the [`GraphAccess`] capability trait.
//!
//! Nothing in here knows about SQLite. Any type that can answer the five adjacency
//! questions below can be searched, which is how the unit tests drive the algorithms with
//! a plain in-memory graph.

mod dijkstra;

use crate::error::{GraphError, Result};
use crate::key::NodeKey;
use crate::types::{EdgeId, EdgeRecord, NodeRecord};

pub use dijkstra::Dijkstra;

/// Boxed lazy sequence handed out by [`GraphAccess`].
pub type BoxedIter<'a, T> = Box<dyn Iterator<Item = Result<T>> + 'a>;

/// Read-only adjacency view a graph algorithm needs.
pub trait GraphAccess {
    /// Whether `key` is a node of the graph.
    fn has_node(&self, key: &NodeKey) -> Result<bool>;

    /// Attributes of `key`, or [`GraphError::NodeNotFound`].
    fn node(&self, key: &NodeKey) -> Result<NodeRecord>;

    /// Every node, lazily.
    fn nodes(&self) -> BoxedIter<'_, NodeRecord>;

    /// Edges leaving `u`, lazily, in a stable order.
    fn successors(&self, u: &NodeKey) -> BoxedIter<'_, EdgeRecord>;

    /// Whether at least one edge runs from `u` to `v`.
    fn has_edge(&self, u: &NodeKey, v: &NodeKey) -> Result<bool>;
}

type Fallback = Box<dyn Fn(&EdgeRecord) -> f64 + Send + Sync>;

/// How an algorithm reads the cost of an edge.
///
/// By default the named attribute must hold a number on every edge that is traversed;
/// [`Weight::or_else`] supplies a value for edges where it is missing or null.
pub struct Weight {
    key: String,
    fallback: Option<Fallback>,
}

impl std::fmt::Debug for Weight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Weight")
            .field("key", &self.key)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl Weight {
    /// Reads the cost from the attribute `key`.
    pub fn attribute(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fallback: None,
        }
    }

    /// Uses `fallback` for edges whose attribute is missing or null.
    ///
    /// Non-numeric values are still rejected.
    pub fn or_else(mut self, fallback: impl Fn(&EdgeRecord) -> f64 + Send + Sync + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    /// Name of the weight attribute.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Cost of traversing `edge`.
    ///
    /// # Errors
    ///
    /// [`GraphError::WeightAttribute`] when the value is missing (without a fallback),
    /// not a number, or not finite; [`GraphError::InvalidArgument`] when it is negative.
    pub fn of(&self, edge: &EdgeRecord) -> Result<f64> {
        let cost = match edge.get(&self.key) {
            Some(value) => value.as_f64().ok_or_else(|| self.reject(edge, "not a number"))?,
            None => match &self.fallback {
                Some(fallback) => fallback(edge),
                None => return Err(self.reject(edge, "missing")),
            },
        };
        if !cost.is_finite() {
            return Err(self.reject(edge, "not a finite number"));
        }
        if cost < 0.0 {
            return Err(GraphError::InvalidArgument(format!(
                "edge {} has negative weight {cost} in '{}'",
                edge.id, self.key
            )));
        }
        Ok(cost)
    }

    fn reject(&self, edge: &EdgeRecord, reason: &'static str) -> GraphError {
        GraphError::WeightAttribute {
            key: self.key.clone(),
            edge: edge.id,
            reason,
        }
    }
}

/// A path found by a [`PathEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedPath {
    /// Visited nodes, source first and target last.
    pub nodes: Vec<NodeKey>,
    /// Row id of each traversed edge; one shorter than `nodes`.
    pub edges: Vec<EdgeId>,
    /// Sum of the traversed edge weights.
    pub total_weight: f64,
}

/// Result of a point-to-point search.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum PathOutcome {
    /// The target is reachable.
    Found(WeightedPath),
    /// The target is not reachable from the source.
    NoPathFound,
}

impl PathOutcome {
    /// Whether a path was found.
    pub fn is_found(&self) -> bool {
        matches!(self, PathOutcome::Found(_))
    }

    /// The path, if one was found.
    pub fn into_path(self) -> Option<WeightedPath> {
        match self {
            PathOutcome::Found(path) => Some(path),
            PathOutcome::NoPathFound => None,
        }
    }
}

/// A shortest-path strategy.
pub trait PathEngine {
    /// Cheapest path from `source` to `target` under `weight`.
    ///
    /// # Errors
    ///
    /// [`GraphError::NodeNotFound`] if either endpoint is not in the graph, plus any error
    /// raised while reading weights or adjacency.
    fn shortest_path<G: GraphAccess + ?Sized>(
        &self,
        graph: &G,
        source: &NodeKey,
        target: &NodeKey,
        weight: &Weight,
    ) -> Result<PathOutcome>;
}

pub(crate) fn require_node<G: GraphAccess + ?Sized>(graph: &G, key: &NodeKey) -> Result<()> {
    if graph.has_node(key)? {
        Ok(())
    } else {
        Err(GraphError::NodeNotFound(key.to_string()))
    }
}
