use crate::algo::{BoxedIter, Dijkstra, GraphAccess, PathEngine, PathOutcome, Weight};
use crate::error::Result;
use crate::graph::GraphDb;
use crate::key::NodeKey;
use crate::types::{EdgeRecord, NodeRecord};

impl GraphAccess for GraphDb {
    fn has_node(&self, key: &NodeKey) -> Result<bool> {
        GraphDb::has_node(self, key)
    }

    fn node(&self, key: &NodeKey) -> Result<NodeRecord> {
        GraphDb::node(self, key)
    }

    fn nodes(&self) -> BoxedIter<'_, NodeRecord> {
        Box::new(GraphDb::nodes(self))
    }

    fn successors(&self, u: &NodeKey) -> BoxedIter<'_, EdgeRecord> {
        Box::new(GraphDb::successors(self, u))
    }

    fn has_edge(&self, u: &NodeKey, v: &NodeKey) -> Result<bool> {
        GraphDb::has_edge(self, u, v)
    }
}

impl GraphDb {
    /// Dijkstra shortest path from `source` to `target`, weighted by the edge attribute `key`.
    ///
    /// Every traversed edge must carry a numeric `key`; use [`GraphDb::shortest_path_by`]
    /// with [`Weight::or_else`] to supply a default.
    pub fn shortest_path(
        &self,
        source: &NodeKey,
        target: &NodeKey,
        key: &str,
    ) -> Result<PathOutcome> {
        self.shortest_path_by(source, target, &Weight::attribute(key))
    }

    /// Dijkstra shortest path with an explicit [`Weight`].
    pub fn shortest_path_by(
        &self,
        source: &NodeKey,
        target: &NodeKey,
        weight: &Weight,
    ) -> Result<PathOutcome> {
        Dijkstra.shortest_path(self, source, target, weight)
    }

    /// Distance from `source` to every node reachable within `cutoff`, nearest first.
    pub fn single_source_distances(
        &self,
        source: &NodeKey,
        weight: &Weight,
        cutoff: Option<f64>,
    ) -> Result<Vec<(NodeKey, f64)>> {
        Dijkstra.single_source_distances(self, source, weight, cutoff)
    }
}
