//! Dijkstra's algorithm over a [`GraphAccess`] view.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use tracing::debug;

use crate::algo::{require_node, GraphAccess, PathEngine, PathOutcome, Weight, WeightedPath};
use crate::error::Result;
use crate::key::NodeKey;
use crate::types::EdgeId;

/// Entry of the open set.
///
/// Ordered so that `BinaryHeap` pops the cheapest entry first and, among equal costs, the
/// one discovered first. Adjacency is read in row order, so ties resolve by edge row id.
#[derive(Debug)]
struct Frontier {
    cost: f64,
    seq: u64,
    node: NodeKey,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Dijkstra search for non-negative edge weights.
///
/// Adjacency is fetched lazily, one `successors` call per settled node, so only the part
/// of the graph closer than the target is ever read.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dijkstra;

struct Search {
    heap: BinaryHeap<Frontier>,
    dist: HashMap<NodeKey, f64>,
    came_from: HashMap<NodeKey, (NodeKey, EdgeId)>,
    settled: HashSet<NodeKey>,
    seq: u64,
}

impl Search {
    fn new(source: &NodeKey) -> Self {
        let mut search = Search {
            heap: BinaryHeap::new(),
            dist: HashMap::new(),
            came_from: HashMap::new(),
            settled: HashSet::new(),
            seq: 0,
        };
        search.dist.insert(source.clone(), 0.0);
        search.push(source.clone(), 0.0);
        search
    }

    fn push(&mut self, node: NodeKey, cost: f64) {
        self.heap.push(Frontier {
            cost,
            seq: self.seq,
            node,
        });
        self.seq += 1;
    }

    /// Pops the next unsettled node and marks it settled.
    fn settle_next(&mut self) -> Option<(NodeKey, f64)> {
        while let Some(Frontier { cost, node, .. }) = self.heap.pop() {
            if self.settled.insert(node.clone()) {
                return Some((node, cost));
            }
        }
        None
    }

    /// Relaxes every edge leaving `node`, skipping targets beyond `cutoff`.
    fn relax<G: GraphAccess + ?Sized>(
        &mut self,
        graph: &G,
        node: &NodeKey,
        cost: f64,
        weight: &Weight,
        cutoff: Option<f64>,
    ) -> Result<()> {
        for edge in graph.successors(node) {
            let edge = edge?;
            if self.settled.contains(&edge.v) {
                continue;
            }
            let next = cost + weight.of(&edge)?;
            if cutoff.is_some_and(|limit| next > limit) {
                continue;
            }
            let improves = self.dist.get(&edge.v).map_or(true, |known| next < *known);
            if improves {
                self.dist.insert(edge.v.clone(), next);
                self.came_from
                    .insert(edge.v.clone(), (node.clone(), edge.id));
                self.push(edge.v, next);
            }
        }
        Ok(())
    }

    fn path_to(&self, target: &NodeKey, total_weight: f64) -> WeightedPath {
        let mut nodes = vec![target.clone()];
        let mut edges = Vec::new();
        let mut current = target;
        while let Some((parent, edge)) = self.came_from.get(current) {
            nodes.push(parent.clone());
            edges.push(*edge);
            current = parent;
        }
        nodes.reverse();
        edges.reverse();
        WeightedPath {
            nodes,
            edges,
            total_weight,
        }
    }
}

impl PathEngine for Dijkstra {
    fn shortest_path<G: GraphAccess + ?Sized>(
        &self,
        graph: &G,
        source: &NodeKey,
        target: &NodeKey,
        weight: &Weight,
    ) -> Result<PathOutcome> {
        require_node(graph, source)?;
        require_node(graph, target)?;
        let mut search = Search::new(source);
        while let Some((node, cost)) = search.settle_next() {
            if &node == target {
                debug!(
                    settled = search.settled.len(),
                    total_weight = cost,
                    "algo.dijkstra.found"
                );
                return Ok(PathOutcome::Found(search.path_to(target, cost)));
            }
            search.relax(graph, &node, cost, weight, None)?;
        }
        debug!(settled = search.settled.len(), "algo.dijkstra.no_path");
        Ok(PathOutcome::NoPathFound)
    }
}

impl Dijkstra {
    /// Distance from `source` to every reachable node, nearest first.
    ///
    /// Nodes farther than `cutoff` are left out. The source itself is reported at 0.
    pub fn single_source_distances<G: GraphAccess + ?Sized>(
        &self,
        graph: &G,
        source: &NodeKey,
        weight: &Weight,
        cutoff: Option<f64>,
    ) -> Result<Vec<(NodeKey, f64)>> {
        require_node(graph, source)?;
        let mut search = Search::new(source);
        let mut order = Vec::new();
        while let Some((node, cost)) = search.settle_next() {
            search.relax(graph, &node, cost, weight, cutoff)?;
            order.push((node, cost));
        }
        Ok(order)
    }
}
