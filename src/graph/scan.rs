//! Lazy node and edge sequences.
//!
//! Each iterator pages through the table by row id (`_id > last ORDER BY _id LIMIT n`).
//! Every page is a separate, fully drained query, so no SQLite cursor outlives a call to
//! `next` and abandoning an iterator halfway leaves nothing open.

use std::collections::VecDeque;

use crate::error::Result;
use crate::graph::GraphDb;
use crate::key::NodeKey;
use crate::types::{EdgeRecord, NodeRecord};

#[derive(Clone, Debug)]
pub(crate) enum EdgeFilter {
    All,
    From(NodeKey),
    To(NodeKey),
    Between(NodeKey, NodeKey),
}

/// Lazy sequence of nodes in row order.
pub struct NodeIter<'g> {
    db: &'g GraphDb,
    last_id: i64,
    buffer: VecDeque<(i64, NodeRecord)>,
    exhausted: bool,
}

impl<'g> NodeIter<'g> {
    pub(crate) fn new(db: &'g GraphDb) -> Self {
        Self {
            db,
            last_id: i64::MIN,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    fn fill(&mut self) -> Result<()> {
        let limit = self.db.scan_page_size();
        let page = self.db.node_page(self.last_id, limit)?;
        if page.len() < limit {
            self.exhausted = true;
        }
        if let Some((id, _)) = page.last() {
            self.last_id = *id;
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl Iterator for NodeIter<'_> {
    type Item = Result<NodeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(err) = self.fill() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
        self.buffer.pop_front().map(|(_, node)| Ok(node))
    }
}

/// Lazy sequence of edges in row order, optionally restricted to one endpoint.
pub struct EdgeIter<'g> {
    db: &'g GraphDb,
    filter: EdgeFilter,
    last_id: i64,
    buffer: VecDeque<EdgeRecord>,
    exhausted: bool,
}

impl<'g> EdgeIter<'g> {
    pub(crate) fn new(db: &'g GraphDb, filter: EdgeFilter) -> Self {
        Self {
            db,
            filter,
            last_id: i64::MIN,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    fn fill(&mut self) -> Result<()> {
        let limit = self.db.scan_page_size();
        let page = self.db.edge_page(&self.filter, self.last_id, limit)?;
        if page.len() < limit {
            self.exhausted = true;
        }
        if let Some(edge) = page.last() {
            self.last_id = edge.id;
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl Iterator for EdgeIter<'_> {
    type Item = Result<EdgeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(err) = self.fill() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
