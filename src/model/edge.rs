//! Directed edge in the multigraph.

use serde::{Deserialize, Serialize};
use super::Key;

/// Edge id used by [`Edge::unlabeled`] when the caller has no id of its own.
pub const DEFAULT_EDGE_ID: Key = Key::MAX;

/// Role a vertex plays in an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexRole {
    /// The vertex is the edge's source (outgoing edge).
    Source,
    /// The vertex is the edge's target (incoming edge).
    Target,
    /// Either role.
    Any,
}

/// A directed edge. `(source, target, id)` identifies one edge instance;
/// several edges may share a `(source, target)` pair as long as ids differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub source: Key,
    pub target: Key,
    pub id: Key,
}

impl Edge {
    pub fn new(source: Key, target: Key, id: Key) -> Self {
        Self { source, target, id }
    }

    /// Edge without a caller-assigned id.
    pub fn unlabeled(source: Key, target: Key) -> Self {
        Self::new(source, target, DEFAULT_EDGE_ID)
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

impl From<(Key, Key, Key)> for Edge {
    fn from((source, target, id): (Key, Key, Key)) -> Self {
        Self::new(source, target, id)
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})-[{}]->({})", self.source, self.id, self.target)
    }
}

/// One record of an adjacency entry: the vertex at the other end and the
/// edge id. Ordered by `(neighbor, edge_id)`, which is the order records are
/// kept in on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Neighborship {
    pub neighbor: Key,
    pub edge_id: Key,
}

impl Neighborship {
    pub fn new(neighbor: Key, edge_id: Key) -> Self {
        Self { neighbor, edge_id }
    }
}
