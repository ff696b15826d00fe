//! # Graph Collections
//!
//! A directed multigraph stored in one collection: every vertex id is a key
//! whose value is the vertex's adjacency entry (see [`adjacency`]). An edge
//! `(u, w, id)` is recorded as outgoing in u's entry and incoming in w's.
//!
//! Every mutation is a read-modify-write of the touched entries: one
//! batched read, in-memory edits on an [`EntryBatch`], one batched write of
//! the entries that changed. The write is all-or-nothing, so a failed call
//! leaves every touched entry as it was.

pub mod adjacency;

use tracing::debug;

use crate::model::{Edge, Key, Neighborship, VertexRole};
use crate::session::Session;
use crate::storage::Store;
use crate::values::{narrow_len, DisjointValuesView};
use crate::{Error, Result};

pub use adjacency::Neighborhood;

// ============================================================================
// GraphSession
// ============================================================================

/// Graph view of a session's collection.
///
/// ```rust
/// use kvgraph::{Database, Edge, VertexRole};
///
/// let db = Database::open_memory().unwrap();
/// let net = db.graph();
/// net.upsert(&[Edge::new(1, 2, 9), Edge::new(2, 3, 10), Edge::new(3, 1, 11)]).unwrap();
///
/// assert_eq!(net.edges(1).unwrap().map(|e| e.len()), Some(2));
/// assert_eq!(net.edges_by_role(1, VertexRole::Source).unwrap().map(|e| e.len()), Some(1));
/// assert_eq!(net.edges_between(1, 3).unwrap().map(|e| e.len()), Some(0));
/// ```
pub struct GraphSession<'db, S: Store> {
    session: Session<'db, S>,
}

impl<'db, S: Store> GraphSession<'db, S> {
    pub fn new(session: Session<'db, S>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session<'db, S> {
        &self.session
    }

    pub fn into_session(self) -> Session<'db, S> {
        self.session
    }

    /// Commit the underlying transaction, if any.
    pub fn commit(self) -> Result<()> {
        self.session.commit()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Insert edges, skipping ones already present.
    pub fn upsert(&self, edges: &[Edge]) -> Result<()> {
        if edges.is_empty() {
            return Ok(());
        }
        let mut batch = EntryBatch::load(&self.session, endpoints(edges))?;
        for edge in edges {
            batch.insert(edge.source, VertexRole::Source, Neighborship::new(edge.target, edge.id))?;
            batch.insert(edge.target, VertexRole::Target, Neighborship::new(edge.source, edge.id))?;
        }
        let written = batch.flush(&self.session)?;
        debug!(edges = edges.len(), entries = written, "upserted edges");
        Ok(())
    }

    /// Remove exact `(source, target, id)` edges. Missing edges are ignored;
    /// endpoints stay present even when left without edges.
    pub fn remove(&self, edges: &[Edge]) -> Result<()> {
        if edges.is_empty() {
            return Ok(());
        }
        let mut batch = EntryBatch::load(&self.session, endpoints(edges))?;
        for edge in edges {
            batch.erase(edge.source, VertexRole::Source, Neighborship::new(edge.target, edge.id))?;
            batch.erase(edge.target, VertexRole::Target, Neighborship::new(edge.source, edge.id))?;
        }
        let written = batch.flush(&self.session)?;
        debug!(edges = edges.len(), entries = written, "removed edges");
        Ok(())
    }

    /// Remove every edge from `source` to `target`, for each pair.
    pub fn disconnect(&self, pairs: &[(Key, Key)]) -> Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }
        let vertices = pairs.iter().flat_map(|&(s, t)| [s, t]).collect();
        let mut batch = EntryBatch::load(&self.session, vertices)?;
        let mut removed = 0;
        for &(source, target) in pairs {
            removed += batch.erase_neighbor(source, VertexRole::Source, target)?;
            batch.erase_neighbor(target, VertexRole::Target, source)?;
        }
        let written = batch.flush(&self.session)?;
        debug!(pairs = pairs.len(), removed, entries = written, "disconnected vertices");
        Ok(())
    }

    /// Remove vertices together with every edge touching them, including the
    /// records their neighbors hold. Afterwards the vertices are absent.
    pub fn remove_vertices(&self, vertices: &[Key]) -> Result<()> {
        if vertices.is_empty() {
            return Ok(());
        }
        let doomed = self.neighborhoods(vertices)?;

        let mut touched: Vec<Key> = vertices.to_vec();
        for n in doomed.iter().flatten() {
            touched.extend(n.outgoing().iter().chain(n.incoming()).map(|s| s.neighbor));
        }
        let mut batch = EntryBatch::load(&self.session, touched)?;

        for n in doomed.iter().flatten() {
            let center = n.center();
            for ship in n.outgoing() {
                batch.erase(ship.neighbor, VertexRole::Target, Neighborship::new(center, ship.edge_id))?;
            }
            for ship in n.incoming() {
                batch.erase(ship.neighbor, VertexRole::Source, Neighborship::new(center, ship.edge_id))?;
            }
        }
        for &vertex in vertices {
            batch.drop_vertex(vertex)?;
        }
        let written = batch.flush(&self.session)?;
        debug!(vertices = vertices.len(), entries = written, "removed vertices");
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Decoded adjacency entries, one per requested vertex, from one batched
    /// read. `None` marks an absent vertex.
    pub fn neighborhoods(&self, vertices: &[Key]) -> Result<Vec<Option<Neighborhood>>> {
        let tape = self.session.sample(vertices).get()?;
        vertices
            .iter()
            .zip(tape.values())
            .map(|(&vertex, bytes)| Neighborhood::decode(vertex, bytes))
            .collect()
    }

    pub fn neighborhood(&self, vertex: Key) -> Result<Option<Neighborhood>> {
        Ok(self.neighborhoods(&[vertex])?.pop().flatten())
    }

    /// Degree of every requested vertex under `role`; `None` when absent.
    pub fn degrees(&self, vertices: &[Key], role: VertexRole) -> Result<Vec<Option<usize>>> {
        Ok(self
            .neighborhoods(vertices)?
            .into_iter()
            .map(|n| n.map(|n| n.degree(role)))
            .collect())
    }

    /// Every edge touching `vertex`, a self-loop once. `None` when absent.
    pub fn edges(&self, vertex: Key) -> Result<Option<Vec<Edge>>> {
        self.edges_by_role(vertex, VertexRole::Any)
    }

    /// Edges in which `vertex` plays `role`. `None` when absent.
    pub fn edges_by_role(&self, vertex: Key, role: VertexRole) -> Result<Option<Vec<Edge>>> {
        Ok(self.neighborhood(vertex)?.map(|n| n.edges(role)))
    }

    /// Edges from `source` to `target` exactly; reversed edges do not match.
    /// `None` when `source` is absent.
    pub fn edges_between(&self, source: Key, target: Key) -> Result<Option<Vec<Edge>>> {
        Ok(self.neighborhood(source)?.map(|n| {
            n.outgoing_to(target)
                .iter()
                .map(|s| Edge::new(source, target, s.edge_id))
                .collect()
        }))
    }

    /// Whether `vertex` has an adjacency entry.
    pub fn contains(&self, vertex: Key) -> Result<bool> {
        Ok(self.session.sample(&[vertex]).lengths()?[0].is_some())
    }

    pub fn contains_edge(&self, edge: &Edge) -> Result<bool> {
        Ok(self.neighborhood(edge.source)?.is_some_and(|n| n.contains(edge)))
    }
}

fn endpoints(edges: &[Edge]) -> Vec<Key> {
    edges.iter().flat_map(|e| [e.source, e.target]).collect()
}

// ============================================================================
// EntryBatch
// ============================================================================

/// Adjacency entries of a set of vertices, loaded together and edited in
/// memory before being written back in one call.
///
/// Vertices are kept sorted and unique; `entries[i]` belongs to
/// `vertices[i]`, and `dirty[i]` marks entries that must be written.
#[derive(Debug)]
pub struct EntryBatch {
    vertices: Vec<Key>,
    entries: Vec<Option<Neighborhood>>,
    dirty: Vec<bool>,
}

impl EntryBatch {
    /// Read the entries of `vertices` (duplicates allowed) in one call.
    pub fn load<S: Store>(session: &Session<'_, S>, mut vertices: Vec<Key>) -> Result<Self> {
        vertices.sort_unstable();
        vertices.dedup();

        let tape = session.sample(&vertices).get()?;
        let entries = vertices
            .iter()
            .zip(tape.values())
            .map(|(&vertex, bytes)| Neighborhood::decode(vertex, bytes))
            .collect::<Result<Vec<_>>>()?;
        let dirty = vec![false; vertices.len()];
        Ok(Self { vertices, entries, dirty })
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn get(&self, vertex: Key) -> Option<&Neighborhood> {
        let at = self.vertices.binary_search(&vertex).ok()?;
        self.entries[at].as_ref()
    }

    fn index_of(&self, vertex: Key) -> Result<usize> {
        self.vertices
            .binary_search(&vertex)
            .map_err(|_| Error::NotFound(format!("vertex {vertex} is not part of this batch")))
    }

    /// Add a record, creating the entry if the vertex was absent.
    pub fn insert(&mut self, vertex: Key, role: VertexRole, ship: Neighborship) -> Result<bool> {
        let at = self.index_of(vertex)?;
        let entry = self.entries[at].get_or_insert_with(|| Neighborhood::empty(vertex));
        let changed = entry.insert(role, ship);
        self.dirty[at] |= changed;
        Ok(changed)
    }

    /// Drop a record if present. Absent vertices are left absent.
    pub fn erase(&mut self, vertex: Key, role: VertexRole, ship: Neighborship) -> Result<bool> {
        let at = self.index_of(vertex)?;
        let changed = self.entries[at].as_mut().is_some_and(|e| e.remove(role, ship));
        self.dirty[at] |= changed;
        Ok(changed)
    }

    /// Drop every record towards `neighbor`; returns how many went.
    pub fn erase_neighbor(&mut self, vertex: Key, role: VertexRole, neighbor: Key) -> Result<usize> {
        let at = self.index_of(vertex)?;
        let removed = self.entries[at]
            .as_mut()
            .map_or(0, |e| e.remove_neighbor(role, neighbor).len());
        self.dirty[at] |= removed > 0;
        Ok(removed)
    }

    /// Make the vertex absent.
    pub fn drop_vertex(&mut self, vertex: Key) -> Result<()> {
        let at = self.index_of(vertex)?;
        if self.entries[at].take().is_some() {
            self.dirty[at] = true;
        }
        Ok(())
    }

    /// Write every changed entry back in one batched call. Absent entries are
    /// written as zero-length values, which removes them. Returns the number
    /// of entries written.
    pub fn flush<S: Store>(self, session: &Session<'_, S>) -> Result<usize> {
        let mut keys = Vec::new();
        let mut buffer = Vec::new();
        let mut offsets = Vec::new();
        let mut lengths = Vec::new();

        for ((vertex, entry), dirty) in self.vertices.iter().zip(&self.entries).zip(&self.dirty) {
            if !dirty {
                continue;
            }
            let start = buffer.len();
            if let Some(entry) = entry {
                entry.encode_into(&mut buffer);
            }
            keys.push(*vertex);
            offsets.push(narrow_len(start)?);
            lengths.push(narrow_len(buffer.len() - start)?);
        }
        if keys.is_empty() {
            return Ok(0);
        }

        let values = DisjointValuesView::packed(&buffer, &offsets, &lengths)?;
        session.sample(&keys).set(&values)?;
        Ok(keys.len())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    #[test]
    fn test_batch_only_writes_dirty_entries() {
        let db = Database::open_memory().unwrap();
        let net = db.graph();
        net.upsert(&[Edge::new(1, 2, 0)]).unwrap();

        let mut batch = EntryBatch::load(net.session(), vec![2, 1, 2, 3]).unwrap();
        assert_eq!(batch.len(), 3);
        assert!(batch.get(3).is_none());
        assert!(!batch.insert(1, VertexRole::Source, Neighborship::new(2, 0)).unwrap());
        assert!(batch.insert(3, VertexRole::Target, Neighborship::new(1, 5)).unwrap());
        assert_eq!(batch.flush(net.session()).unwrap(), 1);
    }

    #[test]
    fn test_batch_rejects_unloaded_vertex() {
        let db = Database::open_memory().unwrap();
        let net = db.graph();
        let mut batch = EntryBatch::load(net.session(), vec![1]).unwrap();
        assert!(matches!(
            batch.insert(2, VertexRole::Source, Neighborship::new(1, 0)),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_reupsert_writes_nothing() {
        let db = Database::open_memory().unwrap();
        let net = db.graph();
        let edges = [Edge::new(1, 2, 9), Edge::new(2, 1, 9)];
        net.upsert(&edges).unwrap();

        let mut batch = EntryBatch::load(net.session(), endpoints(&edges)).unwrap();
        for e in &edges {
            batch.insert(e.source, VertexRole::Source, Neighborship::new(e.target, e.id)).unwrap();
            batch.insert(e.target, VertexRole::Target, Neighborship::new(e.source, e.id)).unwrap();
        }
        assert_eq!(batch.flush(net.session()).unwrap(), 0);
    }
}
