//! Adjacency entries: the per-vertex value of a graph collection.
//!
//! Layout, all little-endian:
//!
//! ```text
//! [out_degree: u32][in_degree: u32]
//! out_degree × [neighbor: i64][edge_id: i64]   sorted by (neighbor, edge_id)
//! in_degree  × [neighbor: i64][edge_id: i64]   sorted by (neighbor, edge_id)
//! ```
//!
//! A self-loop `(v, v, id)` is one outgoing and one incoming record of v's
//! entry. A zero-length value means the vertex is absent; an 8-byte value
//! with zero degrees is a present vertex without edges.

use smallvec::SmallVec;

use crate::model::{Edge, Key, Neighborship, VertexRole};
use crate::{Error, Result};

pub const HEADER_LEN: usize = 2 * std::mem::size_of::<u32>();
pub const RECORD_LEN: usize = 2 * std::mem::size_of::<Key>();

type Records = SmallVec<[Neighborship; 4]>;

/// Decoded adjacency entry of one vertex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighborhood {
    center: Key,
    /// edges where `center` is the source, keyed by target
    outgoing: Records,
    /// edges where `center` is the target, keyed by source
    incoming: Records,
}

impl Neighborhood {
    /// A present vertex with no edges.
    pub fn empty(center: Key) -> Self {
        Self { center, outgoing: Records::new(), incoming: Records::new() }
    }

    /// Decode the stored value of `center`. `Ok(None)` for an absent vertex.
    pub fn decode(center: Key, bytes: &[u8]) -> Result<Option<Self>> {
        if bytes.is_empty() {
            return Ok(None);
        }
        if bytes.len() < HEADER_LEN {
            return Err(corrupt(center, format!("{}-byte entry is shorter than its header", bytes.len())));
        }
        let out_degree = read_u32(&bytes[0..4]) as usize;
        let in_degree = read_u32(&bytes[4..8]) as usize;
        let expected = (out_degree + in_degree)
            .checked_mul(RECORD_LEN)
            .and_then(|n| n.checked_add(HEADER_LEN));
        if expected != Some(bytes.len()) {
            return Err(corrupt(
                center,
                format!("degrees {out_degree}/{in_degree} do not match {} bytes", bytes.len()),
            ));
        }

        let mut records = bytes[HEADER_LEN..].chunks_exact(RECORD_LEN).map(|chunk| Neighborship {
            neighbor: read_i64(&chunk[0..8]),
            edge_id: read_i64(&chunk[8..16]),
        });
        let outgoing: Records = records.by_ref().take(out_degree).collect();
        let incoming: Records = records.collect();

        if !is_sorted(&outgoing) || !is_sorted(&incoming) {
            return Err(corrupt(center, "records out of order".into()));
        }
        Ok(Some(Self { center, outgoing, incoming }))
    }

    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + (self.outgoing.len() + self.incoming.len()) * RECORD_LEN
    }

    /// Append the stored form to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.reserve(self.encoded_len());
        out.extend_from_slice(&(self.outgoing.len() as u32).to_le_bytes());
        out.extend_from_slice(&(self.incoming.len() as u32).to_le_bytes());
        for ship in self.outgoing.iter().chain(&self.incoming) {
            out.extend_from_slice(&ship.neighbor.to_le_bytes());
            out.extend_from_slice(&ship.edge_id.to_le_bytes());
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out);
        out
    }

    pub fn center(&self) -> Key {
        self.center
    }

    pub fn outgoing(&self) -> &[Neighborship] {
        &self.outgoing
    }

    pub fn incoming(&self) -> &[Neighborship] {
        &self.incoming
    }

    /// Number of edges in which the center plays `role`. Under
    /// [`VertexRole::Any`] a self-loop counts once.
    pub fn degree(&self, role: VertexRole) -> usize {
        match role {
            VertexRole::Source => self.outgoing.len(),
            VertexRole::Target => self.incoming.len(),
            VertexRole::Any => {
                self.outgoing.len() + self.incoming.len() - self.incoming_from(self.center).len()
            }
        }
    }

    /// Edges in which the center plays `role`: outgoing first, then incoming.
    /// Under [`VertexRole::Any`] a self-loop appears once.
    pub fn edges(&self, role: VertexRole) -> Vec<Edge> {
        let center = self.center;
        let outgoing = self.outgoing.iter().map(|s| Edge::new(center, s.neighbor, s.edge_id));
        let incoming = self.incoming.iter().map(|s| Edge::new(s.neighbor, center, s.edge_id));
        match role {
            VertexRole::Source => outgoing.collect(),
            VertexRole::Target => incoming.collect(),
            VertexRole::Any => {
                let mut edges = Vec::with_capacity(self.degree(VertexRole::Any));
                edges.extend(outgoing);
                edges.extend(incoming.filter(|e| !e.is_self_loop()));
                edges
            }
        }
    }

    /// Outgoing records towards `target`, sorted by edge id.
    pub fn outgoing_to(&self, target: Key) -> &[Neighborship] {
        equal_range(&self.outgoing, target)
    }

    /// Incoming records from `source`, sorted by edge id.
    pub fn incoming_from(&self, source: Key) -> &[Neighborship] {
        equal_range(&self.incoming, source)
    }

    /// Whether the entry holds `edge`, which must touch the center.
    pub fn contains(&self, edge: &Edge) -> bool {
        if edge.source == self.center {
            self.outgoing.binary_search(&Neighborship::new(edge.target, edge.id)).is_ok()
        } else if edge.target == self.center {
            self.incoming.binary_search(&Neighborship::new(edge.source, edge.id)).is_ok()
        } else {
            false
        }
    }

    /// Add a record to the `Source` or `Target` list. Returns false if it
    /// was already there.
    pub(crate) fn insert(&mut self, role: VertexRole, ship: Neighborship) -> bool {
        let Some(records) = self.records_mut(role) else { return false };
        match records.binary_search(&ship) {
            Ok(_) => false,
            Err(at) => {
                records.insert(at, ship);
                true
            }
        }
    }

    /// Drop a record from the `Source` or `Target` list. Returns false if it
    /// was not there.
    pub(crate) fn remove(&mut self, role: VertexRole, ship: Neighborship) -> bool {
        let Some(records) = self.records_mut(role) else { return false };
        match records.binary_search(&ship) {
            Ok(at) => {
                records.remove(at);
                true
            }
            Err(_) => false,
        }
    }

    /// Drop every record towards `neighbor` from the `Source` or `Target`
    /// list, returning the edge ids removed.
    pub(crate) fn remove_neighbor(&mut self, role: VertexRole, neighbor: Key) -> SmallVec<[Key; 2]> {
        let Some(records) = self.records_mut(role) else { return SmallVec::new() };
        let start = records.partition_point(|s| s.neighbor < neighbor);
        let end = records.partition_point(|s| s.neighbor <= neighbor);
        records.drain(start..end).map(|s| s.edge_id).collect()
    }

    fn records_mut(&mut self, role: VertexRole) -> Option<&mut Records> {
        match role {
            VertexRole::Source => Some(&mut self.outgoing),
            VertexRole::Target => Some(&mut self.incoming),
            VertexRole::Any => None,
        }
    }
}

fn equal_range(records: &[Neighborship], neighbor: Key) -> &[Neighborship] {
    let start = records.partition_point(|s| s.neighbor < neighbor);
    let end = records.partition_point(|s| s.neighbor <= neighbor);
    &records[start..end]
}

fn is_sorted(records: &[Neighborship]) -> bool {
    records.windows(2).all(|w| w[0] < w[1])
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

fn read_i64(bytes: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    i64::from_le_bytes(buf)
}

fn corrupt(vertex: Key, reason: String) -> Error {
    Error::CorruptEntry { vertex, reason }
}

// ============================================================================
// Tests
// ============================================================================
