//! Keys and collection handles.

use serde::{Deserialize, Serialize};

/// Fixed-width key, unique within a collection.
///
/// In graph collections every vertex id doubles as the key of its
/// adjacency entry.
pub type Key = i64;

/// Opaque handle naming a partition of the key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionId(pub u64);

impl CollectionId {
    /// The unnamed collection every store starts with.
    pub const MAIN: CollectionId = CollectionId(0);
}

impl Default for CollectionId {
    fn default() -> Self {
        Self::MAIN
    }
}

impl std::fmt::Display for CollectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
