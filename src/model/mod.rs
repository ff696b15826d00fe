//! # Key and Graph Model
//!
//! Plain data shared by every layer: keys, collection handles, edges and
//! the compact neighbor records stored inside adjacency entries.
//!
//! Design rule: no I/O, no locks, no store types here.

pub mod key;
pub mod edge;

pub use key::{Key, CollectionId};
pub use edge::{Edge, VertexRole, Neighborship, DEFAULT_EDGE_ID};
