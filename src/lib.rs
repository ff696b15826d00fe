//! # kvgraph: Batched Values and Directed Multigraphs over Key-Value Stores
//!
//! A client layer over a transactional key-value store that adds two things:
//!
//! 1. **Batched disjoint values**: many variable-length values move across
//!    the store boundary in one call. Writes borrow a `DisjointValuesView`
//!    over caller buffers; reads return a `Tape` walked lazily.
//! 2. **Graph collections**: a directed multigraph encoded as one adjacency
//!    entry per vertex, answering incoming/outgoing/pairwise queries.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `Store` is the contract between this crate and the engine
//! 2. **Borrow, don't copy**: writes borrow caller buffers, reads return one tape
//! 3. **All-or-nothing**: every graph mutation is one batched write
//!
//! ## Quick Start
//!
//! ```rust
//! use kvgraph::{Database, DisjointValuesView, Edge, VertexRole};
//!
//! # fn example() -> kvgraph::Result<()> {
//! let db = Database::open_memory()?;
//!
//! // Batched key-value access
//! let session = db.session();
//! let keys = [1, 2];
//! let proxy = session.sample(&keys);
//! proxy.set(&DisjointValuesView::from_slices(&[&b"a"[..], &b"bb"[..]]))?;
//! assert_eq!(proxy.get()?.lengths(), &[1, 2]);
//!
//! // Graph collection
//! let net = db.graph_collection("net")?;
//! net.upsert(&[Edge::new(1, 2, 9), Edge::new(2, 3, 10)])?;
//! assert_eq!(net.edges_by_role(2, VertexRole::Target)?.map(|e| e.len()), Some(1));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Stores
//!
//! | Store | Description |
//! |-------|-------------|
//! | `MemoryStore` | In-memory, transactional, for testing/embedding |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod values;
pub mod storage;
pub mod tx;
pub mod session;
pub mod graph;
pub mod export;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{Key, CollectionId, Edge, VertexRole, Neighborship, DEFAULT_EDGE_ID};

// ============================================================================
// Re-exports: Values
// ============================================================================

pub use values::{DisjointValuesView, BufferStride, Tape, TapedValuesView};

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{Store, StoreConfig, ScanResult, MemoryStore};

// ============================================================================
// Re-exports: Sessions, Transactions, Graphs
// ============================================================================

pub use session::{Session, SampleProxy};
pub use tx::{Transaction, TxMode, TxId};
pub use graph::{GraphSession, Neighborhood};

// ============================================================================
// Top-level Database handle
// ============================================================================

/// The primary entry point. A `Database` owns a store and hands out
/// sessions, transactions and graph views that borrow it.
pub struct Database<S: Store = MemoryStore> {
    store: S,
}

impl<S: Store> Database<S> {
    /// Wrap an already opened store.
    pub fn with_store(store: S) -> Self {
        Self { store }
    }

    /// Open a store from a JSON config; blank means defaults.
    pub fn open(config: &str) -> Result<Self> {
        Self::open_with(StoreConfig::from_json(config)?)
    }

    pub fn open_with(config: StoreConfig) -> Result<Self> {
        Ok(Self::with_store(S::open(config)?))
    }

    /// Auto-commit session on the main collection.
    pub fn session(&self) -> Session<'_, S> {
        Session::new(&self.store, CollectionId::MAIN, None)
    }

    /// Auto-commit session on a named collection, created if missing.
    pub fn collection(&self, name: &str) -> Result<Session<'_, S>> {
        let id = self.store.collection(name)?;
        Ok(Session::new(&self.store, id, None))
    }

    pub fn remove_collection(&self, name: &str) -> Result<()> {
        self.store.remove_collection(name)
    }

    /// Names of all named collections.
    pub fn collections(&self) -> Result<Vec<String>> {
        self.store.collection_names()
    }

    /// Transactional session on the main collection. Writes become visible
    /// on `commit()`; dropping the session discards them.
    pub fn transaction(&self, mode: TxMode) -> Result<Session<'_, S>> {
        let tx = self.store.begin_tx(mode)?;
        Ok(Session::new(&self.store, CollectionId::MAIN, Some(tx)))
    }

    /// Transactional session on a named collection.
    pub fn collection_transaction(&self, name: &str, mode: TxMode) -> Result<Session<'_, S>> {
        let id = self.store.collection(name)?;
        let tx = self.store.begin_tx(mode)?;
        Ok(Session::new(&self.store, id, Some(tx)))
    }

    /// Graph view of the main collection.
    pub fn graph(&self) -> GraphSession<'_, S> {
        GraphSession::new(self.session())
    }

    /// Graph view of a named collection.
    pub fn graph_collection(&self, name: &str) -> Result<GraphSession<'_, S>> {
        Ok(GraphSession::new(self.collection(name)?))
    }

    /// Close the store. Sessions still alive fail with `NotOpen` afterwards.
    pub fn close(&self) -> Result<()> {
        self.store.close()
    }

    /// Access the underlying store (for advanced use).
    pub fn store(&self) -> &S {
        &self.store
    }
}

/// In-memory database for testing and embedding.
impl Database<MemoryStore> {
    pub fn open_memory() -> Result<Self> {
        Self::open_with(StoreConfig::default())
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to open store: {0}")]
    OpenError(String),

    #[error("Shape mismatch: {keys} keys but {values} values")]
    ShapeMismatch { keys: usize, values: usize },

    #[error("Invalid value range: {0}")]
    InvalidRange(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Store is not open")]
    NotOpen,

    #[error("Transaction error: {0}")]
    TxError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Corrupt adjacency entry for vertex {vertex}: {reason}")]
    CorruptEntry { vertex: Key, reason: String },

    #[error("Parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
