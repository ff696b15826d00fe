//! # Key-Value Store Trait
//!
//! This is the contract between kvgraph and the key-value engine under it.
//! Sessions, sample proxies and the graph layer talk to the engine only
//! through these calls.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryStore` | `memory` | In-memory for testing/embedding |

pub mod memory;

use serde::{Deserialize, Serialize};
use crate::model::{CollectionId, Key};
use crate::tx::{Transaction, TxMode};
use crate::values::{DisjointValuesView, Tape};
use crate::{Error, Result};

pub use memory::{MemoryStore, MemoryTx};

// ============================================================================
// Store Configuration
// ============================================================================

/// Configuration passed to [`Store::open`].
///
/// Parsed from JSON by [`StoreConfig::from_json`]; every field is optional.
///
/// ```rust
/// use kvgraph::StoreConfig;
///
/// let config = StoreConfig::from_json(r#"{"max_value_len": 4096}"#).unwrap();
/// assert_eq!(config.max_value_len, Some(4096));
/// assert_eq!(StoreConfig::from_json("").unwrap(), StoreConfig::default());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Largest value accepted by a write, in bytes.
    pub max_value_len: Option<usize>,
    /// Largest number of keys in one batched call.
    pub max_batch_len: Option<usize>,
    /// Named collections created at open time.
    pub collections: Vec<String>,
}

impl StoreConfig {
    /// Parse a JSON config. Blank input yields the defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(text).map_err(|e| Error::OpenError(format!("invalid config: {e}")))
    }

    pub fn with_max_value_len(mut self, len: usize) -> Self {
        self.max_value_len = Some(len);
        self
    }

    pub fn with_max_batch_len(mut self, len: usize) -> Self {
        self.max_batch_len = Some(len);
        self
    }

    pub fn with_collection(mut self, name: impl Into<String>) -> Self {
        self.collections.push(name.into());
        self
    }

    /// Reject settings no store can honor.
    pub fn validate(&self) -> Result<()> {
        if self.max_value_len == Some(0) {
            return Err(Error::OpenError("max_value_len must be positive".into()));
        }
        if self.max_batch_len == Some(0) {
            return Err(Error::OpenError("max_batch_len must be positive".into()));
        }
        if let Some(name) = self.collections.iter().find(|n| n.is_empty()) {
            return Err(Error::OpenError(format!("invalid collection name {name:?}")));
        }
        Ok(())
    }
}

// ============================================================================
// Scan result
// ============================================================================

/// Present keys of a range scan, ascending, with their value lengths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub keys: Vec<Key>,
    pub lengths: Vec<u32>,
}

impl ScanResult {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// ============================================================================
// Store Trait
// ============================================================================

/// The key-value engine contract.
///
/// Every batched call is all-or-nothing: a failed write leaves every key it
/// named untouched. Calls that take a transaction stage writes in it and read
/// through it; `None` means auto-commit.
pub trait Store: Send + Sync + Sized + 'static {
    /// The transaction type for this store.
    type Tx: Transaction;

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Open (initialize) a store.
    fn open(config: StoreConfig) -> Result<Self>;

    /// Close the store. Every later call fails with [`Error::NotOpen`].
    fn close(&self) -> Result<()>;

    fn is_open(&self) -> bool;

    // ========================================================================
    // Collections
    // ========================================================================

    /// Open a named collection, creating it if missing.
    fn collection(&self, name: &str) -> Result<CollectionId>;

    /// Drop a named collection and everything in it.
    fn remove_collection(&self, name: &str) -> Result<()>;

    /// Names of all named collections, sorted.
    fn collection_names(&self) -> Result<Vec<String>>;

    // ========================================================================
    // Transactions
    // ========================================================================

    fn begin_tx(&self, mode: TxMode) -> Result<Self::Tx>;

    /// Apply every staged write atomically.
    fn commit_tx(&self, tx: Self::Tx) -> Result<()>;

    /// Discard every staged write.
    fn rollback_tx(&self, tx: Self::Tx) -> Result<()>;

    // ========================================================================
    // Batched I/O
    // ========================================================================

    /// Replace the value of `keys[i]` with `values[i]`. A zero-length value
    /// removes the key. Repeated keys are applied in order.
    fn write(
        &self,
        tx: Option<&mut Self::Tx>,
        collection: CollectionId,
        keys: &[Key],
        values: &DisjointValuesView<'_>,
    ) -> Result<()>;

    /// Current values of `keys`, in order. Missing keys read as zero-length.
    fn read(&self, tx: Option<&Self::Tx>, collection: CollectionId, keys: &[Key]) -> Result<Tape>;

    /// Value lengths of `keys` without copying values; `None` when missing.
    fn lengths(
        &self,
        tx: Option<&Self::Tx>,
        collection: CollectionId,
        keys: &[Key],
    ) -> Result<Vec<Option<u32>>>;

    /// Up to `limit` present keys `>= min_key`, ascending.
    fn scan(
        &self,
        tx: Option<&Self::Tx>,
        collection: CollectionId,
        min_key: Key,
        limit: usize,
    ) -> Result<ScanResult>;
}
