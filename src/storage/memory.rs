//! In-memory key-value store.
//!
//! This is the reference implementation of `Store`. Every collection is a
//! `BTreeMap` partition; all partitions sit behind one `RwLock`, so a
//! batched write is applied under a single write lock and is atomic.
//!
//! ## Transactions
//!
//! A `MemoryTx` stages writes in its own ordered map. Reads and scans
//! through the transaction see the staged writes layered over the committed
//! state. `rollback_tx()` (or just dropping the transaction) discards the
//! stage.
//!
//! Every committed write stamps its key with a fresh version. A transaction
//! remembers the version of each committed key it reads or measures, and
//! `commit_tx()` refuses with `TxError` when any of them has moved since.
//! Blind writes never conflict: of two transactions writing a key they
//! never read, the later committer wins. Scans are not tracked.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::model::{CollectionId, Key};
use crate::tx::{Transaction, TxId, TxMode};
use crate::values::{narrow_len, DisjointValuesView, Tape};
use crate::{Error, Result};
use super::{ScanResult, Store, StoreConfig};

// ============================================================================
// MemoryStore
// ============================================================================

/// Longest storable value: lengths travel as `u32`.
const MAX_VALUE_LEN: usize = u32::MAX as usize;

/// In-memory transactional key-value store.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    config: StoreConfig,
    state: RwLock<MemoryState>,
    open: AtomicBool,
    next_collection_id: AtomicU64,
    next_tx_id: AtomicU64,
}

#[derive(Default)]
struct MemoryState {
    partitions: HashMap<CollectionId, BTreeMap<Key, Vec<u8>>>,
    /// collection name → id (the main collection has no name)
    names: HashMap<String, CollectionId>,
    /// (collection, key) → clock value of the last committed write
    versions: HashMap<(CollectionId, Key), u64>,
    clock: u64,
}

impl MemoryState {
    /// Store `value` under `key` (an empty value removes it) and stamp the key.
    fn put(&mut self, collection: CollectionId, key: Key, value: Vec<u8>) {
        let Some(partition) = self.partitions.get_mut(&collection) else { return };
        if value.is_empty() {
            partition.remove(&key);
        } else {
            partition.insert(key, value);
        }
        self.clock += 1;
        self.versions.insert((collection, key), self.clock);
    }

    /// 0 for keys never written.
    fn version(&self, collection: CollectionId, key: Key) -> u64 {
        self.versions.get(&(collection, key)).copied().unwrap_or(0)
    }
}

impl MemoryStore {
    /// Store with the default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    fn with_config(config: StoreConfig) -> Self {
        let mut state = MemoryState::default();
        state.partitions.insert(CollectionId::MAIN, BTreeMap::new());

        let mut next_id = 1;
        for name in &config.collections {
            if !state.names.contains_key(name) {
                let id = CollectionId(next_id);
                next_id += 1;
                state.names.insert(name.clone(), id);
                state.partitions.insert(id, BTreeMap::new());
            }
        }

        Self {
            inner: Arc::new(MemoryInner {
                config,
                state: RwLock::new(state),
                open: AtomicBool::new(true),
                next_collection_id: AtomicU64::new(next_id),
                next_tx_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() { Ok(()) } else { Err(Error::NotOpen) }
    }

    fn check_write(&self, keys: &[Key], values: &DisjointValuesView<'_>) -> Result<()> {
        if keys.len() != values.len() {
            return Err(Error::ShapeMismatch { keys: keys.len(), values: values.len() });
        }
        if let Some(max) = self.inner.config.max_batch_len {
            if keys.len() > max {
                return Err(rejected(Error::WriteFailed(format!(
                    "batch of {} keys exceeds limit of {max}",
                    keys.len()
                ))));
            }
        }
        let max = self
            .inner
            .config
            .max_value_len
            .map_or(MAX_VALUE_LEN, |max| max.min(MAX_VALUE_LEN));
        if let Some((i, value)) = values.iter().enumerate().find(|(_, v)| v.len() > max) {
            return Err(rejected(Error::WriteFailed(format!(
                "value for key {} is {} bytes, limit is {max}",
                keys[i],
                value.len()
            ))));
        }
        Ok(())
    }

    fn check_read(&self, keys: &[Key]) -> Result<()> {
        if let Some(max) = self.inner.config.max_batch_len {
            if keys.len() > max {
                return Err(rejected(Error::ReadFailed(format!(
                    "batch of {} keys exceeds limit of {max}",
                    keys.len()
                ))));
            }
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn rejected(err: Error) -> Error {
    warn!(error = %err, "batched call rejected");
    err
}

/// Value of `key` as seen through `tx`: staged writes shadow committed ones,
/// and a staged zero-length value hides the committed value. Reading a
/// committed value through `tx` records its version.
fn lookup<'a>(
    tx: Option<&'a MemoryTx>,
    state: &MemoryState,
    partition: &'a BTreeMap<Key, Vec<u8>>,
    collection: CollectionId,
    key: Key,
) -> Option<&'a [u8]> {
    if let Some(tx) = tx {
        if let Some(staged) = tx.staged.get(&(collection, key)) {
            return if staged.is_empty() { None } else { Some(staged.as_slice()) };
        }
        tx.observe(collection, key, state.version(collection, key));
    }
    partition.get(&key).map(Vec::as_slice)
}

// ============================================================================
// MemoryTx
// ============================================================================

/// In-memory transaction: a private stage of pending writes.
pub struct MemoryTx {
    id: TxId,
    mode: TxMode,
    /// (collection, key) → pending value; empty means removal
    staged: BTreeMap<(CollectionId, Key), Vec<u8>>,
    /// (collection, key) → version first seen by a read
    observed: Mutex<HashMap<(CollectionId, Key), u64>>,
}

impl MemoryTx {
    fn observe(&self, collection: CollectionId, key: Key, version: u64) {
        self.observed.lock().entry((collection, key)).or_insert(version);
    }
}

impl Transaction for MemoryTx {
    fn mode(&self) -> TxMode { self.mode }
    fn id(&self) -> TxId { self.id }
    fn staged_len(&self) -> usize { self.staged.len() }
}

// ============================================================================
// Store impl
// ============================================================================

impl Store for MemoryStore {
    type Tx = MemoryTx;

    fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let store = Self::with_config(config);
        debug!(collections = store.inner.config.collections.len(), "opened memory store");
        Ok(store)
    }

    fn close(&self) -> Result<()> {
        if self.inner.open.swap(false, Ordering::AcqRel) {
            debug!("closed memory store");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::Acquire)
    }

    // ========================================================================
    // Collections
    // ========================================================================

    fn collection(&self, name: &str) -> Result<CollectionId> {
        self.ensure_open()?;
        if name.is_empty() {
            return Ok(CollectionId::MAIN);
        }
        if let Some(&id) = self.inner.state.read().names.get(name) {
            return Ok(id);
        }

        let mut state = self.inner.state.write();
        // Another caller may have created it between the two locks.
        if let Some(&id) = state.names.get(name) {
            return Ok(id);
        }
        let id = CollectionId(self.inner.next_collection_id.fetch_add(1, Ordering::Relaxed));
        state.names.insert(name.to_string(), id);
        state.partitions.insert(id, BTreeMap::new());
        debug!(name, id = id.0, "created collection");
        Ok(id)
    }

    /// Removing the main collection (empty name) clears it instead.
    fn remove_collection(&self, name: &str) -> Result<()> {
        self.ensure_open()?;
        let mut state = self.inner.state.write();
        if name.is_empty() {
            let keys: Vec<Key> = state
                .partitions
                .get(&CollectionId::MAIN)
                .map(|main| main.keys().copied().collect())
                .unwrap_or_default();
            for key in keys {
                state.put(CollectionId::MAIN, key, Vec::new());
            }
            debug!("cleared main collection");
            return Ok(());
        }
        let id = state
            .names
            .remove(name)
            .ok_or_else(|| Error::NotFound(format!("collection {name:?}")))?;
        state.partitions.remove(&id);
        state.versions.retain(|&(collection, _), _| collection != id);
        debug!(name, id = id.0, "removed collection");
        Ok(())
    }

    fn collection_names(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        let mut names: Vec<String> = self.inner.state.read().names.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    fn begin_tx(&self, mode: TxMode) -> Result<MemoryTx> {
        self.ensure_open()?;
        let id = TxId(self.inner.next_tx_id.fetch_add(1, Ordering::Relaxed));
        debug!(tx = id.0, ?mode, "began transaction");
        Ok(MemoryTx { id, mode, staged: BTreeMap::new(), observed: Mutex::default() })
    }

    fn commit_tx(&self, tx: MemoryTx) -> Result<()> {
        self.ensure_open()?;
        let MemoryTx { id, staged, observed, .. } = tx;
        let writes = staged.len();

        let mut state = self.inner.state.write();
        if let Some(&(collection, _)) = staged.keys().find(|(c, _)| !state.partitions.contains_key(c)) {
            return Err(Error::TxError(format!(
                "transaction {id} wrote to removed collection {collection}"
            )));
        }
        if !staged.is_empty() {
            let stale = observed
                .into_inner()
                .into_iter()
                .find(|&((collection, key), seen)| state.version(collection, key) != seen);
            if let Some(((collection, key), _)) = stale {
                warn!(tx = id.0, collection = collection.0, key, "commit conflict");
                return Err(Error::TxError(format!(
                    "transaction {id} read key {key} of collection {collection}, which changed before commit"
                )));
            }
        }
        for ((collection, key), value) in staged {
            state.put(collection, key, value);
        }
        debug!(tx = id.0, writes, "committed transaction");
        Ok(())
    }

    fn rollback_tx(&self, tx: MemoryTx) -> Result<()> {
        debug!(tx = tx.id.0, discarded = tx.staged.len(), "rolled back transaction");
        Ok(())
    }

    // ========================================================================
    // Batched I/O
    // ========================================================================

    fn write(
        &self,
        tx: Option<&mut MemoryTx>,
        collection: CollectionId,
        keys: &[Key],
        values: &DisjointValuesView<'_>,
    ) -> Result<()> {
        self.ensure_open()?;
        self.check_write(keys, values)?;

        match tx {
            Some(tx) => {
                if tx.is_read_only() {
                    return Err(Error::TxError(format!("transaction {} is read-only", tx.id)));
                }
                if !self.inner.state.read().partitions.contains_key(&collection) {
                    return Err(rejected(Error::WriteFailed(format!("unknown collection {collection}"))));
                }
                for (&key, value) in keys.iter().zip(values.iter()) {
                    tx.staged.insert((collection, key), value.to_vec());
                }
                trace!(
                    tx = tx.id.0,
                    collection = collection.0,
                    keys = keys.len(),
                    bytes = values.total_len(),
                    "staged batched write"
                );
            }
            None => {
                let mut state = self.inner.state.write();
                if !state.partitions.contains_key(&collection) {
                    return Err(rejected(Error::WriteFailed(format!("unknown collection {collection}"))));
                }
                for (&key, value) in keys.iter().zip(values.iter()) {
                    state.put(collection, key, value.to_vec());
                }
                trace!(
                    collection = collection.0,
                    keys = keys.len(),
                    bytes = values.total_len(),
                    "applied batched write"
                );
            }
        }
        Ok(())
    }

    fn read(&self, tx: Option<&MemoryTx>, collection: CollectionId, keys: &[Key]) -> Result<Tape> {
        self.ensure_open()?;
        self.check_read(keys)?;

        let state = self.inner.state.read();
        let partition = state
            .partitions
            .get(&collection)
            .ok_or_else(|| rejected(Error::ReadFailed(format!("unknown collection {collection}"))))?;

        let mut tape = Tape::with_capacity(keys.len(), 0);
        for &key in keys {
            match lookup(tx, &state, partition, collection, key) {
                Some(value) => tape.push(value)?,
                None => tape.push_missing(),
            }
        }
        trace!(
            collection = collection.0,
            keys = keys.len(),
            bytes = tape.contents().len(),
            "batched read"
        );
        Ok(tape)
    }

    fn lengths(
        &self,
        tx: Option<&MemoryTx>,
        collection: CollectionId,
        keys: &[Key],
    ) -> Result<Vec<Option<u32>>> {
        self.ensure_open()?;
        self.check_read(keys)?;

        let state = self.inner.state.read();
        let partition = state
            .partitions
            .get(&collection)
            .ok_or_else(|| rejected(Error::ReadFailed(format!("unknown collection {collection}"))))?;

        keys.iter()
            .map(|&key| {
                lookup(tx, &state, partition, collection, key)
                    .map(|v| narrow_len(v.len()))
                    .transpose()
            })
            .collect()
    }

    fn scan(
        &self,
        tx: Option<&MemoryTx>,
        collection: CollectionId,
        min_key: Key,
        limit: usize,
    ) -> Result<ScanResult> {
        self.ensure_open()?;

        let state = self.inner.state.read();
        let partition = state
            .partitions
            .get(&collection)
            .ok_or_else(|| rejected(Error::ReadFailed(format!("unknown collection {collection}"))))?;

        // Merge committed keys with the transaction's stage, stage first on ties.
        let mut committed = partition
            .range(min_key..)
            .map(|(&k, v)| (k, v.as_slice()))
            .peekable();
        let mut staged = tx
            .into_iter()
            .flat_map(|tx| tx.staged.range((collection, min_key)..=(collection, Key::MAX)))
            .map(|(&(_, k), v)| (k, v.as_slice()))
            .peekable();

        let mut result = ScanResult::default();
        while result.keys.len() < limit {
            let next_committed = committed.peek().map(|&(k, _)| k);
            let next_staged = staged.peek().map(|&(k, _)| k);
            let next = match (next_committed, next_staged) {
                (None, None) => break,
                (Some(c), Some(s)) if s <= c => {
                    if s == c {
                        committed.next();
                    }
                    staged.next()
                }
                (Some(_), _) => committed.next(),
                (None, Some(_)) => staged.next(),
            };
            let Some((key, value)) = next else { break };
            if !value.is_empty() {
                result.keys.push(key);
                result.lengths.push(narrow_len(value.len())?);
            }
        }
        trace!(collection = collection.0, min_key, found = result.len(), "scan");
        Ok(result)
    }
}

// ============================================================================
// Tests
// ============================================================================
