//! Sessions and sample proxies.
//!
//! A [`Session`] binds one collection of a store, either in auto-commit mode
//! or inside a transaction. A [`SampleProxy`] binds an ordered list of keys
//! to a session and moves all their values in one batched call.
//!
//! Both only borrow: a proxy cannot outlive its session, a session cannot
//! outlive its database.

use parking_lot::Mutex;

use crate::model::{CollectionId, Key};
use crate::storage::{ScanResult, Store};
use crate::tx::Transaction;
use crate::values::{DisjointValuesView, Tape};
use crate::{Error, Result};

// ============================================================================
// Session
// ============================================================================

/// A collection of a store, optionally inside a transaction.
///
/// With a transaction, writes stay private to this session until
/// [`commit`](Session::commit). Dropping the session without committing
/// discards them.
pub struct Session<'db, S: Store> {
    store: &'db S,
    collection: CollectionId,
    tx: Option<Mutex<S::Tx>>,
}

impl<'db, S: Store> Session<'db, S> {
    pub(crate) fn new(store: &'db S, collection: CollectionId, tx: Option<S::Tx>) -> Self {
        Self { store, collection, tx: tx.map(Mutex::new) }
    }

    pub fn collection(&self) -> CollectionId {
        self.collection
    }

    pub fn store(&self) -> &'db S {
        self.store
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Writes staged by this session's transaction (0 in auto-commit mode).
    pub fn staged_len(&self) -> usize {
        self.tx.as_ref().map_or(0, |tx| tx.lock().staged_len())
    }

    /// Bind `keys` to this session. Keys may repeat.
    pub fn sample<'s>(&'s self, keys: &'s [Key]) -> SampleProxy<'s, 'db, S> {
        SampleProxy { session: self, keys }
    }

    /// Up to `limit` present keys `>= min_key`, ascending, with value lengths.
    pub fn scan(&self, min_key: Key, limit: usize) -> Result<ScanResult> {
        match &self.tx {
            Some(tx) => self.store.scan(Some(&*tx.lock()), self.collection, min_key, limit),
            None => self.store.scan(None, self.collection, min_key, limit),
        }
    }

    /// Make the transaction's writes visible. No-op in auto-commit mode.
    pub fn commit(self) -> Result<()> {
        match self.tx {
            Some(tx) => self.store.commit_tx(tx.into_inner()),
            None => Ok(()),
        }
    }

    /// Discard the transaction's writes. No-op in auto-commit mode.
    pub fn rollback(self) -> Result<()> {
        match self.tx {
            Some(tx) => self.store.rollback_tx(tx.into_inner()),
            None => Ok(()),
        }
    }

    pub(crate) fn write(&self, keys: &[Key], values: &DisjointValuesView<'_>) -> Result<()> {
        match &self.tx {
            Some(tx) => self.store.write(Some(&mut *tx.lock()), self.collection, keys, values),
            None => self.store.write(None, self.collection, keys, values),
        }
    }

    pub(crate) fn read(&self, keys: &[Key]) -> Result<Tape> {
        match &self.tx {
            Some(tx) => self.store.read(Some(&*tx.lock()), self.collection, keys),
            None => self.store.read(None, self.collection, keys),
        }
    }

    pub(crate) fn lengths(&self, keys: &[Key]) -> Result<Vec<Option<u32>>> {
        match &self.tx {
            Some(tx) => self.store.lengths(Some(&*tx.lock()), self.collection, keys),
            None => self.store.lengths(None, self.collection, keys),
        }
    }
}

// ============================================================================
// SampleProxy
// ============================================================================

/// An ordered, possibly repeating list of keys bound to a session.
///
/// ```rust
/// use kvgraph::{Database, DisjointValuesView};
///
/// let db = Database::open_memory().unwrap();
/// let session = db.session();
/// let keys = [34, 35, 36];
/// let proxy = session.sample(&keys);
///
/// proxy.set(&DisjointValuesView::packed(b"abbccc", &[0, 1, 3], &[1, 2, 3]).unwrap()).unwrap();
/// let tape = proxy.get().unwrap();
/// assert_eq!(tape.values().get(1), Some(&b"bb"[..]));
/// ```
pub struct SampleProxy<'s, 'db, S: Store> {
    session: &'s Session<'db, S>,
    keys: &'s [Key],
}

impl<'s, 'db, S: Store> SampleProxy<'s, 'db, S> {
    pub fn keys(&self) -> &'s [Key] {
        self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Replace the value of every bound key with the matching value.
    pub fn set(&self, values: &DisjointValuesView<'_>) -> Result<()> {
        if values.len() != self.keys.len() {
            return Err(Error::ShapeMismatch { keys: self.keys.len(), values: values.len() });
        }
        self.session.write(self.keys, values)
    }

    /// Current values in key order; missing keys read as zero-length.
    pub fn get(&self) -> Result<Tape> {
        self.session.read(self.keys)
    }

    /// Value lengths in key order; `None` for missing keys.
    pub fn lengths(&self) -> Result<Vec<Option<u32>>> {
        self.session.lengths(self.keys)
    }

    /// Presence of every bound key.
    pub fn contains(&self) -> Result<Vec<bool>> {
        Ok(self.lengths()?.into_iter().map(|l| l.is_some()).collect())
    }

    /// Remove every bound key.
    pub fn erase(&self) -> Result<()> {
        self.session.write(self.keys, &DisjointValuesView::erasures(self.keys.len()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::{Database, DisjointValuesView, Error, TxMode};

    #[test]
    fn test_proxy_shape_mismatch() {
        let db = Database::open_memory().unwrap();
        let session = db.session();
        let proxy = session.sample(&[1, 2, 3]);
        let err = proxy.set(&DisjointValuesView::from_slices(&[&b"a"[..]])).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { keys: 3, values: 1 }));
    }

    #[test]
    fn test_erase_and_contains() {
        let db = Database::open_memory().unwrap();
        let session = db.session();
        let keys = [3, 4];
        let proxy = session.sample(&keys);
        proxy.set(&DisjointValuesView::from_slices(&[&b"x"[..], &b"y"[..]])).unwrap();
        assert_eq!(proxy.contains().unwrap(), vec![true, true]);

        proxy.erase().unwrap();
        assert_eq!(proxy.contains().unwrap(), vec![false, false]);
        assert_eq!(proxy.get().unwrap().lengths(), &[0, 0]);
    }

    #[test]
    fn test_proxies_share_a_transaction() {
        let db = Database::open_memory().unwrap();
        let txn = db.transaction(TxMode::ReadWrite).unwrap();
        let first = txn.sample(&[1]);
        let second = txn.sample(&[2]);
        first.set(&DisjointValuesView::from_slices(&[&b"one"[..]])).unwrap();
        second.set(&DisjointValuesView::from_slices(&[&b"two"[..]])).unwrap();
        assert_eq!(txn.staged_len(), 2);
        assert_eq!(db.session().sample(&[1, 2]).contains().unwrap(), vec![false, false]);

        txn.commit().unwrap();
        assert_eq!(db.session().sample(&[1, 2]).contains().unwrap(), vec![true, true]);
    }
}
