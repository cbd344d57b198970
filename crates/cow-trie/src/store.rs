//! Content-addressed backing store contract, the commit write batch, and the
//! in-memory store used by tests and lightweight deployments.

use alloc::vec::Vec;
use core::cell::RefCell;

use alloy_primitives::{map::B256Map, Bytes, B256};

use crate::error::StoreError;

/// Write set accumulated during commit.
///
/// Keys are content addresses (hashes of the values), so entry order is
/// irrelevant and duplicates are harmless.
#[derive(Debug, Default)]
pub struct Batch {
    entries: Vec<(B256, Bytes)>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages `value` under `key`.
    pub fn put(&mut self, key: B256, value: Bytes) {
        self.entries.push((key, value));
    }

    /// Moves every entry of `other` into this batch.
    pub fn extend(&mut self, other: Batch) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumes the batch, yielding its entries.
    pub fn into_entries(self) -> Vec<(B256, Bytes)> {
        self.entries
    }
}

/// Content-addressed node store: 32-byte hash to canonical encoding. The
/// two-level commit driver also stores contract code through the same map.
pub trait Store {
    /// Fetches the bytes stored under `hash`. `Ok(None)` means the hash is
    /// unknown to the store; `Err` is a lower-level fault.
    fn get(&self, hash: &B256) -> Result<Option<Bytes>, StoreError>;

    /// Applies a batch atomically: either every entry becomes readable or,
    /// on error, none of them.
    fn write(&self, batch: Batch) -> Result<(), StoreError>;
}

/// In-memory [`Store`].
#[derive(Debug, Default)]
pub struct MemStore {
    entries: RefCell<B256Map<Bytes>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl Store for MemStore {
    fn get(&self, hash: &B256) -> Result<Option<Bytes>, StoreError> {
        Ok(self.entries.borrow().get(hash).cloned())
    }

    fn write(&self, batch: Batch) -> Result<(), StoreError> {
        let mut entries = self.entries.borrow_mut();
        for (key, value) in batch.into_entries() {
            entries.insert(key, value);
        }
        Ok(())
    }
}
