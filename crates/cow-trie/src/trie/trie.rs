//! Trie handles and the transactions opened over them.

use alloc::sync::Arc;
use alloy_primitives::{Bytes, B256};
use alloy_trie::EMPTY_ROOT_HASH;

use super::nodes::{Node, NodeRef, Value};
use crate::error::TrieError;
use crate::nibbles::{self, TERMINATOR};
use crate::store::{Batch, Store};

/// An immutable, committed view of the trie. Cheap to clone; clones share
/// structure and may be used from other threads.
#[derive(Debug)]
pub struct Trie<S> {
    pub(super) root: Option<Arc<Node>>,
    pub(super) epoch: u32,
    pub(super) store: Arc<S>,
}

// Not derived: clones share the store handle, so `S` itself need not be
// cloneable.
impl<S> Clone for Trie<S> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            epoch: self.epoch,
            store: self.store.clone(),
        }
    }
}

impl<S: Store> Trie<S> {
    /// Creates an empty trie over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            root: None,
            epoch: 0,
            store,
        }
    }

    /// Opens a committed trie by root hash. The root stays a hash reference
    /// until an operation first resolves it against the store.
    pub fn open(root: B256, store: Arc<S>) -> Self {
        let root = (root != EMPTY_ROOT_HASH).then(|| Arc::new(Node::Value(Value::Hash(root))));
        Self {
            root,
            epoch: 0,
            store,
        }
    }

    /// Root hash of this view.
    pub fn root_hash(&self) -> B256 {
        match self.root.as_deref() {
            None => EMPTY_ROOT_HASH,
            Some(Node::Value(Value::Hash(hash))) => *hash,
            Some(node) => node
                .cached_ref()
                .map(NodeRef::hash)
                .expect("committed root carries a cached reference"),
        }
    }

    /// Point lookup against this view.
    pub fn get(&self, key: &[u8]) -> Result<Option<Bytes>, TrieError> {
        self.begin().lookup(key)
    }

    /// Opens a write transaction over this view. The view itself is
    /// unaffected by anything the transaction does.
    pub fn begin(&self) -> Txn<S> {
        Txn {
            root: self.root.clone(),
            epoch: self.epoch + 1,
            store: self.store.clone(),
            batch: Batch::new(),
        }
    }

    /// Root node, if the trie is non-empty. Exposed for structural
    /// inspection; mutation goes through transactions.
    pub fn root(&self) -> Option<&Arc<Node>> {
        self.root.as_ref()
    }

    /// Store handle this trie resolves against.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

/// A single-owner write transaction over a committed root.
///
/// Mutations construct new nodes that share unchanged sub-trees with the
/// base view; nodes reachable from previously committed roots are never
/// touched. A transaction that returns an error must be discarded.
#[derive(Debug)]
pub struct Txn<S> {
    pub(super) root: Option<Arc<Node>>,
    pub(super) epoch: u32,
    pub(super) store: Arc<S>,
    pub(super) batch: Batch,
}

impl<S: Store> Txn<S> {
    /// Looks `key` up in the transaction's current state.
    pub fn lookup(&self, key: &[u8]) -> Result<Option<Bytes>, TrieError> {
        let search = search_key(key);
        self.lookup_node(self.root.as_ref(), &search)
    }

    /// Maps `key` to `value`. An empty value removes the key; an empty
    /// payload has no canonical encoding.
    pub fn insert(&mut self, key: &[u8], value: Bytes) -> Result<(), TrieError> {
        if value.is_empty() {
            return self.delete(key).map(|_| ());
        }
        let search = search_key(key);
        let taken_root = self.root.take();
        let root = self.insert_node(taken_root, &search, value)?;
        self.root = Some(root);
        Ok(())
    }

    /// Removes `key`, reporting whether anything changed.
    pub fn delete(&mut self, key: &[u8]) -> Result<bool, TrieError> {
        let search = search_key(key);
        let taken_root = self.root.take();
        let (root, changed) = self.delete_node(taken_root, &search)?;
        self.root = root;
        Ok(changed)
    }

    /// Root hash of the transaction's current state. Dirty encodings are
    /// staged in the transaction batch but nothing is flushed.
    pub fn root_hash(&mut self) -> B256 {
        let mut batch = core::mem::take(&mut self.batch);
        let root = self.hash_into(&mut batch);
        self.batch = batch;
        root
    }

    /// Commits into a caller-owned batch and returns the committed view with
    /// its root hash. The caller is responsible for flushing the batch; used
    /// by enclosing multi-trie commits that need a single atomic write.
    pub fn commit_with(mut self, batch: &mut Batch) -> (Trie<S>, B256) {
        let root_hash = self.root_hash();
        batch.extend(self.batch);
        let trie = Trie {
            root: self.root,
            epoch: self.epoch,
            store: self.store,
        };
        (trie, root_hash)
    }

    /// Commits: hashes bottom-up, flushes every dirty node encoding to the
    /// store in one atomic batch, and returns the committed view.
    pub fn commit(self) -> Result<(Trie<S>, B256), TrieError> {
        let store = self.store.clone();
        let mut batch = Batch::new();
        let (trie, root_hash) = self.commit_with(&mut batch);
        store.write(batch)?;
        Ok((trie, root_hash))
    }

    /// Returns a full node safe to mutate within this transaction: `node`
    /// itself when its epoch already matches, otherwise a shallow clone
    /// tagged with the transaction epoch.
    pub(super) fn write_full(&self, node: Arc<Node>) -> Arc<Node> {
        match &*node {
            Node::Full(full) if full.epoch != self.epoch => {
                Arc::new(Node::Full(full.reopened(self.epoch)))
            }
            _ => node,
        }
    }
}

fn search_key(key: &[u8]) -> alloc::vec::Vec<u8> {
    let mut search = nibbles::unpack(key);
    search.push(TERMINATOR);
    search
}
