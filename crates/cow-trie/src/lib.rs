//! A persistent, copy-on-write hexary Merkle-Patricia trie backed by a
//! content-addressed node store.
//!
//! Committed roots are immutable snapshots; mutation happens inside a
//! [`Txn`] opened over a committed [`Trie`] and becomes visible only when the
//! transaction commits, hashing the new nodes and writing their canonical
//! encodings back to the [`Store`].
#![no_std]
extern crate alloc;
#[cfg(test)]
extern crate std;

mod error;
pub mod nibbles;
mod store;
mod trie;

pub use error::{StoreError, TrieError};
pub use store::{Batch, MemStore, Store};
pub use trie::{FullNode, Node, NodeRef, ShortNode, Trie, Txn, Value};
