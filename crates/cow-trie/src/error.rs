//! Error kinds surfaced by trie operations.

use alloc::string::String;
use alloy_primitives::B256;
use thiserror::Error;

/// Fault reported by the content-addressed backing store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("backing store fault: {0}")]
pub struct StoreError(pub String);

/// Errors surfaced by trie operations.
///
/// Absent nodes are only an error where the operation cannot proceed without
/// them (inserting below a hash reference); lookup and delete treat an
/// absent node as "key not present".
#[derive(Debug, Error)]
pub enum TrieError {
    /// A hash reference that must resolve was not found in the backing
    /// store. Indicates store corruption.
    #[error("missing trie node {0}")]
    NodeMissing(B256),
    /// The backing store reported a lower-level fault.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Stored bytes could not be decoded as a canonical node.
    #[error("node decode failed: {0}")]
    Rlp(#[from] alloy_rlp::Error),
}
