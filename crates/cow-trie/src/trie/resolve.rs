//! On-demand materialisation of hash references from the backing store.

use alloc::sync::Arc;
use alloy_primitives::B256;

use super::nodes::Node;
use crate::error::TrieError;
use crate::store::Store;

/// Fetches and decodes the node stored under `hash`. `Ok(None)` when the
/// store has no entry for it; the caller decides whether that is benign
/// (lookup, delete) or corruption (insert).
pub(crate) fn resolve<S: Store>(store: &S, hash: &B256) -> Result<Option<Arc<Node>>, TrieError> {
    let Some(bytes) = store.get(hash)? else {
        return Ok(None);
    };
    let node = Node::decode(&mut &bytes[..])?;
    Ok(Some(Arc::new(node)))
}
