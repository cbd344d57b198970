//! Point lookup.

use alloc::sync::Arc;
use alloy_primitives::Bytes;

use super::nodes::{Node, Value};
use super::resolve::resolve;
use super::trie::Txn;
use crate::error::TrieError;
use crate::store::Store;

impl<S: Store> Txn<S> {
    pub(super) fn lookup_node(
        &self,
        node: Option<&Arc<Node>>,
        search: &[u8],
    ) -> Result<Option<Bytes>, TrieError> {
        let Some(node) = node else {
            return Ok(None);
        };
        match &**node {
            Node::Value(Value::Payload(payload)) => {
                Ok(search.is_empty().then(|| payload.clone()))
            }
            Node::Value(Value::Hash(hash)) => match resolve(&*self.store, hash)? {
                Some(resolved) => self.lookup_node(Some(&resolved), search),
                None => Ok(None),
            },
            Node::Short(short) => match search.strip_prefix(short.key.as_slice()) {
                Some(rest) => self.lookup_node(Some(&short.child), rest),
                None => Ok(None),
            },
            Node::Full(full) => match search.split_first() {
                Some((&idx, rest)) => self.lookup_node(full.edge(idx), rest),
                None => self.lookup_node(full.value.as_ref(), search),
            },
        }
    }
}
