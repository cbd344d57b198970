//! Insertion over the copy-on-write node graph.
//!
//! Unchanged sub-trees are shared with the previous root; short and value
//! nodes on the changed path are rebuilt fresh, full nodes go through the
//! transaction's write discipline.

use alloc::sync::Arc;
use alloy_primitives::Bytes;

use super::nodes::{FullNode, Node, ShortNode, Value, VALUE_SLOT};
use super::resolve::resolve;
use super::trie::Txn;
use crate::error::TrieError;
use crate::nibbles;
use crate::store::Store;

impl<S: Store> Txn<S> {
    pub(super) fn insert_node(
        &mut self,
        node: Option<Arc<Node>>,
        search: &[u8],
        value: Bytes,
    ) -> Result<Arc<Node>, TrieError> {
        let Some(node) = node else {
            // Empty slot: the payload lands here, behind a fresh leaf when
            // part of the key remains to be consumed.
            let payload = Arc::new(Node::Value(Value::Payload(value)));
            return Ok(if search.is_empty() {
                payload
            } else {
                Arc::new(Node::Short(ShortNode::new(search.to_vec(), payload)))
            });
        };

        if matches!(&*node, Node::Full(_)) {
            return self.insert_full(node, search, value);
        }

        match &*node {
            Node::Value(Value::Payload(_)) => {
                if search.is_empty() {
                    Ok(Arc::new(Node::Value(Value::Payload(value))))
                } else {
                    // Lift the stored value into a branch value slot, then
                    // keep inserting below the branch.
                    let mut branch = FullNode::new(self.epoch);
                    branch.value = Some(node.clone());
                    self.insert_full(Arc::new(Node::Full(branch)), search, value)
                }
            }
            Node::Value(Value::Hash(hash)) => {
                let resolved =
                    resolve(&*self.store, hash)?.ok_or(TrieError::NodeMissing(*hash))?;
                self.insert_node(Some(resolved), search, value)
            }
            Node::Short(short) => {
                let prefix = nibbles::common_prefix_length(search, &short.key);
                if prefix == short.key.len() {
                    // The whole short key matches: replace the child.
                    let child =
                        self.insert_node(Some(short.child.clone()), &search[prefix..], value)?;
                    Ok(Arc::new(Node::Short(ShortNode::new(
                        short.key.clone(),
                        child,
                    ))))
                } else {
                    // Diverges inside the short key: branch at the first
                    // differing nibble, old child on one edge.
                    let mut branch = FullNode::new(self.epoch);
                    let old = if short.key.len() > prefix + 1 {
                        Arc::new(Node::Short(ShortNode::new(
                            short.key[prefix + 1..].to_vec(),
                            short.child.clone(),
                        )))
                    } else {
                        short.child.clone()
                    };
                    branch.set_edge(short.key[prefix], Some(old));

                    let branch =
                        self.insert_full(Arc::new(Node::Full(branch)), &search[prefix..], value)?;
                    if prefix == 0 {
                        Ok(branch)
                    } else {
                        Ok(Arc::new(Node::Short(ShortNode::new(
                            search[..prefix].to_vec(),
                            branch,
                        ))))
                    }
                }
            }
            Node::Full(_) => unreachable!("handled above"),
        }
    }

    fn insert_full(
        &mut self,
        node: Arc<Node>,
        search: &[u8],
        value: Bytes,
    ) -> Result<Arc<Node>, TrieError> {
        let mut node = self.write_full(node);
        let (idx, rest) = match search.split_first() {
            Some((&idx, rest)) => (idx, rest),
            None => (VALUE_SLOT, &[][..]),
        };

        let child = {
            let Node::Full(full) = Arc::make_mut(&mut node) else {
                unreachable!("write_full yields a full node")
            };
            full.cache = None;
            full.take_edge(idx)
        };
        let child = self.insert_node(child, rest, value)?;

        let Node::Full(full) = Arc::make_mut(&mut node) else {
            unreachable!("write_full yields a full node")
        };
        full.set_edge(idx, Some(child));
        Ok(node)
    }
}
