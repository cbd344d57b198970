//! Bottom-up canonical encoding, hashing, and batch emission.

use alloc::{sync::Arc, vec::Vec};
use alloy_primitives::{keccak256, B256};
use alloy_rlp::{Encodable, EMPTY_STRING_CODE};
use alloy_trie::EMPTY_ROOT_HASH;

use super::nodes::{FullNode, Node, NodeRef, ShortNode, Value};
use super::rlp::encode_list_header;
use super::trie::Txn;
use crate::nibbles;
use crate::store::{Batch, Store};

impl NodeRef {
    /// Appends this reference to a parent's body: inline encodings verbatim,
    /// hashes as 32-byte strings.
    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            NodeRef::Inline(encoding) => out.extend_from_slice(encoding),
            NodeRef::Hash(hash) => hash.encode(out),
        }
    }
}

impl<S: Store> Txn<S> {
    /// Hashes the current root, emitting dirty node encodings into `batch`.
    pub(super) fn hash_into(&mut self, batch: &mut Batch) -> B256 {
        let Some(root) = self.root.as_mut() else {
            return EMPTY_ROOT_HASH;
        };
        match commit_ref(root, batch) {
            // The root's encoding is persisted even when inline-sized, so
            // the trie can be reopened from its hash alone.
            NodeRef::Inline(encoding) => {
                let hash = keccak256(&encoding);
                batch.put(hash, encoding.into());
                hash
            }
            NodeRef::Hash(hash) => hash,
        }
    }
}

/// Reference form of `node`, hashing children first. Computed references are
/// cached on the node; encodings of 32 bytes or more are emitted into
/// `batch` under their hash.
fn commit_ref(node: &mut Arc<Node>, batch: &mut Batch) -> NodeRef {
    if let Node::Value(Value::Hash(hash)) = &**node {
        return NodeRef::Hash(*hash);
    }
    if let Some(cached) = node.cached_ref() {
        return cached.clone();
    }

    let inner = Arc::make_mut(node);
    let encoding = match &mut *inner {
        Node::Short(short) => encode_short(short, batch),
        Node::Full(full) => encode_full(full, batch),
        Node::Value(_) => unreachable!("value nodes embed in their parent"),
    };
    let reference = if encoding.len() < 32 {
        NodeRef::Inline(encoding)
    } else {
        let hash = keccak256(&encoding);
        batch.put(hash, encoding.into());
        NodeRef::Hash(hash)
    };
    match &mut *inner {
        Node::Short(short) => short.cache = Some(reference.clone()),
        Node::Full(full) => full.cache = Some(reference.clone()),
        Node::Value(_) => unreachable!(),
    }
    reference
}

/// Appends a child's embedded form to `out`: payloads and hashes as byte
/// strings, structural children per the under-32-byte inlining rule.
fn encode_child(child: &mut Arc<Node>, out: &mut Vec<u8>, batch: &mut Batch) {
    match &**child {
        Node::Value(Value::Payload(payload)) => payload[..].encode(out),
        Node::Value(Value::Hash(hash)) => hash.encode(out),
        _ => commit_ref(child, batch).encode_into(out),
    }
}

fn encode_short(short: &mut ShortNode, batch: &mut Batch) -> Vec<u8> {
    let path = nibbles::encode_path(&short.key);
    let mut child = Vec::new();
    encode_child(&mut short.child, &mut child, batch);

    let mut out = encode_list_header(path.as_slice().length() + child.len());
    path.as_slice().encode(&mut out);
    out.extend_from_slice(&child);
    out
}

fn encode_full(full: &mut FullNode, batch: &mut Batch) -> Vec<u8> {
    // TODO: reuse one body buffer across the commit walk instead of
    // allocating per branch.
    let mut body = Vec::new();
    for slot in full.children.iter_mut() {
        match slot {
            Some(child) => encode_child(child, &mut body, batch),
            None => body.push(EMPTY_STRING_CODE),
        }
    }
    match &mut full.value {
        Some(value) => encode_child(value, &mut body, batch),
        None => body.push(EMPTY_STRING_CODE),
    }

    let mut out = encode_list_header(body.len());
    out.extend_from_slice(&body);
    out
}
