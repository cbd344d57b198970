//! Node variants of the trie graph and the cached child-reference form.

use alloc::{sync::Arc, vec::Vec};
use alloy_primitives::{keccak256, Bytes, B256};

/// Branch edge index selected by the terminator nibble: the value slot.
pub(crate) const VALUE_SLOT: u8 = 16;

/// A node as embedded in its parent's canonical encoding: the encoding
/// itself when shorter than 32 bytes, its Keccak-256 otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRef {
    Inline(Vec<u8>),
    Hash(B256),
}

impl NodeRef {
    /// Hash of the referenced node's canonical encoding.
    pub fn hash(&self) -> B256 {
        match self {
            NodeRef::Inline(encoding) => keccak256(encoding),
            NodeRef::Hash(hash) => *hash,
        }
    }
}

/// Leaf slot content: an opaque payload, or the hash of a committed node
/// still sitting in the backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Payload(Bytes),
    Hash(B256),
}

/// Extension or leaf: a non-empty nibble key over exactly one child. The key
/// ends in the terminator nibble iff the child is a stored value.
#[derive(Debug, Clone)]
pub struct ShortNode {
    pub key: Vec<u8>,
    pub child: Arc<Node>,
    pub(crate) cache: Option<NodeRef>,
}

impl ShortNode {
    pub(crate) fn new(key: Vec<u8>, child: Arc<Node>) -> Self {
        debug_assert!(!key.is_empty(), "short node with empty key");
        Self {
            key,
            child,
            cache: None,
        }
    }
}

/// Branch: sixteen children indexed by the next nibble plus a value slot
/// selected by the terminator. Tagged with the epoch of the transaction that
/// created it, which decides in-place mutation vs clone on write.
#[derive(Debug, Clone)]
pub struct FullNode {
    pub(crate) epoch: u32,
    pub(crate) children: Edges,
    pub(crate) value: Option<Arc<Node>>,
    pub(crate) cache: Option<NodeRef>,
}

impl FullNode {
    pub(crate) fn new(epoch: u32) -> Self {
        Self {
            epoch,
            children: Edges::new(),
            value: None,
            cache: None,
        }
    }

    /// Shallow copy tagged with `epoch`; the clone starts with an empty hash
    /// cache.
    pub(crate) fn reopened(&self, epoch: u32) -> Self {
        Self {
            epoch,
            children: self.children.clone(),
            value: self.value.clone(),
            cache: None,
        }
    }

    /// Edge at `idx`, where index 16 is the value slot.
    pub fn edge(&self, idx: u8) -> Option<&Arc<Node>> {
        if idx == VALUE_SLOT {
            self.value.as_ref()
        } else {
            self.children.get(idx as usize)
        }
    }

    pub(crate) fn take_edge(&mut self, idx: u8) -> Option<Arc<Node>> {
        if idx == VALUE_SLOT {
            self.value.take()
        } else {
            self.children.take(idx as usize)
        }
    }

    pub(crate) fn set_edge(&mut self, idx: u8, node: Option<Arc<Node>>) {
        if idx == VALUE_SLOT {
            self.value = node;
        } else {
            match node {
                Some(node) => self.children.insert(idx as usize, node),
                None => self.children.remove(idx as usize),
            }
        }
    }

    /// Number of occupied slots across the sixteen children and the value.
    pub fn occupied(&self) -> usize {
        self.children.len() + usize::from(self.value.is_some())
    }
}

/// Sixteen-slot child array with a presence bitmap.
#[derive(Debug, Clone, Default)]
pub(crate) struct Edges {
    slots: [Option<Arc<Node>>; 16],
    flags: u16,
}

impl Edges {
    pub(crate) fn new() -> Self {
        Self {
            slots: [const { None }; 16],
            flags: 0,
        }
    }

    pub(crate) fn get(&self, idx: usize) -> Option<&Arc<Node>> {
        self.slots[idx].as_ref()
    }

    pub(crate) fn take(&mut self, idx: usize) -> Option<Arc<Node>> {
        self.flags &= !(1 << idx);
        self.slots[idx].take()
    }

    pub(crate) fn insert(&mut self, idx: usize, node: Arc<Node>) {
        self.slots[idx] = Some(node);
        self.flags |= 1 << idx;
    }

    pub(crate) fn remove(&mut self, idx: usize) {
        self.slots[idx] = None;
        self.flags &= !(1 << idx);
    }

    pub(crate) fn len(&self) -> usize {
        self.flags.count_ones() as usize
    }

    /// The sole occupied slot, if exactly one is occupied.
    pub(crate) fn only_child(&self) -> Option<(usize, &Arc<Node>)> {
        if self.flags == 0 || self.flags & (self.flags - 1) != 0 {
            return None;
        }
        let idx = self.flags.trailing_zeros() as usize;
        self.slots[idx].as_ref().map(|node| (idx, node))
    }

    pub(crate) fn iter(&self) -> core::slice::Iter<'_, Option<Arc<Node>>> {
        self.slots.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> core::slice::IterMut<'_, Option<Arc<Node>>> {
        self.slots.iter_mut()
    }
}

/// A node of the trie graph. The empty trie is the absence of a node.
#[derive(Debug, Clone)]
pub enum Node {
    Value(Value),
    Short(ShortNode),
    Full(FullNode),
}

impl Node {
    /// Cached reference form, if computed since the last structural change.
    pub fn cached_ref(&self) -> Option<&NodeRef> {
        match self {
            Node::Value(_) => None,
            Node::Short(short) => short.cache.as_ref(),
            Node::Full(full) => full.cache.as_ref(),
        }
    }
}
