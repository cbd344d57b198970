//! Canonical node decoding.
//!
//! Stored node bodies are always two-element (short) or seventeen-element
//! (full) lists. Child slots hold an empty string, a 32-byte hash reference,
//! or an inlined node body shorter than 32 bytes; the value slot and leaf
//! children hold the raw payload byte string.

use alloc::{sync::Arc, vec::Vec};
use alloy_primitives::{Bytes, B256};
use alloy_rlp::{Header, PayloadView, EMPTY_STRING_CODE};

use super::nodes::{FullNode, Node, ShortNode, Value};
use crate::nibbles::{self, TERMINATOR};

/// Epoch assigned to nodes materialised from storage; it predates every open
/// transaction, so the first write inside any transaction clones them.
pub(crate) const STORED_EPOCH: u32 = 0;

impl Node {
    /// Decodes a stored node body.
    pub(crate) fn decode(buf: &mut &[u8]) -> Result<Node, alloy_rlp::Error> {
        match Header::decode_raw(buf)? {
            PayloadView::List(items) if items.len() == 17 => {
                let mut full = FullNode::new(STORED_EPOCH);
                for (idx, item) in items[..16].iter().enumerate() {
                    if let Some(child) = decode_child(item)? {
                        full.children.insert(idx, Arc::new(child));
                    }
                }
                let value = decode_string(items[16])?;
                if !value.is_empty() {
                    let value = Node::Value(Value::Payload(Bytes::copy_from_slice(value)));
                    full.value = Some(Arc::new(value));
                }
                Ok(Node::Full(full))
            }
            PayloadView::List(items) if items.len() == 2 => {
                let key = nibbles::decode_path(decode_string(items[0])?)?;
                if key.is_empty() {
                    return Err(alloy_rlp::Error::Custom("short node with empty key"));
                }
                let child = if key.last() == Some(&TERMINATOR) {
                    let payload = decode_string(items[1])?;
                    if payload.is_empty() {
                        return Err(alloy_rlp::Error::Custom("leaf node without a value"));
                    }
                    Node::Value(Value::Payload(Bytes::copy_from_slice(payload)))
                } else {
                    decode_child(items[1])?
                        .ok_or(alloy_rlp::Error::Custom("extension node without a child"))?
                };
                Ok(Node::Short(ShortNode::new(key, Arc::new(child))))
            }
            PayloadView::List(_) => Err(alloy_rlp::Error::Custom("invalid node list length")),
            PayloadView::String(_) => Err(alloy_rlp::Error::Custom("stored node is not a list")),
        }
    }
}

/// Decodes one structural child slot: empty, a hash reference, or an inlined
/// node body.
fn decode_child(item: &[u8]) -> Result<Option<Node>, alloy_rlp::Error> {
    let mut probe = item;
    match Header::decode_raw(&mut probe)? {
        PayloadView::String(payload) => {
            if payload.is_empty() {
                Ok(None)
            } else if payload.len() == 32 {
                Ok(Some(Node::Value(Value::Hash(B256::from_slice(payload)))))
            } else {
                Err(alloy_rlp::Error::Custom("invalid child reference length"))
            }
        }
        PayloadView::List(_) => Node::decode(&mut &item[..]).map(Some),
    }
}

fn decode_string(item: &[u8]) -> Result<&[u8], alloy_rlp::Error> {
    if item == [EMPTY_STRING_CODE] {
        return Ok(&[]);
    }
    Header::decode_bytes(&mut &item[..], false)
}

/// Encodes a list header for a known payload length, reserving the buffer.
pub(crate) fn encode_list_header(payload_length: usize) -> Vec<u8> {
    let header = Header {
        list: true,
        payload_length,
    };
    let mut out = Vec::with_capacity(header.length() + payload_length);
    header.encode(&mut out);
    out
}
