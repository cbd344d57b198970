#![no_main]

use std::collections::BTreeMap;
use std::sync::Arc;

use alloy_primitives::{Bytes, B256};
use alloy_trie::{HashBuilder, Nibbles};
use arbitrary::Arbitrary;
use cow_trie::{MemStore, Trie};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Insert { key: [u8; 32], value: Vec<u8> },
    Delete { key: [u8; 32] },
}

#[derive(Debug, Arbitrary)]
struct Input {
    ops: Vec<Op>,
}

fn model_root(model: &BTreeMap<B256, Bytes>) -> B256 {
    let mut hash_builder = HashBuilder::default();
    for (key, value) in model {
        hash_builder.add_leaf(Nibbles::unpack(*key), value);
    }
    hash_builder.root()
}

fuzz_target!(|input: Input| {
    let mut txn = Trie::new(Arc::new(MemStore::new())).begin();
    let mut model = BTreeMap::<B256, Bytes>::new();

    for op in &input.ops {
        match op {
            Op::Insert { key, value } => {
                let key = B256::from(*key);
                let value = Bytes::copy_from_slice(value);
                txn.insert(key.as_slice(), value.clone()).unwrap();
                if value.is_empty() {
                    // An empty value is a removal.
                    model.remove(&key);
                } else {
                    model.insert(key, value);
                }
            }
            Op::Delete { key } => {
                let key = B256::from(*key);
                txn.delete(key.as_slice()).unwrap();
                model.remove(&key);
            }
        }

        // Validate after each operation so transient divergences are not
        // masked by later ops.
        let expected = model_root(&model);
        let actual = txn.root_hash();
        assert_eq!(actual, expected, "trie root != HashBuilder root");
    }
});
