#![no_main]

use std::collections::BTreeMap;
use std::sync::Arc;

use alloy_primitives::Bytes;
use arbitrary::Arbitrary;
use cow_trie::{MemStore, Trie};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Insert { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

#[derive(Debug, Arbitrary)]
struct Input {
    ops: Vec<Op>,
}

// Commit the result of an arbitrary op sequence, reopen it from the root
// hash alone, and require identical contents and root.
fuzz_target!(|input: Input| {
    let store = Arc::new(MemStore::new());
    let mut txn = Trie::new(store.clone()).begin();
    let mut model = BTreeMap::<Vec<u8>, Bytes>::new();

    for op in &input.ops {
        match op {
            Op::Insert { key, value } => {
                if key.len() > 64 {
                    continue;
                }
                let value = Bytes::copy_from_slice(value);
                txn.insert(key, value.clone()).unwrap();
                if value.is_empty() {
                    model.remove(key);
                } else {
                    model.insert(key.clone(), value);
                }
            }
            Op::Delete { key } => {
                txn.delete(key).unwrap();
                model.remove(key);
            }
        }
    }

    let (committed, root) = txn.commit().unwrap();
    assert_eq!(committed.root_hash(), root);

    let reopened = Trie::open(root, store);
    for (key, value) in &model {
        assert_eq!(
            reopened.get(key).unwrap().as_ref(),
            Some(value),
            "committed value lost across reopen"
        );
    }

    // A second pass over a fresh transaction must reproduce the same root.
    let mut rebuilt = Trie::new(Arc::new(MemStore::new())).begin();
    for (key, value) in &model {
        rebuilt.insert(key, value.clone()).unwrap();
    }
    assert_eq!(rebuilt.root_hash(), root, "rebuilt root diverged");
});
