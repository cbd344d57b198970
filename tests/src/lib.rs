#![allow(missing_docs)]

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use account_state::{AccountChange, ChangeSet, State};
    use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
    use alloy_trie::{HashBuilder, Nibbles, EMPTY_ROOT_HASH};
    use cow_trie::{MemStore, Node, Trie, Value};

    /// Deterministic 20-byte key / 32-byte value pairs.
    fn pair(index: u32) -> (Vec<u8>, Bytes) {
        let seed = index.to_be_bytes();
        let key = keccak256(seed).as_slice()[..20].to_vec();
        let value = Bytes::copy_from_slice(keccak256([&seed[..], b"v"].concat()).as_slice());
        (key, value)
    }

    fn hash_builder_root(entries: &BTreeMap<Vec<u8>, Bytes>) -> B256 {
        let mut hash_builder = HashBuilder::default();
        for (key, value) in entries {
            hash_builder.add_leaf(Nibbles::unpack(key), value);
        }
        hash_builder.root()
    }

    #[test]
    fn ten_thousand_keys_survive_commit_and_reopen() {
        let store = Arc::new(MemStore::new());
        let mut txn = Trie::new(store.clone()).begin();

        for index in 0..10_000 {
            let (key, value) = pair(index);
            txn.insert(&key, value).unwrap();
        }
        let (_, root) = txn.commit().unwrap();

        let reopened = Trie::open(root, store);
        for index in 0..10_000 {
            let (key, value) = pair(index);
            assert_eq!(reopened.get(&key).unwrap(), Some(value), "key {index}");
        }
        let (absent, _) = pair(20_000);
        assert_eq!(reopened.get(&absent).unwrap(), None);
    }

    #[test]
    fn committed_root_matches_reference_implementation() {
        let mut model = BTreeMap::new();
        let store = Arc::new(MemStore::new());
        let mut txn = Trie::new(store).begin();

        for index in 0..512 {
            let (key, value) = pair(index);
            model.insert(key.clone(), value.clone());
            txn.insert(&key, value).unwrap();
        }
        let (_, root) = txn.commit().unwrap();
        assert_eq!(root, hash_builder_root(&model));
    }

    #[test]
    fn root_is_insertion_order_independent() {
        let pairs: Vec<_> = (0..256).map(pair).collect();

        let mut forward = Trie::new(Arc::new(MemStore::new())).begin();
        for (key, value) in &pairs {
            forward.insert(key, value.clone()).unwrap();
        }

        let mut reverse = Trie::new(Arc::new(MemStore::new())).begin();
        for (key, value) in pairs.iter().rev() {
            reverse.insert(key, value.clone()).unwrap();
        }

        assert_eq!(forward.root_hash(), reverse.root_hash());
    }

    #[test]
    fn deleting_everything_across_commits_restores_the_empty_root() {
        let store = Arc::new(MemStore::new());
        let mut txn = Trie::new(store.clone()).begin();
        for index in 0..128 {
            let (key, value) = pair(index);
            txn.insert(&key, value).unwrap();
        }
        let (committed, root) = txn.commit().unwrap();
        assert_ne!(root, EMPTY_ROOT_HASH);

        // Delete through a reopened handle so every removal walks stored
        // nodes resolved on demand.
        drop(committed);
        let reopened = Trie::open(root, store);
        let mut txn = reopened.begin();
        for index in 0..128 {
            let (key, _) = pair(index);
            assert!(txn.delete(&key).unwrap(), "key {index}");
        }
        let (_, root) = txn.commit().unwrap();
        assert_eq!(root, EMPTY_ROOT_HASH);
    }

    #[test]
    fn snapshot_reads_survive_later_commits() {
        let store = Arc::new(MemStore::new());
        let mut txn = Trie::new(store).begin();
        for index in 0..64 {
            let (key, value) = pair(index);
            txn.insert(&key, value).unwrap();
        }
        let (v1, root_v1) = txn.commit().unwrap();

        let mut txn = v1.begin();
        for index in 0..32 {
            let (key, _) = pair(index);
            txn.delete(&key).unwrap();
        }
        for index in 64..96 {
            let (key, value) = pair(index);
            txn.insert(&key, value).unwrap();
        }
        let (v2, _) = txn.commit().unwrap();

        assert_eq!(v1.root_hash(), root_v1);
        for index in 0..64 {
            let (key, value) = pair(index);
            assert_eq!(v1.get(&key).unwrap(), Some(value), "snapshot key {index}");
        }
        for index in 0..32 {
            let (key, _) = pair(index);
            assert_eq!(v2.get(&key).unwrap(), None);
        }
    }

    /// Walks a committed in-memory graph checking structural invariants:
    /// no short with an empty key, no short directly below a short, no
    /// branch with fewer than two occupied slots.
    fn assert_well_formed(node: &Node) {
        match node {
            Node::Value(_) => {}
            Node::Short(short) => {
                assert!(!short.key.is_empty(), "short node with empty key");
                assert!(
                    !matches!(&*short.child, Node::Short(_)),
                    "short below short must be merged"
                );
                assert_well_formed(&short.child);
            }
            Node::Full(full) => {
                assert!(full.occupied() >= 2, "branch with fewer than two slots");
                for idx in 0..=16 {
                    if let Some(child) = full.edge(idx) {
                        assert_well_formed(child);
                    }
                }
            }
        }
    }

    #[test]
    fn structure_stays_well_formed_under_churn() {
        let mut txn = Trie::new(Arc::new(MemStore::new())).begin();
        for round in 0_u32..6 {
            for index in 0..128 {
                let (key, value) = pair(index);
                txn.insert(&key, value).unwrap();
            }
            // Remove a different slice each round.
            for index in (round * 20)..(round * 20 + 60) {
                let (key, _) = pair(index);
                txn.delete(&key).unwrap();
            }
            let (trie, _) = txn.commit().unwrap();
            if let Some(root) = trie.root() {
                assert_well_formed(root);
            }
            txn = trie.begin();
        }
    }

    #[test]
    fn lazy_root_is_a_hash_reference_until_first_access() {
        let store = Arc::new(MemStore::new());
        let mut txn = Trie::new(store.clone()).begin();
        for index in 0..64 {
            let (key, value) = pair(index);
            txn.insert(&key, value).unwrap();
        }
        let (_, root) = txn.commit().unwrap();

        let reopened = Trie::open(root, store);
        assert!(matches!(
            reopened.root().map(|node| &**node),
            Some(Node::Value(Value::Hash(hash))) if *hash == root
        ));
        assert_eq!(reopened.root_hash(), root);
    }

    #[test]
    fn two_level_incremental_equals_fresh_rebuild() {
        let alice = Address::from_slice(&keccak256([1_u8]).as_slice()[..20]);
        let bob = Address::from_slice(&keccak256([2_u8]).as_slice()[..20]);
        let k1 = Bytes::copy_from_slice(keccak256(b"k1").as_slice());
        let k2 = Bytes::copy_from_slice(keccak256(b"k2").as_slice());

        // Incremental: alice {k1 -> v1}, bob empty; then alice gains k2.
        let mut state = State::new(Arc::new(MemStore::new()));
        let mut changes = ChangeSet::default();
        let mut alice_change = AccountChange::new(alice);
        alice_change.balance = U256::from(10_u64);
        alice_change
            .storage
            .push((k1.clone(), Some(Bytes::from_static(b"v1"))));
        changes.push(alice_change);
        changes.push(AccountChange::new(bob));
        state.commit(&changes).unwrap();

        let mut changes = ChangeSet::default();
        let mut alice_change = AccountChange::new(alice);
        alice_change.balance = U256::from(10_u64);
        alice_change
            .storage
            .push((k2.clone(), Some(Bytes::from_static(b"v2"))));
        changes.push(alice_change);
        let incremental_root = state.commit(&changes).unwrap();

        // Fresh rebuild with the final storage sets.
        let mut fresh = State::new(Arc::new(MemStore::new()));
        let mut changes = ChangeSet::default();
        let mut alice_change = AccountChange::new(alice);
        alice_change.balance = U256::from(10_u64);
        alice_change
            .storage
            .push((k1, Some(Bytes::from_static(b"v1"))));
        alice_change
            .storage
            .push((k2, Some(Bytes::from_static(b"v2"))));
        changes.push(alice_change);
        changes.push(AccountChange::new(bob));
        let fresh_root = fresh.commit(&changes).unwrap();

        assert_eq!(incremental_root, fresh_root);
    }

    #[test]
    fn state_survives_reopen_from_root() {
        let store = Arc::new(MemStore::new());
        let alice = Address::from_slice(&keccak256([1_u8]).as_slice()[..20]);
        let k1 = Bytes::copy_from_slice(keccak256(b"k1").as_slice());

        let root = {
            let mut state = State::new(store.clone());
            let mut changes = ChangeSet::default();
            let mut change = AccountChange::new(alice);
            change.nonce = 9;
            change
                .storage
                .push((k1.clone(), Some(Bytes::from_static(b"v1"))));
            changes.push(change);
            state.commit(&changes).unwrap()
        };

        let reopened = State::open(root, store);
        assert_eq!(reopened.root(), root);
        let account = reopened.account(alice).unwrap().expect("account persisted");
        assert_eq!(account.nonce, 9);
        assert_eq!(
            reopened.storage(alice, &k1).unwrap(),
            Some(Bytes::from(alloy_rlp::encode(&b"v1"[..])))
        );
    }
}
