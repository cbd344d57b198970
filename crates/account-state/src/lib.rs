//! Account-level state over per-account storage sub-tries.
//!
//! One logical commit step consumes a [`ChangeSet`]: every touched account's
//! storage sub-trie is committed first, its root folded into the account
//! record, and the record inserted into the outer account trie — all staging
//! into a single write batch that is flushed once, so either the whole new
//! state becomes durable or none of it.

use std::cell::RefCell;
use std::sync::Arc;

use alloy_primitives::{keccak256, map::B256Map, Address, Bytes, B256, U256, KECCAK256_EMPTY};
use alloy_trie::{TrieAccount, EMPTY_ROOT_HASH};
use log::trace;
use thiserror::Error;

use cow_trie::{Batch, Store, Trie, TrieError, Txn};

/// Errors surfaced by state commits and reads.
#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Trie(#[from] TrieError),
    /// An account record in the trie failed to decode.
    #[error("account record for {0} failed to decode: {1}")]
    Account(Address, alloy_rlp::Error),
}

/// Pending mutation of one account within a [`ChangeSet`].
#[derive(Debug, Clone)]
pub struct AccountChange {
    pub address: Address,
    /// Removes the account (and its record) from the outer trie.
    pub deleted: bool,
    pub nonce: u64,
    pub balance: U256,
    pub code_hash: B256,
    /// Newly written contract code, staged alongside the state batch under
    /// its Keccak-256.
    pub code: Option<Bytes>,
    /// Storage slot writes; `None` clears the slot. Keys are inserted as
    /// given — hashing policy stays with the caller.
    pub storage: Vec<(Bytes, Option<Bytes>)>,
}

impl AccountChange {
    /// A plain account update: no deletion, no code, no storage changes.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            deleted: false,
            nonce: 0,
            balance: U256::ZERO,
            code_hash: KECCAK256_EMPTY,
            code: None,
            storage: Vec::new(),
        }
    }

    /// Marks the account deleted.
    pub fn removed(address: Address) -> Self {
        Self {
            deleted: true,
            ..Self::new(address)
        }
    }
}

/// The accounts touched by one commit step.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub accounts: Vec<AccountChange>,
}

impl ChangeSet {
    pub fn push(&mut self, change: AccountChange) {
        self.accounts.push(change);
    }
}

/// The account trie plus the committed snapshots it has produced, all over
/// one backing store.
#[derive(Debug)]
pub struct State<S> {
    store: Arc<S>,
    head: Trie<S>,
    tries: RefCell<B256Map<Trie<S>>>,
}

impl<S: Store> State<S> {
    /// Fresh state with an empty account trie.
    pub fn new(store: Arc<S>) -> Self {
        let head = Trie::new(store.clone());
        Self {
            store,
            head,
            tries: RefCell::new(B256Map::default()),
        }
    }

    /// Opens the state at a previously committed root.
    pub fn open(root: B256, store: Arc<S>) -> Self {
        let head = Trie::open(root, store.clone());
        Self {
            store,
            head,
            tries: RefCell::new(B256Map::default()),
        }
    }

    /// Root hash of the current account trie.
    pub fn root(&self) -> B256 {
        self.head.root_hash()
    }

    /// Committed snapshot registered under `root`; opens lazily from the
    /// store when the cache no longer holds it.
    pub fn trie_at(&self, root: B256) -> Trie<S> {
        if let Some(trie) = self.tries.borrow().get(&root) {
            return trie.clone();
        }
        Trie::open(root, self.store.clone())
    }

    /// Decoded account record at `address`.
    pub fn account(&self, address: Address) -> Result<Option<TrieAccount>, StateError> {
        match self.head.get(keccak256(address).as_slice())? {
            Some(bytes) => alloy_rlp::decode_exact(bytes.as_ref())
                .map(Some)
                .map_err(|err| StateError::Account(address, err)),
            None => Ok(None),
        }
    }

    /// Storage value under `slot_key` in `address`'s sub-trie.
    pub fn storage(&self, address: Address, slot_key: &[u8]) -> Result<Option<Bytes>, StateError> {
        let Some(account) = self.account(address)? else {
            return Ok(None);
        };
        let trie = self.trie_at(account.storage_root);
        Ok(trie.get(slot_key)?)
    }

    /// Contract code stored under `code_hash`.
    pub fn code(&self, code_hash: &B256) -> Result<Option<Bytes>, StateError> {
        Ok(self.store.get(code_hash).map_err(TrieError::from)?)
    }

    /// Applies `changes` atomically and returns the new state root.
    ///
    /// Storage sub-trie commits and the account trie commit stage into one
    /// shared batch; the store sees a single write. The new account trie and
    /// every committed storage trie are registered in the root cache.
    pub fn commit(&mut self, changes: &ChangeSet) -> Result<B256, StateError> {
        let mut batch = Batch::new();
        let mut txn = self.head.begin();

        for change in &changes.accounts {
            let hashed = keccak256(change.address);
            if change.deleted {
                txn.delete(hashed.as_slice())?;
                continue;
            }

            let storage_root = if change.storage.is_empty() {
                self.storage_root_of(&txn, change.address, &hashed)?
            } else {
                self.apply_storage(&txn, change, &hashed, &mut batch)?
            };

            if let Some(code) = &change.code {
                batch.put(keccak256(code), code.clone());
            }

            let record = TrieAccount {
                nonce: change.nonce,
                balance: change.balance,
                storage_root,
                code_hash: change.code_hash,
            };
            txn.insert(hashed.as_slice(), alloy_rlp::encode(&record).into())?;
        }

        let (head, root) = txn.commit_with(&mut batch);
        trace!(
            "state commit: {} accounts, {} batch entries, root {root}",
            changes.accounts.len(),
            batch.len()
        );
        self.store.write(batch).map_err(TrieError::from)?;
        self.tries.borrow_mut().insert(root, head.clone());
        self.head = head;
        Ok(root)
    }

    /// Storage root currently recorded for `address`, seen through `txn` so
    /// earlier changes in the same commit step are visible.
    fn storage_root_of(
        &self,
        txn: &Txn<S>,
        address: Address,
        hashed: &B256,
    ) -> Result<B256, StateError> {
        match txn.lookup(hashed.as_slice())? {
            Some(bytes) => alloy_rlp::decode_exact::<TrieAccount>(bytes.as_ref())
                .map(|account| account.storage_root)
                .map_err(|err| StateError::Account(address, err)),
            None => Ok(EMPTY_ROOT_HASH),
        }
    }

    /// Applies one account's storage writes in a sub-trie transaction
    /// sharing `batch`, returning the new storage root.
    fn apply_storage(
        &self,
        txn: &Txn<S>,
        change: &AccountChange,
        hashed: &B256,
        batch: &mut Batch,
    ) -> Result<B256, StateError> {
        let base = self.storage_root_of(txn, change.address, hashed)?;
        let mut storage_txn = self.trie_at(base).begin();

        // Insertions first, removals last: collapse repairs may need to
        // resolve neighbours that this very change-set introduced.
        for (slot, value) in &change.storage {
            if let Some(value) = value {
                storage_txn.insert(slot, encode_storage_value(value).into())?;
            }
        }
        for (slot, value) in &change.storage {
            if value.is_none() {
                storage_txn.delete(slot)?;
            }
        }

        let (storage_trie, storage_root) = storage_txn.commit_with(batch);
        self.tries.borrow_mut().insert(storage_root, storage_trie);
        Ok(storage_root)
    }
}

/// Storage values persist as byte strings with leading zeroes stripped.
fn encode_storage_value(value: &[u8]) -> Vec<u8> {
    let first = value.iter().position(|byte| *byte != 0);
    let trimmed = first.map_or(&[][..], |start| &value[start..]);
    alloy_rlp::encode(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cow_trie::MemStore;

    fn address(tag: u8) -> Address {
        Address::from_slice(&keccak256([tag]).as_slice()[..20])
    }

    fn slot(tag: u8) -> Bytes {
        Bytes::copy_from_slice(keccak256([tag, 0x51]).as_slice())
    }

    #[test]
    fn empty_state_root() {
        let state = State::new(Arc::new(MemStore::new()));
        assert_eq!(state.root(), EMPTY_ROOT_HASH);
    }

    #[test]
    fn account_round_trip() {
        let mut state = State::new(Arc::new(MemStore::new()));
        let alice = address(1);

        let mut changes = ChangeSet::default();
        changes.push(AccountChange {
            nonce: 7,
            balance: U256::from(1_000_u64),
            ..AccountChange::new(alice)
        });
        let root = state.commit(&changes).unwrap();
        assert_eq!(state.root(), root);

        let account = state.account(alice).unwrap().expect("account exists");
        assert_eq!(account.nonce, 7);
        assert_eq!(account.balance, U256::from(1_000_u64));
        assert_eq!(account.storage_root, EMPTY_ROOT_HASH);
        assert_eq!(account.code_hash, KECCAK256_EMPTY);

        assert_eq!(state.account(address(2)).unwrap(), None);
    }

    #[test]
    fn storage_changes_fold_into_the_account_record() {
        let mut state = State::new(Arc::new(MemStore::new()));
        let alice = address(1);

        let mut changes = ChangeSet::default();
        let mut change = AccountChange::new(alice);
        change.storage.push((slot(1), Some(Bytes::from_static(b"\x00\x00\x2a"))));
        changes.push(change);
        state.commit(&changes).unwrap();

        let account = state.account(alice).unwrap().expect("account exists");
        assert_ne!(account.storage_root, EMPTY_ROOT_HASH);
        // Leading zeroes are stripped before encoding.
        assert_eq!(
            state.storage(alice, &slot(1)).unwrap(),
            Some(Bytes::from(alloy_rlp::encode(&[0x2a_u8][..])))
        );
        assert_eq!(state.storage(alice, &slot(2)).unwrap(), None);
    }

    #[test]
    fn incremental_commit_matches_fresh_rebuild() {
        let store = Arc::new(MemStore::new());
        let alice = address(1);
        let bob = address(2);

        // Incremental: alice with {k1}, bob empty; then alice gains k2.
        let mut state = State::new(store.clone());
        let mut changes = ChangeSet::default();
        let mut alice_change = AccountChange::new(alice);
        alice_change
            .storage
            .push((slot(1), Some(Bytes::from_static(b"v1"))));
        changes.push(alice_change);
        changes.push(AccountChange::new(bob));
        state.commit(&changes).unwrap();

        let mut changes = ChangeSet::default();
        let mut alice_change = AccountChange::new(alice);
        alice_change
            .storage
            .push((slot(2), Some(Bytes::from_static(b"v2"))));
        changes.push(alice_change);
        let incremental_root = state.commit(&changes).unwrap();

        // Fresh: both accounts rebuilt with their final storage sets.
        let mut fresh = State::new(Arc::new(MemStore::new()));
        let mut changes = ChangeSet::default();
        let mut alice_change = AccountChange::new(alice);
        alice_change
            .storage
            .push((slot(1), Some(Bytes::from_static(b"v1"))));
        alice_change
            .storage
            .push((slot(2), Some(Bytes::from_static(b"v2"))));
        changes.push(alice_change);
        changes.push(AccountChange::new(bob));
        let fresh_root = fresh.commit(&changes).unwrap();

        assert_eq!(incremental_root, fresh_root);
    }

    #[test]
    fn deleting_a_slot_and_an_account() {
        let mut state = State::new(Arc::new(MemStore::new()));
        let alice = address(1);
        let bob = address(2);

        let mut changes = ChangeSet::default();
        let mut alice_change = AccountChange::new(alice);
        alice_change
            .storage
            .push((slot(1), Some(Bytes::from_static(b"v1"))));
        alice_change
            .storage
            .push((slot(2), Some(Bytes::from_static(b"v2"))));
        changes.push(alice_change);
        changes.push(AccountChange::new(bob));
        state.commit(&changes).unwrap();

        // Clear one slot; the storage root must shrink back to a single-slot
        // trie.
        let mut expected = State::new(Arc::new(MemStore::new()));
        let mut changes = ChangeSet::default();
        let mut alice_change = AccountChange::new(alice);
        alice_change
            .storage
            .push((slot(1), Some(Bytes::from_static(b"v1"))));
        changes.push(alice_change);
        changes.push(AccountChange::new(bob));
        let expected_root = expected.commit(&changes).unwrap();

        let mut changes = ChangeSet::default();
        let mut alice_change = AccountChange::new(alice);
        alice_change.storage.push((slot(2), None));
        changes.push(alice_change);
        let root = state.commit(&changes).unwrap();
        assert_eq!(root, expected_root);

        // Dropping the account removes its record entirely.
        let mut changes = ChangeSet::default();
        changes.push(AccountChange::removed(alice));
        state.commit(&changes).unwrap();
        assert_eq!(state.account(alice).unwrap(), None);
        assert!(state.account(bob).unwrap().is_some());
    }

    #[test]
    fn code_is_stored_under_its_hash() {
        let mut state = State::new(Arc::new(MemStore::new()));
        let alice = address(1);
        let code = Bytes::from_static(b"\x60\x00\x60\x00\xf3");
        let code_hash = keccak256(&code);

        let mut changes = ChangeSet::default();
        changes.push(AccountChange {
            code_hash,
            code: Some(code.clone()),
            ..AccountChange::new(alice)
        });
        state.commit(&changes).unwrap();

        assert_eq!(state.code(&code_hash).unwrap(), Some(code));
        assert_eq!(
            state.account(alice).unwrap().expect("account").code_hash,
            code_hash
        );
    }

    #[test]
    fn reopened_state_sees_committed_accounts() {
        let store = Arc::new(MemStore::new());
        let alice = address(1);

        let root = {
            let mut state = State::new(store.clone());
            let mut changes = ChangeSet::default();
            let mut change = AccountChange::new(alice);
            change.nonce = 3;
            change
                .storage
                .push((slot(1), Some(Bytes::from_static(b"v1"))));
            changes.push(change);
            state.commit(&changes).unwrap()
        };

        let reopened = State::open(root, store);
        let account = reopened.account(alice).unwrap().expect("account persisted");
        assert_eq!(account.nonce, 3);
        assert_eq!(
            reopened.storage(alice, &slot(1)).unwrap(),
            Some(Bytes::from(alloy_rlp::encode(&b"v1"[..])))
        );
    }
}
