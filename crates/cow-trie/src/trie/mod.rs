mod display;
mod get;
mod hash;
mod insert;
mod nodes;
mod remove;
mod resolve;
mod rlp;
mod trie;

pub use nodes::{FullNode, Node, NodeRef, ShortNode, Value};
pub use trie::{Trie, Txn};
