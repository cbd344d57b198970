//! Indented tree printing for debugging.

use core::fmt::{self, Display, Formatter};

use super::nodes::{Node, Value};
use super::trie::{Trie, Txn};

impl<S> Display for Trie<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.root.as_deref() {
            None => write!(f, "Trie {{ EMPTY }}"),
            Some(root) => fmt_node(f, root, 0),
        }
    }
}

impl<S> Display for Txn<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.root.as_deref() {
            None => write!(f, "Txn {{ EMPTY }}"),
            Some(root) => fmt_node(f, root, 0),
        }
    }
}

fn fmt_node(f: &mut Formatter<'_>, node: &Node, indent: usize) -> fmt::Result {
    write!(f, "{:indent$}", "")?;
    match node {
        Node::Short(short) => {
            writeln!(f, "Short {:x?}", short.key)?;
            fmt_node(f, &short.child, indent + 4)
        }
        Node::Full(full) => {
            write!(f, "Full")?;
            for (idx, child) in full.children.iter().enumerate() {
                if let Some(child) = child {
                    writeln!(f)?;
                    write!(f, "{:indent$}[{idx:x}]", "", indent = indent + 2)?;
                    writeln!(f)?;
                    fmt_node(f, child, indent + 4)?;
                }
            }
            if let Some(value) = &full.value {
                writeln!(f)?;
                write!(f, "{:indent$}[value]", "", indent = indent + 2)?;
                writeln!(f)?;
                fmt_node(f, value, indent + 4)?;
            }
            Ok(())
        }
        Node::Value(Value::Payload(payload)) => write!(f, "Value {payload}"),
        Node::Value(Value::Hash(hash)) => write!(f, "Hash {hash}"),
    }
}
