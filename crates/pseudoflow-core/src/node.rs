//! Stable identity of syntax nodes.
//!
//! The builder never looks inside the syntax tree. Every node it is handed is
//! an opaque `NodeId` assigned by the tree's owner, so block-scope lookups and
//! trace records stay decoupled from the tree's lifetimes.

/// Unique identifier for a syntax node within one construction session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(value: u32) -> Self {
        NodeId(value)
    }
}
