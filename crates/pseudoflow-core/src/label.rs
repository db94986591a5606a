//! Forward references into an instruction sequence.

use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Identifier of one pseudocode within a construction session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PseudocodeId(pub u32);

impl std::fmt::Display for PseudocodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// A position in a pseudocode that may not have been reached yet.
///
/// Identity is the owning pseudocode plus the label's slot in that
/// pseudocode's label table. The name is only for humans.
#[derive(Debug, Clone)]
pub struct Label {
    owner: PseudocodeId,
    index: u32,
    name: Rc<str>,
}

impl Label {
    pub(crate) fn new(owner: PseudocodeId, index: u32, name: &str) -> Self {
        Self {
            owner,
            index,
            name: Rc::from(name),
        }
    }

    pub fn owner(&self) -> PseudocodeId {
        self.owner
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.index == other.index
    }
}

impl Eq for Label {}

impl Hash for Label {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.owner.hash(state);
        self.index.hash(state);
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
