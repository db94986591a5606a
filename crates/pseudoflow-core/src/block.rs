//! The block-scope stack.
//!
//! Mirrors the lexical nesting the traversal currently has open: loops,
//! subroutines and try/finally regions, strictly LIFO. Breakable frames are
//! also indexed by their syntax node so `return`, `break` and `continue` can
//! name their target by construct rather than by label.

use rustc_hash::FxHashMap;

use crate::builder::FinallyGenerator;
use crate::error::{internal_error, FlowError};
use crate::label::Label;
use crate::node::NodeId;

/// A scope that structured jumps can leave or re-enter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakableBlockInfo {
    element: NodeId,
    entry_point: Label,
    exit_point: Label,
}

impl BreakableBlockInfo {
    pub fn new(element: NodeId, entry_point: Label, exit_point: Label) -> Self {
        Self {
            element,
            entry_point,
            exit_point,
        }
    }

    pub fn element(&self) -> NodeId {
        self.element
    }

    pub fn entry_point(&self) -> &Label {
        &self.entry_point
    }

    pub fn exit_point(&self) -> &Label {
        &self.exit_point
    }

    fn is_boundary(&self, label: &Label) -> bool {
        *label == self.entry_point || *label == self.exit_point
    }
}

/// Labels of one loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopInfo {
    block: BreakableBlockInfo,
    body_entry_point: Label,
    condition_entry_point: Label,
}

impl LoopInfo {
    pub fn new(
        block: BreakableBlockInfo,
        body_entry_point: Label,
        condition_entry_point: Label,
    ) -> Self {
        Self {
            block,
            body_entry_point,
            condition_entry_point,
        }
    }

    pub fn element(&self) -> NodeId {
        self.block.element
    }

    /// Bound where the loop starts; `continue` jumps here.
    pub fn entry_point(&self) -> &Label {
        &self.block.entry_point
    }

    /// Bound when the loop is exited; `break` jumps here.
    pub fn exit_point(&self) -> &Label {
        &self.block.exit_point
    }

    /// Fresh label for the traversal to bind where the loop body begins.
    pub fn body_entry_point(&self) -> &Label {
        &self.body_entry_point
    }

    pub fn condition_entry_point(&self) -> &Label {
        &self.condition_entry_point
    }

    pub fn as_breakable(&self) -> &BreakableBlockInfo {
        &self.block
    }
}

/// An open try region with a `finally` clause.
#[derive(Clone)]
pub struct TryFinallyBlockInfo {
    generator: FinallyGenerator,
}

impl TryFinallyBlockInfo {
    pub fn new(generator: FinallyGenerator) -> Self {
        Self { generator }
    }

    pub fn generator(&self) -> &FinallyGenerator {
        &self.generator
    }
}

impl std::fmt::Debug for TryFinallyBlockInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TryFinallyBlockInfo").finish_non_exhaustive()
    }
}

/// One frame of the block-scope stack.
#[derive(Debug, Clone)]
pub enum BlockInfo {
    Loop(LoopInfo),
    Subroutine(BreakableBlockInfo),
    TryFinally(TryFinallyBlockInfo),
}

impl BlockInfo {
    pub fn as_breakable(&self) -> Option<&BreakableBlockInfo> {
        match self {
            BlockInfo::Loop(info) => Some(info.as_breakable()),
            BlockInfo::Subroutine(info) => Some(info),
            BlockInfo::TryFinally(_) => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            BlockInfo::Loop(info) => format!("loop {}", info.element()),
            BlockInfo::Subroutine(info) => format!("subroutine {}", info.element()),
            BlockInfo::TryFinally(_) => "try/finally".to_string(),
        }
    }
}

/// Stack of open block scopes for one construction session.
#[derive(Debug, Default)]
pub struct BlockScopes {
    blocks: Vec<BlockInfo>,
    /// Breakable node -> stack position.
    index: FxHashMap<NodeId, usize>,
}

impl BlockScopes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn push_loop(&mut self, info: LoopInfo) {
        self.index.insert(info.element(), self.blocks.len());
        self.blocks.push(BlockInfo::Loop(info));
    }

    pub fn pop_loop(&mut self, element: NodeId) -> LoopInfo {
        match self.blocks.pop() {
            Some(BlockInfo::Loop(info)) if info.element() == element => {
                self.index.remove(&element);
                info
            }
            found => Self::mismatch(format!("loop {element}"), found),
        }
    }

    pub fn push_subroutine(&mut self, info: BreakableBlockInfo) {
        self.index.insert(info.element(), self.blocks.len());
        self.blocks.push(BlockInfo::Subroutine(info));
    }

    pub fn pop_subroutine(&mut self, element: NodeId) -> BreakableBlockInfo {
        match self.blocks.pop() {
            Some(BlockInfo::Subroutine(info)) if info.element() == element => {
                self.index.remove(&element);
                info
            }
            found => Self::mismatch(format!("subroutine {element}"), found),
        }
    }

    pub fn push_try_finally(&mut self, generator: FinallyGenerator) {
        self.blocks
            .push(BlockInfo::TryFinally(TryFinallyBlockInfo::new(generator)));
    }

    pub fn pop_try_finally(&mut self) -> TryFinallyBlockInfo {
        match self.blocks.pop() {
            Some(BlockInfo::TryFinally(info)) => info,
            found => Self::mismatch("try/finally".to_string(), found),
        }
    }

    /// Innermost open loop.
    pub fn current_loop(&self) -> Option<NodeId> {
        self.blocks.iter().rev().find_map(|block| match block {
            BlockInfo::Loop(info) => Some(info.element()),
            _ => None,
        })
    }

    /// The open breakable frame owned by `element`.
    pub fn breakable(&self, element: NodeId) -> &BreakableBlockInfo {
        self.index
            .get(&element)
            .and_then(|&position| self.blocks.get(position))
            .and_then(BlockInfo::as_breakable)
            .filter(|info| info.element() == element)
            .unwrap_or_else(|| internal_error(FlowError::UnknownBlock(element)))
    }

    /// Stack positions of the try/finally frames a jump to `target` leaves,
    /// innermost first.
    ///
    /// Empty when no open breakable frame has `target` as its entry or exit.
    pub fn finally_positions(&self, target: &Label) -> Vec<usize> {
        let mut finally_positions = Vec::new();
        for (position, block) in self.blocks.iter().enumerate().rev() {
            match block {
                BlockInfo::TryFinally(_) => finally_positions.push(position),
                BlockInfo::Loop(_) | BlockInfo::Subroutine(_) => {
                    let matches = block
                        .as_breakable()
                        .is_some_and(|info| info.is_boundary(target));
                    if matches {
                        return finally_positions;
                    }
                }
            }
        }
        Vec::new()
    }

    /// Detaches the frames from `position` upward so a finally body replayed
    /// for that region sees only the scopes enclosing it.
    pub fn detach_from(&mut self, position: usize) -> Vec<BlockInfo> {
        self.blocks.split_off(position)
    }

    /// Re-attaches frames returned by [`detach_from`](Self::detach_from).
    pub fn reattach(&mut self, position: usize, frames: Vec<BlockInfo>) {
        if self.blocks.len() != position {
            internal_error(FlowError::ScopeMismatch {
                expected: format!("{position} open block scope(s) after finally replay"),
                found: self.blocks.len().to_string(),
            });
        }
        self.blocks.extend(frames);
    }

    fn mismatch(expected: String, found: Option<BlockInfo>) -> ! {
        internal_error(FlowError::ScopeMismatch {
            expected,
            found: found.map_or_else(|| "empty stack".to_string(), |block| block.describe()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ControlFlowBuilder;
    use crate::label::PseudocodeId;
    use std::rc::Rc;

    fn label(index: u32) -> Label {
        Label::new(PseudocodeId(0), index, &format!("l{index}"))
    }

    fn loop_info(element: u32, first_label: u32) -> LoopInfo {
        LoopInfo::new(
            BreakableBlockInfo::new(NodeId(element), label(first_label), label(first_label + 1)),
            label(first_label + 2),
            label(first_label + 3),
        )
    }

    fn noop_generator() -> FinallyGenerator {
        Rc::new(|_: &mut dyn ControlFlowBuilder| {})
    }

    #[test]
    fn test_current_loop_follows_nesting() {
        let mut scopes = BlockScopes::new();
        assert_eq!(scopes.current_loop(), None);
        scopes.push_loop(loop_info(1, 0));
        scopes.push_loop(loop_info(2, 4));
        assert_eq!(scopes.current_loop(), Some(NodeId(2)));
        scopes.pop_loop(NodeId(2));
        assert_eq!(scopes.current_loop(), Some(NodeId(1)));
        scopes.pop_loop(NodeId(1));
        assert_eq!(scopes.current_loop(), None);
    }

    #[test]
    fn test_breakable_lookup_by_node() {
        let mut scopes = BlockScopes::new();
        scopes.push_subroutine(BreakableBlockInfo::new(NodeId(0), label(0), label(1)));
        scopes.push_loop(loop_info(5, 2));
        assert_eq!(scopes.breakable(NodeId(0)).exit_point(), &label(1));
        assert_eq!(scopes.breakable(NodeId(5)).entry_point(), &label(2));
    }

    #[test]
    #[should_panic(expected = "no open block scope for node n5")]
    fn test_lookup_after_pop_is_fatal() {
        let mut scopes = BlockScopes::new();
        scopes.push_loop(loop_info(5, 0));
        scopes.pop_loop(NodeId(5));
        scopes.breakable(NodeId(5));
    }

    #[test]
    #[should_panic(expected = "expected try/finally, found loop n1")]
    fn test_pop_wrong_kind_is_fatal() {
        let mut scopes = BlockScopes::new();
        scopes.push_loop(loop_info(1, 0));
        scopes.pop_try_finally();
    }

    #[test]
    #[should_panic(expected = "expected loop n2, found loop n1")]
    fn test_pop_wrong_loop_is_fatal() {
        let mut scopes = BlockScopes::new();
        scopes.push_loop(loop_info(1, 0));
        scopes.pop_loop(NodeId(2));
    }

    #[test]
    fn test_finally_positions_innermost_first() {
        let mut scopes = BlockScopes::new();
        scopes.push_subroutine(BreakableBlockInfo::new(NodeId(0), label(0), label(1)));
        scopes.push_try_finally(noop_generator());
        scopes.push_loop(loop_info(3, 2));
        scopes.push_try_finally(noop_generator());
        scopes.push_try_finally(noop_generator());

        // Leaving the loop crosses the two innermost regions.
        assert_eq!(scopes.finally_positions(&label(3)), vec![4, 3]);
        // Returning crosses all three.
        assert_eq!(scopes.finally_positions(&label(1)), vec![4, 3, 1]);
        // Labels that are no breakable boundary cross nothing.
        assert!(scopes.finally_positions(&label(4)).is_empty());
        assert!(scopes.finally_positions(&label(99)).is_empty());
    }

    #[test]
    fn test_detach_hides_inner_frames() {
        let mut scopes = BlockScopes::new();
        scopes.push_subroutine(BreakableBlockInfo::new(NodeId(0), label(0), label(1)));
        scopes.push_try_finally(noop_generator());
        scopes.push_loop(loop_info(3, 2));

        let frames = scopes.detach_from(1);
        assert_eq!(scopes.len(), 1);
        assert_eq!(scopes.current_loop(), None);
        scopes.reattach(1, frames);
        assert_eq!(scopes.len(), 3);
        assert_eq!(scopes.current_loop(), Some(NodeId(3)));
    }
}
