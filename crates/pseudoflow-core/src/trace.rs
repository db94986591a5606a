//! Recording of construction results for downstream analyses.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::block::LoopInfo;
use crate::instruction::Instruction;
use crate::node::NodeId;
use crate::pseudocode::Pseudocode;

/// Receives finished graphs and per-node bookkeeping, in traversal order.
pub trait PseudocodeTrace {
    /// Called once per subroutine, right after its pseudocode is finalized.
    fn record_control_flow_data(&mut self, subroutine: NodeId, pseudocode: &Rc<Pseudocode>);

    /// Called for every appended instruction that stands for a syntax node.
    fn record_representative_instruction(&mut self, element: NodeId, instruction: &Instruction);

    /// Called once per loop when it is entered.
    fn record_loop_info(&mut self, expression: NodeId, loop_info: &LoopInfo);
}

/// A trace that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyTrace;

impl PseudocodeTrace for EmptyTrace {
    fn record_control_flow_data(&mut self, _subroutine: NodeId, _pseudocode: &Rc<Pseudocode>) {}

    fn record_representative_instruction(&mut self, _element: NodeId, _instruction: &Instruction) {
    }

    fn record_loop_info(&mut self, _expression: NodeId, _loop_info: &LoopInfo) {}
}

/// A trace that keeps everything it is told.
///
/// Only the first instruction reported for a node is kept as its
/// representative.
#[derive(Debug, Default)]
pub struct CollectingTrace {
    graphs: IndexMap<NodeId, Rc<Pseudocode>>,
    representatives: IndexMap<NodeId, Instruction>,
    loops: IndexMap<NodeId, LoopInfo>,
}

impl CollectingTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pseudocode(&self, subroutine: NodeId) -> Option<&Rc<Pseudocode>> {
        self.graphs.get(&subroutine)
    }

    /// Finished graphs in completion order (innermost subroutines first).
    pub fn graphs(&self) -> impl Iterator<Item = (NodeId, &Rc<Pseudocode>)> + '_ {
        self.graphs.iter().map(|(node, pseudocode)| (*node, pseudocode))
    }

    pub fn representative(&self, element: NodeId) -> Option<&Instruction> {
        self.representatives.get(&element)
    }

    pub fn representative_count(&self) -> usize {
        self.representatives.len()
    }

    pub fn loop_info(&self, expression: NodeId) -> Option<&LoopInfo> {
        self.loops.get(&expression)
    }

    pub fn loop_count(&self) -> usize {
        self.loops.len()
    }
}

impl PseudocodeTrace for CollectingTrace {
    fn record_control_flow_data(&mut self, subroutine: NodeId, pseudocode: &Rc<Pseudocode>) {
        self.graphs.insert(subroutine, Rc::clone(pseudocode));
    }

    fn record_representative_instruction(&mut self, element: NodeId, instruction: &Instruction) {
        self.representatives
            .entry(element)
            .or_insert_with(|| instruction.clone());
    }

    fn record_loop_info(&mut self, expression: NodeId, loop_info: &LoopInfo) {
        self.loops.insert(expression, loop_info.clone());
    }
}
