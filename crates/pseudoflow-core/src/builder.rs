//! The operation set a syntax-tree traversal drives.

use std::rc::Rc;

use crate::block::LoopInfo;
use crate::label::Label;
use crate::node::NodeId;

/// Emits the instructions of a `finally` body into the builder it is given.
///
/// Invoked once for the normal path by the traversal itself and once more
/// for every jump that leaves the try region, so it must be repeatable.
pub type FinallyGenerator = Rc<dyn Fn(&mut dyn ControlFlowBuilder)>;

/// Receives the traversal's calls in the order structured control flow
/// implies and turns them into pseudocode.
///
/// Calls must nest exactly like the source: every `enter_*` is matched by
/// the corresponding `exit_*` in LIFO order. Misuse aborts construction.
pub trait ControlFlowBuilder {
    /// Evaluate `expression` and keep the value.
    fn read(&mut self, expression: NodeId);

    /// Evaluate `expression`, discarding a unit value.
    fn read_unit(&mut self, expression: NodeId);

    /// Store into `lvalue` as part of `assignment`.
    fn write(&mut self, assignment: NodeId, lvalue: NodeId);

    fn create_unbound_label(&mut self) -> Label;

    fn bind_label(&mut self, label: &Label);

    /// Binds a fresh label here and permits the position to be unreachable.
    fn allow_dead(&mut self);

    /// Opens a loop. Caller-supplied labels are used for the exit and
    /// condition entry points; fresh ones are allocated otherwise.
    fn enter_loop(
        &mut self,
        expression: NodeId,
        loop_exit_point: Option<Label>,
        condition_entry_point: Option<Label>,
    ) -> LoopInfo;

    fn exit_loop(&mut self, expression: NodeId);

    fn current_loop(&self) -> Option<NodeId>;

    fn enter_subroutine(&mut self, subroutine: NodeId);

    fn exit_subroutine(&mut self, subroutine: NodeId);

    fn current_subroutine(&self) -> Option<NodeId>;

    /// Entry label of the open loop or subroutine `element`.
    fn entry_point(&self, element: NodeId) -> Label;

    /// Exit label of the open loop or subroutine `element`.
    fn exit_point(&self, element: NodeId) -> Label;

    fn return_value(&mut self, return_expression: NodeId, subroutine: NodeId);

    fn return_no_value(&mut self, return_expression: NodeId, subroutine: NodeId);

    fn jump(&mut self, label: &Label);

    fn jump_on_false(&mut self, label: &Label);

    fn jump_on_true(&mut self, label: &Label);

    fn nondeterministic_jump(&mut self, label: &Label);

    /// One instruction with every label as a possible successor. Does not
    /// replay `finally` bodies.
    fn nondeterministic_jump_many(&mut self, labels: &[Label]);

    /// `expression` always throws or never completes normally.
    fn jump_to_error(&mut self, expression: NodeId);

    fn enter_try_finally(&mut self, generator: FinallyGenerator);

    fn exit_try_finally(&mut self);

    /// Records a construct with no modeled translation and carries on.
    fn unsupported(&mut self, element: NodeId);
}
