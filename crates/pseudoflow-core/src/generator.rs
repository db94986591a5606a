//! Builder stack coordination and jump normalization.
//!
//! `ControlFlowInstructionsGenerator` owns one worker per open subroutine.
//! Every operation is routed to the innermost worker; exiting a nested
//! subroutine finalizes its pseudocode, reports it to the trace and embeds
//! it into the enclosing worker as a single local declaration.
//!
//! The block-scope stack is shared by all workers of a session, so a jump
//! emitted inside a lambda can still target (and run the `finally` bodies
//! on the way to) a scope of the enclosing function.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::block::{BlockInfo, BlockScopes, BreakableBlockInfo, LoopInfo};
use crate::builder::{ControlFlowBuilder, FinallyGenerator};
use crate::config::GeneratorConfig;
use crate::error::{internal_error, FlowError, Result};
use crate::instruction::{ExitKind, Instruction};
use crate::label::{Label, PseudocodeId};
use crate::node::NodeId;
use crate::pseudocode::Pseudocode;
use crate::trace::PseudocodeTrace;

/// Emission state for one subroutine body.
#[derive(Debug)]
struct InstructionsGeneratorWorker {
    pseudocode: Pseudocode,
    /// Target of jumps for expressions that always throw.
    error: Label,
    sink: Label,
    current_subroutine: NodeId,
}

impl InstructionsGeneratorWorker {
    fn new(id: PseudocodeId, scoping_element: NodeId, subroutine: NodeId) -> Self {
        let mut pseudocode = Pseudocode::new(id, scoping_element, subroutine);
        let error = pseudocode.create_label("error");
        let sink = pseudocode.create_label("sink");
        Self {
            pseudocode,
            error,
            sink,
            current_subroutine: subroutine,
        }
    }
}

/// Turns a traversal's builder calls into one pseudocode per subroutine.
pub struct ControlFlowInstructionsGenerator<T: PseudocodeTrace> {
    trace: T,
    config: GeneratorConfig,
    builders: Vec<InstructionsGeneratorWorker>,
    blocks: BlockScopes,
    label_count: u32,
    pseudocode_count: u32,
}

impl<T: PseudocodeTrace> ControlFlowInstructionsGenerator<T> {
    pub fn new(trace: T) -> Self {
        Self::with_config(trace, GeneratorConfig::default())
    }

    pub fn with_config(trace: T, config: GeneratorConfig) -> Self {
        Self {
            trace,
            config,
            builders: Vec::new(),
            blocks: BlockScopes::new(),
            label_count: 0,
            pseudocode_count: 0,
        }
    }

    pub fn trace(&self) -> &T {
        &self.trace
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Number of subroutines currently open.
    pub fn depth(&self) -> usize {
        self.builders.len()
    }

    /// The pseudocode of the innermost open subroutine, still under construction.
    pub fn current_pseudocode(&self) -> Option<&Pseudocode> {
        self.builders.last().map(|worker| &worker.pseudocode)
    }

    /// Ends the session and hands back the trace.
    pub fn finish(self) -> Result<T> {
        if !self.builders.is_empty() || !self.blocks.is_empty() {
            return Err(FlowError::UnclosedScopes {
                builders: self.builders.len(),
                scopes: self.blocks.len(),
            });
        }
        Ok(self.trace)
    }

    fn push_builder(&mut self, scoping_element: NodeId, subroutine: NodeId) {
        let id = PseudocodeId(self.pseudocode_count);
        self.pseudocode_count += 1;
        self.builders.push(InstructionsGeneratorWorker::new(
            id,
            scoping_element,
            subroutine,
        ));
    }

    fn pop_builder(&mut self, element: NodeId) -> Rc<Pseudocode> {
        let Some(mut worker) = self.builders.pop() else {
            internal_error(FlowError::NoActiveBuilder);
        };
        worker.pseudocode.finalize(self.config.verify_labels);
        let pseudocode = Rc::new(worker.pseudocode);
        self.trace.record_control_flow_data(element, &pseudocode);
        pseudocode
    }

    fn builder(&self) -> &InstructionsGeneratorWorker {
        self.builders
            .last()
            .unwrap_or_else(|| internal_error(FlowError::NoActiveBuilder))
    }

    fn builder_mut(&mut self) -> &mut InstructionsGeneratorWorker {
        self.builders
            .last_mut()
            .unwrap_or_else(|| internal_error(FlowError::NoActiveBuilder))
    }

    fn add(&mut self, instruction: Instruction) {
        if let Some(element) = instruction.element() {
            self.trace
                .record_representative_instruction(element, &instruction);
        }
        trace!(%instruction, "append");
        self.builder_mut().pseudocode.add_instruction(instruction);
    }

    /// Replays the `finally` bodies a jump to `target` leaves, innermost
    /// first, right before the jump itself is appended.
    fn handle_jump_inside_try_finally(&mut self, target: &Label) {
        let positions = self.blocks.finally_positions(target);
        if positions.is_empty() {
            return;
        }
        debug!(%target, regions = positions.len(), "replaying finally blocks");

        for position in positions {
            let frames = self.blocks.detach_from(position);
            let generator: FinallyGenerator = match frames.first() {
                Some(BlockInfo::TryFinally(info)) => Rc::clone(info.generator()),
                _ => internal_error(FlowError::ScopeMismatch {
                    expected: "try/finally".to_string(),
                    found: "another block scope".to_string(),
                }),
            };
            generator(self);
            self.blocks.reattach(position, frames);
        }
    }

    fn enter_subroutine_body(&mut self, subroutine: NodeId) {
        let entry_point = self.create_unbound_label();
        let exit_point = self.create_unbound_label();
        self.blocks.push_subroutine(BreakableBlockInfo::new(
            subroutine,
            entry_point.clone(),
            exit_point,
        ));
        self.bind_label(&entry_point);
        self.add(Instruction::SubroutineEnter { subroutine });
    }

    fn exit_subroutine_body(&mut self, subroutine: NodeId) {
        let exit_point = self.exit_point(subroutine);
        self.bind_label(&exit_point);

        let worker = self.builder_mut();
        let (error, sink) = (worker.error.clone(), worker.sink.clone());
        let pseudocode = &mut worker.pseudocode;
        pseudocode.add_exit_instruction(Instruction::SubroutineExit {
            subroutine,
            kind: ExitKind::Normal,
        });
        pseudocode.bind_label(&error);
        pseudocode.add_error_instruction(Instruction::SubroutineExit {
            subroutine,
            kind: ExitKind::Error,
        });
        pseudocode.bind_label(&sink);
        pseudocode.add_sink_instruction(Instruction::SubroutineSink { subroutine });

        self.blocks.pop_subroutine(subroutine);
    }
}

impl<T: PseudocodeTrace> ControlFlowBuilder for ControlFlowInstructionsGenerator<T> {
    fn read(&mut self, expression: NodeId) {
        self.add(Instruction::Read {
            element: expression,
        });
    }

    fn read_unit(&mut self, expression: NodeId) {
        self.add(Instruction::ReadUnit {
            element: expression,
        });
    }

    fn write(&mut self, assignment: NodeId, lvalue: NodeId) {
        self.add(Instruction::Write {
            element: assignment,
            lvalue,
        });
    }

    fn create_unbound_label(&mut self) -> Label {
        let name = format!("{}{}", self.config.label_prefix, self.label_count);
        self.label_count += 1;
        self.builder_mut().pseudocode.create_label(&name)
    }

    fn bind_label(&mut self, label: &Label) {
        self.builder_mut().pseudocode.bind_label(label);
    }

    fn allow_dead(&mut self) {
        let label = self.create_unbound_label();
        self.bind_label(&label);
        self.builder_mut().pseudocode.allow_dead(&label);
    }

    fn enter_loop(
        &mut self,
        expression: NodeId,
        loop_exit_point: Option<Label>,
        condition_entry_point: Option<Label>,
    ) -> LoopInfo {
        let entry_point = self.create_unbound_label();
        self.bind_label(&entry_point);
        let exit_point = match loop_exit_point {
            Some(label) => label,
            None => self.create_unbound_label(),
        };
        let body_entry_point = self.create_unbound_label();
        let condition_entry_point = match condition_entry_point {
            Some(label) => label,
            None => self.create_unbound_label(),
        };

        let info = LoopInfo::new(
            BreakableBlockInfo::new(expression, entry_point, exit_point),
            body_entry_point,
            condition_entry_point,
        );
        self.blocks.push_loop(info.clone());
        self.trace.record_loop_info(expression, &info);
        debug!(
            loop_node = %expression,
            entry = %info.entry_point(),
            exit = %info.exit_point(),
            "enter loop"
        );
        info
    }

    fn exit_loop(&mut self, expression: NodeId) {
        let info = self.blocks.pop_loop(expression);
        self.bind_label(info.exit_point());
        debug!(loop_node = %expression, "exit loop");
    }

    fn current_loop(&self) -> Option<NodeId> {
        self.blocks.current_loop()
    }

    fn enter_subroutine(&mut self, subroutine: NodeId) {
        self.push_builder(subroutine, subroutine);
        debug!(%subroutine, depth = self.builders.len(), "enter subroutine");
        self.enter_subroutine_body(subroutine);
    }

    fn exit_subroutine(&mut self, subroutine: NodeId) {
        self.exit_subroutine_body(subroutine);
        let pseudocode = self.pop_builder(subroutine);
        debug!(
            %subroutine,
            instructions = pseudocode.len(),
            depth = self.builders.len(),
            "exit subroutine"
        );
        if !self.builders.is_empty() {
            self.add(Instruction::LocalDeclaration {
                element: subroutine,
                body: pseudocode,
            });
        }
    }

    fn current_subroutine(&self) -> Option<NodeId> {
        self.builders.last().map(|worker| worker.current_subroutine)
    }

    fn entry_point(&self, element: NodeId) -> Label {
        self.blocks.breakable(element).entry_point().clone()
    }

    fn exit_point(&self, element: NodeId) -> Label {
        self.blocks.breakable(element).exit_point().clone()
    }

    fn return_value(&mut self, return_expression: NodeId, subroutine: NodeId) {
        let exit_point = self.exit_point(subroutine);
        self.handle_jump_inside_try_finally(&exit_point);
        self.add(Instruction::ReturnValue {
            element: return_expression,
            target: exit_point,
        });
    }

    fn return_no_value(&mut self, return_expression: NodeId, subroutine: NodeId) {
        let exit_point = self.exit_point(subroutine);
        self.handle_jump_inside_try_finally(&exit_point);
        self.add(Instruction::ReturnNoValue {
            element: return_expression,
            target: exit_point,
        });
    }

    fn jump(&mut self, label: &Label) {
        self.handle_jump_inside_try_finally(label);
        self.add(Instruction::Jump {
            target: label.clone(),
        });
    }

    fn jump_on_false(&mut self, label: &Label) {
        self.handle_jump_inside_try_finally(label);
        self.add(Instruction::ConditionalJump {
            on_true: false,
            target: label.clone(),
        });
    }

    fn jump_on_true(&mut self, label: &Label) {
        self.handle_jump_inside_try_finally(label);
        self.add(Instruction::ConditionalJump {
            on_true: true,
            target: label.clone(),
        });
    }

    fn nondeterministic_jump(&mut self, label: &Label) {
        self.handle_jump_inside_try_finally(label);
        self.add(Instruction::NondeterministicJump {
            targets: vec![label.clone()],
        });
    }

    fn nondeterministic_jump_many(&mut self, labels: &[Label]) {
        // TODO: replay finally bodies here once every multi-target call site
        // is known to stay inside its try region.
        self.add(Instruction::NondeterministicJump {
            targets: labels.to_vec(),
        });
    }

    fn jump_to_error(&mut self, expression: NodeId) {
        let error = self.builder().error.clone();
        self.handle_jump_inside_try_finally(&error);
        self.add(Instruction::ErrorJump {
            element: expression,
            target: error,
        });
    }

    fn enter_try_finally(&mut self, generator: FinallyGenerator) {
        self.blocks.push_try_finally(generator);
    }

    fn exit_try_finally(&mut self) {
        self.blocks.pop_try_finally();
    }

    fn unsupported(&mut self, element: NodeId) {
        self.add(Instruction::Unsupported { element });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{CollectingTrace, EmptyTrace};

    fn listing(pseudocode: &Pseudocode) -> Vec<String> {
        pseudocode
            .instructions()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_empty_subroutine_has_terminal_triple() {
        let mut generator = ControlFlowInstructionsGenerator::new(CollectingTrace::new());
        let f = NodeId(0);
        generator.enter_subroutine(f);
        generator.exit_subroutine(f);

        let trace = generator.finish().unwrap();
        let pseudocode = trace.pseudocode(f).unwrap();
        assert_eq!(listing(pseudocode), vec!["<START>", "<END>", "<ERROR>", "<SINK>"]);
        assert_eq!(pseudocode.exit_instruction(), Some(1));
        assert_eq!(pseudocode.error_instruction(), Some(2));
        assert_eq!(pseudocode.sink_instruction(), Some(3));
        assert!(pseudocode.is_finalized());
    }

    #[test]
    fn test_error_and_sink_labels_are_per_builder() {
        let mut generator = ControlFlowInstructionsGenerator::new(EmptyTrace);
        generator.enter_subroutine(NodeId(0));
        let outer_error = generator.builder().error.clone();
        generator.enter_subroutine(NodeId(1));
        let inner_error = generator.builder().error.clone();
        assert_ne!(outer_error, inner_error);
        assert_eq!(outer_error.name(), "error");
        generator.exit_subroutine(NodeId(1));
        generator.exit_subroutine(NodeId(0));
    }

    #[test]
    fn test_label_names_use_session_counter() {
        let config = GeneratorConfig {
            label_prefix: "L".to_string(),
            ..GeneratorConfig::default()
        };
        let mut generator = ControlFlowInstructionsGenerator::with_config(EmptyTrace, config);
        assert_eq!(generator.config().label_prefix, "L");
        generator.enter_subroutine(NodeId(0));
        // Entry and exit of the subroutine took L0 and L1.
        let label = generator.create_unbound_label();
        assert_eq!(label.name(), "L2");
        generator.bind_label(&label);
        generator.exit_subroutine(NodeId(0));
    }

    #[test]
    fn test_nested_graph_reaches_trace_on_exit() {
        let mut generator = ControlFlowInstructionsGenerator::new(CollectingTrace::new());
        let f = NodeId(0);
        let lambda = NodeId(1);
        generator.enter_subroutine(f);
        generator.enter_subroutine(lambda);
        generator.read(NodeId(2));
        assert!(generator.trace().pseudocode(lambda).is_none());
        generator.exit_subroutine(lambda);

        let reported = generator.trace().pseudocode(lambda).unwrap();
        assert!(reported.is_finalized());
        assert!(generator.trace().pseudocode(f).is_none());
        assert_eq!(generator.depth(), 1);
        generator.exit_subroutine(f);
    }

    #[test]
    fn test_return_jumps_to_exit_point() {
        let mut generator = ControlFlowInstructionsGenerator::new(CollectingTrace::new());
        let f = NodeId(0);
        generator.enter_subroutine(f);
        generator.read(NodeId(1));
        generator.return_value(NodeId(2), f);
        generator.exit_subroutine(f);

        let trace = generator.finish().unwrap();
        let pseudocode = trace.pseudocode(f).unwrap();
        assert_eq!(
            listing(pseudocode),
            vec!["<START>", "r(n1)", "ret(n2) l1", "<END>", "<ERROR>", "<SINK>"]
        );
        assert_eq!(pseudocode.successors(2), &[3]);
        assert!(matches!(
            trace.representative(NodeId(2)),
            Some(Instruction::ReturnValue { .. })
        ));
    }

    #[test]
    fn test_finally_replayed_before_return() {
        let mut generator = ControlFlowInstructionsGenerator::new(CollectingTrace::new());
        let f = NodeId(0);
        generator.enter_subroutine(f);
        generator.enter_try_finally(Rc::new(|builder: &mut dyn ControlFlowBuilder| {
            builder.read(NodeId(9));
        }));
        generator.read(NodeId(1));
        generator.return_value(NodeId(2), f);
        generator.exit_try_finally();
        generator.read(NodeId(9));
        generator.exit_subroutine(f);

        let trace = generator.finish().unwrap();
        assert_eq!(
            listing(trace.pseudocode(f).unwrap()),
            vec![
                "<START>",
                "r(n1)",
                "r(n9)",
                "ret(n2) l1",
                "r(n9)",
                "<END>",
                "<ERROR>",
                "<SINK>"
            ]
        );
    }

    #[test]
    fn test_jump_to_error_does_not_replay_finally() {
        let mut generator = ControlFlowInstructionsGenerator::new(CollectingTrace::new());
        let f = NodeId(0);
        generator.enter_subroutine(f);
        generator.enter_try_finally(Rc::new(|builder: &mut dyn ControlFlowBuilder| {
            builder.read(NodeId(9));
        }));
        generator.jump_to_error(NodeId(1));
        generator.exit_try_finally();
        generator.exit_subroutine(f);

        let trace = generator.finish().unwrap();
        let pseudocode = trace.pseudocode(f).unwrap();
        assert_eq!(
            listing(pseudocode),
            vec!["<START>", "throw(n1)", "<END>", "<ERROR>", "<SINK>"]
        );
        assert_eq!(pseudocode.successors(1), &[3]);
    }

    #[test]
    fn test_unsupported_is_recorded_and_traversal_continues() {
        let mut generator = ControlFlowInstructionsGenerator::new(CollectingTrace::new());
        let f = NodeId(0);
        generator.enter_subroutine(f);
        generator.unsupported(NodeId(1));
        generator.read(NodeId(2));
        generator.exit_subroutine(f);

        let trace = generator.finish().unwrap();
        assert_eq!(
            listing(trace.pseudocode(f).unwrap()),
            vec!["<START>", "unsupported(n1)", "r(n2)", "<END>", "<ERROR>", "<SINK>"]
        );
        assert!(matches!(
            trace.representative(NodeId(1)),
            Some(Instruction::Unsupported { .. })
        ));
    }

    #[test]
    fn test_allow_dead_after_divergent_jump() {
        let mut generator = ControlFlowInstructionsGenerator::new(CollectingTrace::new());
        let f = NodeId(0);
        generator.enter_subroutine(f);
        generator.jump_to_error(NodeId(1));
        generator.allow_dead();
        generator.read(NodeId(2));
        generator.exit_subroutine(f);

        let trace = generator.finish().unwrap();
        let pseudocode = trace.pseudocode(f).unwrap();
        assert!(pseudocode.is_dead_allowed(2));
        assert!(pseudocode.predecessors(2).is_empty());
    }

    #[test]
    fn test_finish_reports_open_scopes() {
        let mut generator = ControlFlowInstructionsGenerator::new(EmptyTrace);
        generator.enter_subroutine(NodeId(0));
        let err = generator.finish().err().unwrap();
        assert!(matches!(
            err,
            FlowError::UnclosedScopes {
                builders: 1,
                scopes: 1
            }
        ));
    }

    #[test]
    #[should_panic(expected = "no active builder")]
    fn test_operation_without_subroutine_is_fatal() {
        let mut generator = ControlFlowInstructionsGenerator::new(EmptyTrace);
        generator.read(NodeId(0));
    }

    #[test]
    #[should_panic(expected = "expected subroutine n0, found loop n1")]
    fn test_exit_subroutine_with_open_loop_is_fatal() {
        let mut generator = ControlFlowInstructionsGenerator::new(EmptyTrace);
        generator.enter_subroutine(NodeId(0));
        generator.enter_loop(NodeId(1), None, None);
        generator.exit_subroutine(NodeId(0));
    }
}
