//! The flat instruction sequence of one subroutine.
//!
//! A `Pseudocode` is created when its subroutine is entered, grows while the
//! traversal is inside that subroutine, and is finalized exactly once when
//! the subroutine is exited. Finalization checks that every label has been
//! bound and resolves labels to instruction indices, producing successor and
//! predecessor lists for flow analyses.

use rustc_hash::FxHashSet;

use crate::error::{internal_error, FlowError};
use crate::instruction::Instruction;
use crate::label::{Label, PseudocodeId};
use crate::node::NodeId;

#[derive(Debug, Clone)]
struct LabelSlot {
    label: Label,
    position: Option<usize>,
}

/// Instructions and label table for a single subroutine.
#[derive(Debug)]
pub struct Pseudocode {
    id: PseudocodeId,
    scoping_element: NodeId,
    subroutine: NodeId,
    instructions: Vec<Instruction>,
    labels: Vec<LabelSlot>,
    exit_instruction: Option<usize>,
    error_instruction: Option<usize>,
    sink_instruction: Option<usize>,
    /// Instruction indices permitted to be unreachable.
    allowed_dead: FxHashSet<usize>,
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
    finalized: bool,
}

impl Pseudocode {
    pub fn new(id: PseudocodeId, scoping_element: NodeId, subroutine: NodeId) -> Self {
        Self {
            id,
            scoping_element,
            subroutine,
            instructions: Vec::new(),
            labels: Vec::new(),
            exit_instruction: None,
            error_instruction: None,
            sink_instruction: None,
            allowed_dead: FxHashSet::default(),
            successors: Vec::new(),
            predecessors: Vec::new(),
            finalized: false,
        }
    }

    pub fn id(&self) -> PseudocodeId {
        self.id
    }

    /// The node this pseudocode was built for.
    pub fn scoping_element(&self) -> NodeId {
        self.scoping_element
    }

    pub fn subroutine(&self) -> NodeId {
        self.subroutine
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn instruction(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// All labels created for this pseudocode, in creation order.
    pub fn labels(&self) -> impl Iterator<Item = &Label> + '_ {
        self.labels.iter().map(|slot| &slot.label)
    }

    /// Labels bound immediately before the instruction at `index`.
    pub fn labels_at(&self, index: usize) -> impl Iterator<Item = &Label> + '_ {
        self.labels
            .iter()
            .filter(move |slot| slot.position == Some(index))
            .map(|slot| &slot.label)
    }

    /// Position of `label`, or `None` when it is unbound or owned elsewhere.
    pub fn label_position(&self, label: &Label) -> Option<usize> {
        if label.owner() != self.id {
            return None;
        }
        self.labels
            .get(label.index() as usize)
            .and_then(|slot| slot.position)
    }

    pub fn exit_instruction(&self) -> Option<usize> {
        self.exit_instruction
    }

    pub fn error_instruction(&self) -> Option<usize> {
        self.error_instruction
    }

    pub fn sink_instruction(&self) -> Option<usize> {
        self.sink_instruction
    }

    pub fn is_dead_allowed(&self, index: usize) -> bool {
        self.allowed_dead.contains(&index)
    }

    /// Allocates a new unbound label.
    pub fn create_label(&mut self, name: &str) -> Label {
        self.ensure_open();
        let label = Label::new(self.id, self.labels.len() as u32, name);
        self.labels.push(LabelSlot {
            label: label.clone(),
            position: None,
        });
        label
    }

    /// Binds `label` to the position of the next appended instruction.
    pub fn bind_label(&mut self, label: &Label) {
        self.ensure_open();
        let position = self.instructions.len();
        let slot = self.slot_mut(label);
        if let Some(bound) = slot.position {
            internal_error(FlowError::LabelAlreadyBound {
                label: label.name().to_string(),
                position: bound,
            });
        }
        slot.position = Some(position);
    }

    /// Marks the position of an already bound label as allowed to be dead.
    pub fn allow_dead(&mut self, label: &Label) {
        let position = match self.slot_mut(label).position {
            Some(position) => position,
            None => internal_error(FlowError::UnboundLabels {
                subroutine: self.subroutine,
                labels: vec![label.name().to_string()],
            }),
        };
        self.allowed_dead.insert(position);
    }

    /// Appends `instruction`, returning its index.
    pub fn add_instruction(&mut self, instruction: Instruction) -> usize {
        self.ensure_open();
        self.instructions.push(instruction);
        self.instructions.len() - 1
    }

    pub fn add_exit_instruction(&mut self, instruction: Instruction) -> usize {
        let index = self.add_instruction(instruction);
        self.exit_instruction = Some(index);
        index
    }

    pub fn add_error_instruction(&mut self, instruction: Instruction) -> usize {
        let index = self.add_instruction(instruction);
        self.error_instruction = Some(index);
        index
    }

    pub fn add_sink_instruction(&mut self, instruction: Instruction) -> usize {
        let index = self.add_instruction(instruction);
        self.sink_instruction = Some(index);
        index
    }

    /// Freezes the pseudocode and resolves jumps into successor lists.
    pub fn finalize(&mut self, verify_labels: bool) {
        self.ensure_open();

        if verify_labels {
            let unbound: Vec<String> = self
                .labels
                .iter()
                .filter(|slot| slot.position.is_none())
                .map(|slot| slot.label.name().to_string())
                .collect();
            if !unbound.is_empty() {
                internal_error(FlowError::UnboundLabels {
                    subroutine: self.subroutine,
                    labels: unbound,
                });
            }
        }

        let sink = match (
            self.exit_instruction,
            self.error_instruction,
            self.sink_instruction,
        ) {
            (Some(_), Some(_), Some(sink)) => sink,
            (None, _, _) => self.missing_terminal("<END>"),
            (_, None, _) => self.missing_terminal("<ERROR>"),
            (_, _, None) => self.missing_terminal("<SINK>"),
        };

        let len = self.instructions.len();
        let mut successors = Vec::with_capacity(len);
        for (index, instruction) in self.instructions.iter().enumerate() {
            let targets: Vec<usize> = match instruction {
                Instruction::SubroutineExit { .. } => vec![sink],
                _ => instruction
                    .jump_targets()
                    .iter()
                    .filter_map(|target| self.label_position(target))
                    .filter(|&position| position < len)
                    .collect(),
            };
            let fallthrough = (instruction.falls_through() && index + 1 < len).then_some(index + 1);

            let mut next = Vec::with_capacity(targets.len() + 1);
            for position in targets.into_iter().chain(fallthrough) {
                if !next.contains(&position) {
                    next.push(position);
                }
            }
            successors.push(next);
        }

        let mut predecessors = vec![Vec::new(); len];
        for (index, next) in successors.iter().enumerate() {
            for &succ in next {
                if !predecessors[succ].contains(&index) {
                    predecessors[succ].push(index);
                }
            }
        }

        self.successors = successors;
        self.predecessors = predecessors;
        self.finalized = true;
    }

    /// Instruction indices control may reach directly after `index`.
    pub fn successors(&self, index: usize) -> &[usize] {
        self.successors
            .get(index)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn predecessors(&self, index: usize) -> &[usize] {
        self.predecessors
            .get(index)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Instruction indices in reverse postorder from the first instruction.
    pub fn reverse_postorder(&self) -> Vec<usize> {
        let len = self.instructions.len();
        let mut postorder = Vec::with_capacity(len);
        if len == 0 {
            return postorder;
        }
        let mut visited = vec![false; len];
        // Explicit stack of (instruction, next successor slot).
        let mut stack = vec![(0usize, 0usize)];
        visited[0] = true;
        while let Some(&(node, slot)) = stack.last() {
            if let Some(&succ) = self.successors(node).get(slot) {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                if !visited[succ] {
                    visited[succ] = true;
                    stack.push((succ, 0));
                }
            } else {
                postorder.push(node);
                stack.pop();
            }
        }
        postorder.reverse();
        postorder
    }

    fn slot_mut(&mut self, label: &Label) -> &mut LabelSlot {
        if label.owner() != self.id {
            internal_error(FlowError::ForeignLabel {
                label: label.name().to_string(),
                owner: label.owner().0,
                pseudocode: self.id.0,
            });
        }
        &mut self.labels[label.index() as usize]
    }

    fn ensure_open(&self) {
        if self.finalized {
            internal_error(FlowError::AlreadyFinalized(self.subroutine));
        }
    }

    fn missing_terminal(&self, terminal: &'static str) -> ! {
        internal_error(FlowError::MissingTerminal {
            subroutine: self.subroutine,
            terminal,
        })
    }
}
