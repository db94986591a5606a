//! Flow-graph instructions.

use std::rc::Rc;

use crate::label::Label;
use crate::node::NodeId;
use crate::pseudocode::Pseudocode;

/// How a subroutine is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitKind {
    /// Normal completion (`<END>`).
    Normal,
    /// Completion by a thrown error (`<ERROR>`).
    Error,
}

impl ExitKind {
    pub fn marker(self) -> &'static str {
        match self {
            ExitKind::Normal => "<END>",
            ExitKind::Error => "<ERROR>",
        }
    }
}

/// One node of a subroutine's flow graph.
#[derive(Debug, Clone)]
pub enum Instruction {
    /// Evaluate `element` and keep its value.
    Read { element: NodeId },
    /// Evaluate `element` and discard the (unit) value.
    ReadUnit { element: NodeId },
    /// Store into the assignable target `lvalue`; `element` is the assignment.
    Write { element: NodeId, lvalue: NodeId },
    Jump { target: Label },
    /// Jump to `target` when the condition evaluates to `on_true`.
    ConditionalJump { on_true: bool, target: Label },
    /// Continue at any one of `targets`, or fall through.
    NondeterministicJump { targets: Vec<Label> },
    ReturnValue { element: NodeId, target: Label },
    ReturnNoValue { element: NodeId, target: Label },
    /// `element` always throws or never completes normally.
    ErrorJump { element: NodeId, target: Label },
    SubroutineEnter { subroutine: NodeId },
    SubroutineExit { subroutine: NodeId, kind: ExitKind },
    SubroutineSink { subroutine: NodeId },
    /// A lambda or local function, built into its own pseudocode.
    LocalDeclaration {
        element: NodeId,
        body: Rc<Pseudocode>,
    },
    /// A construct the builder does not model.
    Unsupported { element: NodeId },
}

impl Instruction {
    /// The syntax node this instruction stands for. Structural instructions
    /// and plain jumps have none.
    pub fn element(&self) -> Option<NodeId> {
        match self {
            Instruction::Read { element }
            | Instruction::ReadUnit { element }
            | Instruction::Write { element, .. }
            | Instruction::ReturnValue { element, .. }
            | Instruction::ReturnNoValue { element, .. }
            | Instruction::ErrorJump { element, .. }
            | Instruction::LocalDeclaration { element, .. }
            | Instruction::Unsupported { element } => Some(*element),
            Instruction::Jump { .. }
            | Instruction::ConditionalJump { .. }
            | Instruction::NondeterministicJump { .. }
            | Instruction::SubroutineEnter { .. }
            | Instruction::SubroutineExit { .. }
            | Instruction::SubroutineSink { .. } => None,
        }
    }

    /// Labels this instruction may transfer control to.
    pub fn jump_targets(&self) -> &[Label] {
        match self {
            Instruction::Jump { target }
            | Instruction::ConditionalJump { target, .. }
            | Instruction::ReturnValue { target, .. }
            | Instruction::ReturnNoValue { target, .. }
            | Instruction::ErrorJump { target, .. } => std::slice::from_ref(target),
            Instruction::NondeterministicJump { targets } => targets,
            Instruction::Read { .. }
            | Instruction::ReadUnit { .. }
            | Instruction::Write { .. }
            | Instruction::SubroutineEnter { .. }
            | Instruction::SubroutineExit { .. }
            | Instruction::SubroutineSink { .. }
            | Instruction::LocalDeclaration { .. }
            | Instruction::Unsupported { .. } => &[],
        }
    }

    pub fn is_jump(&self) -> bool {
        !self.jump_targets().is_empty()
    }

    /// Whether control can continue with the next instruction in sequence.
    pub fn falls_through(&self) -> bool {
        !matches!(
            self,
            Instruction::Jump { .. }
                | Instruction::ReturnValue { .. }
                | Instruction::ReturnNoValue { .. }
                | Instruction::ErrorJump { .. }
                | Instruction::SubroutineExit { .. }
                | Instruction::SubroutineSink { .. }
        )
    }
}

fn format_labels(labels: &[Label]) -> String {
    labels
        .iter()
        .map(|label| label.name().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::Read { element } => write!(f, "r({element})"),
            Instruction::ReadUnit { element } => write!(f, "ru({element})"),
            Instruction::Write { lvalue, .. } => write!(f, "w({lvalue})"),
            Instruction::Jump { target } => write!(f, "jmp({target})"),
            Instruction::ConditionalJump { on_true, target } => {
                let mnemonic = if *on_true { "jt" } else { "jf" };
                write!(f, "{mnemonic}({target})")
            }
            Instruction::NondeterministicJump { targets } => {
                write!(f, "jmp?({})", format_labels(targets))
            }
            Instruction::ReturnValue { element, target } => write!(f, "ret({element}) {target}"),
            Instruction::ReturnNoValue { target, .. } => write!(f, "ret {target}"),
            Instruction::ErrorJump { element, .. } => write!(f, "throw({element})"),
            Instruction::SubroutineEnter { .. } => write!(f, "<START>"),
            Instruction::SubroutineExit { kind, .. } => f.write_str(kind.marker()),
            Instruction::SubroutineSink { .. } => write!(f, "<SINK>"),
            Instruction::LocalDeclaration { element, .. } => write!(f, "d({element})"),
            Instruction::Unsupported { element } => write!(f, "unsupported({element})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::PseudocodeId;

    fn label(index: u32, name: &str) -> Label {
        Label::new(PseudocodeId(0), index, name)
    }

    #[test]
    fn test_structural_instructions_have_no_element() {
        let enter = Instruction::SubroutineEnter {
            subroutine: NodeId(0),
        };
        let jump = Instruction::Jump {
            target: label(0, "l0"),
        };
        assert_eq!(enter.element(), None);
        assert_eq!(jump.element(), None);
        assert_eq!(
            Instruction::Read { element: NodeId(3) }.element(),
            Some(NodeId(3))
        );
    }

    #[test]
    fn test_jump_targets_preserve_order() {
        let jump = Instruction::NondeterministicJump {
            targets: vec![label(2, "l2"), label(0, "l0"), label(1, "l1")],
        };
        let names: Vec<_> = jump.jump_targets().iter().map(Label::name).collect();
        assert_eq!(names, vec!["l2", "l0", "l1"]);
        assert!(jump.is_jump());
        assert!(jump.falls_through());
    }

    #[test]
    fn test_fall_through() {
        assert!(!Instruction::Jump {
            target: label(0, "l0")
        }
        .falls_through());
        assert!(Instruction::ConditionalJump {
            on_true: false,
            target: label(0, "l0")
        }
        .falls_through());
        assert!(!Instruction::SubroutineSink {
            subroutine: NodeId(0)
        }
        .falls_through());
    }

    #[test]
    fn test_display() {
        let exit = label(0, "l0");
        assert_eq!(Instruction::Read { element: NodeId(1) }.to_string(), "r(n1)");
        assert_eq!(
            Instruction::Write {
                element: NodeId(4),
                lvalue: NodeId(2)
            }
            .to_string(),
            "w(n2)"
        );
        assert_eq!(
            Instruction::ConditionalJump {
                on_true: false,
                target: exit.clone()
            }
            .to_string(),
            "jf(l0)"
        );
        assert_eq!(
            Instruction::ReturnValue {
                element: NodeId(5),
                target: exit
            }
            .to_string(),
            "ret(n5) l0"
        );
        assert_eq!(
            Instruction::SubroutineExit {
                subroutine: NodeId(0),
                kind: ExitKind::Error
            }
            .to_string(),
            "<ERROR>"
        );
    }

    #[test]
    fn test_error_jump_display_differs_from_plain_jump() {
        let error = label(1, "error");
        let throw = Instruction::ErrorJump {
            element: NodeId(2),
            target: error.clone(),
        };
        let jump = Instruction::Jump { target: error };
        assert_eq!(throw.to_string(), "throw(n2)");
        assert_eq!(jump.to_string(), "jmp(error)");
    }
}
