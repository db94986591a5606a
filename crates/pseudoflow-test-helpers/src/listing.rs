//! Text rendering of finished pseudocode for snapshot assertions.

use std::fmt::Write;

use pseudoflow_core::{Instruction, NodeId, Pseudocode};

/// Renders `pseudocode` one instruction per line, each preceded by the
/// labels bound to its position. Embedded local declarations are rendered
/// after their parent, indented one level deeper.
pub fn render(pseudocode: &Pseudocode) -> String {
    let mut out = String::new();
    render_into(&mut out, pseudocode, 0);
    out
}

fn render_into(out: &mut String, pseudocode: &Pseudocode, depth: usize) {
    let indent = "    ".repeat(depth);
    let mut nested = Vec::new();
    for (index, instruction) in pseudocode.instructions().iter().enumerate() {
        for label in pseudocode.labels_at(index) {
            let _ = writeln!(out, "{indent}{label}:");
        }
        let _ = writeln!(out, "{indent}    {instruction}");
        if let Instruction::LocalDeclaration { body, .. } = instruction {
            nested.push(body);
        }
    }
    for body in nested {
        let _ = writeln!(out, "{indent}{}:", body.subroutine());
        render_into(out, body, depth + 1);
    }
}

/// Number of instructions in `pseudocode` that stand for `element`.
pub fn occurrences(pseudocode: &Pseudocode, element: NodeId) -> usize {
    pseudocode
        .instructions()
        .iter()
        .filter(|instruction| instruction.element() == Some(element))
        .count()
}

/// Instruction listings without labels, for quick equality checks.
pub fn instructions(pseudocode: &Pseudocode) -> Vec<String> {
    pseudocode
        .instructions()
        .iter()
        .map(ToString::to_string)
        .collect()
}
