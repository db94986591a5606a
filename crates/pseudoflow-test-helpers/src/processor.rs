//! Reference traversal: walks a [`Function`] and drives a
//! [`ControlFlowBuilder`] in the order structured control flow implies.

use std::rc::Rc;

use pseudoflow_core::{ControlFlowBuilder, Label, NodeId};

use crate::ast::{Catch, Expr, Function, Stmt};

/// Emits the whole subroutine `function`, including its enter/exit pair.
pub fn generate(builder: &mut dyn ControlFlowBuilder, function: &Function) {
    builder.enter_subroutine(function.id);
    generate_block(builder, function.id, &function.body);
    builder.exit_subroutine(function.id);
}

/// Emits `statements`, which lexically belong to `subroutine`.
///
/// An unlabeled `return` leaves `subroutine` even when the block is
/// replayed as a `finally` body while a nested lambda is being built.
pub fn generate_block(
    builder: &mut dyn ControlFlowBuilder,
    subroutine: NodeId,
    statements: &[Stmt],
) {
    for statement in statements {
        generate_statement(builder, subroutine, statement);
    }
}

fn generate_statement(
    builder: &mut dyn ControlFlowBuilder,
    subroutine: NodeId,
    statement: &Stmt,
) {
    match statement {
        Stmt::Expr(expr) => generate_expression(builder, subroutine, expr),
        Stmt::Assign { id, target, value } => {
            generate_expression(builder, subroutine, value);
            builder.write(*id, *target);
        }
        Stmt::If {
            id,
            condition,
            then_branch,
            else_branch,
        } => {
            generate_expression(builder, subroutine, condition);
            let else_label = builder.create_unbound_label();
            builder.jump_on_false(&else_label);
            generate_block(builder, subroutine, then_branch);
            let end = builder.create_unbound_label();
            builder.jump(&end);
            builder.bind_label(&else_label);
            generate_block(builder, subroutine, else_branch);
            builder.bind_label(&end);
            builder.read_unit(*id);
        }
        Stmt::While {
            id,
            condition,
            body,
        } => {
            let info = builder.enter_loop(*id, None, None);
            builder.bind_label(info.condition_entry_point());
            generate_expression(builder, subroutine, condition);
            builder.jump_on_false(info.exit_point());
            builder.bind_label(info.body_entry_point());
            generate_block(builder, subroutine, body);
            builder.jump(info.entry_point());
            builder.exit_loop(*id);
            builder.read_unit(*id);
        }
        Stmt::DoWhile {
            id,
            body,
            condition,
        } => {
            let info = builder.enter_loop(*id, None, None);
            builder.bind_label(info.body_entry_point());
            generate_block(builder, subroutine, body);
            builder.bind_label(info.condition_entry_point());
            generate_expression(builder, subroutine, condition);
            builder.jump_on_true(info.entry_point());
            builder.exit_loop(*id);
            builder.read_unit(*id);
        }
        Stmt::Break { id, target } => match (*target).or_else(|| builder.current_loop()) {
            Some(loop_node) => {
                let exit_point = builder.exit_point(loop_node);
                builder.jump(&exit_point);
            }
            None => builder.unsupported(*id),
        },
        Stmt::Continue { id, target } => match (*target).or_else(|| builder.current_loop()) {
            Some(loop_node) => {
                let entry_point = builder.entry_point(loop_node);
                builder.jump(&entry_point);
            }
            None => builder.unsupported(*id),
        },
        Stmt::Return { id, value, target } => {
            let target = target.unwrap_or(subroutine);
            match value {
                Some(value) => {
                    generate_expression(builder, subroutine, value);
                    builder.return_value(*id, target);
                }
                None => builder.return_no_value(*id, target),
            }
        }
        Stmt::Throw { id, value } => {
            generate_expression(builder, subroutine, value);
            builder.jump_to_error(*id);
        }
        Stmt::Try {
            id,
            body,
            catches,
            finally,
        } => {
            generate_try(builder, subroutine, body, catches, finally.as_ref());
            builder.read_unit(*id);
        }
        Stmt::Unsupported { id } => builder.unsupported(*id),
    }
}

fn generate_try(
    builder: &mut dyn ControlFlowBuilder,
    subroutine: NodeId,
    body: &[Stmt],
    catches: &[Catch],
    finally: Option<&Rc<[Stmt]>>,
) {
    if let Some(finally) = finally {
        let finally = Rc::clone(finally);
        builder.enter_try_finally(Rc::new(move |builder: &mut dyn ControlFlowBuilder| {
            generate_block(builder, subroutine, &finally);
        }));
    }

    let on_exception = (!catches.is_empty()).then(|| {
        let label = builder.create_unbound_label();
        builder.nondeterministic_jump(&label);
        label
    });
    let on_exception_to_finally = finally.map(|_| {
        let label = builder.create_unbound_label();
        builder.nondeterministic_jump(&label);
        label
    });

    generate_block(builder, subroutine, body);

    if let Some(on_exception) = on_exception {
        let after_catches = builder.create_unbound_label();
        builder.jump(&after_catches);

        builder.bind_label(&on_exception);
        let catch_labels: Vec<Label> = (1..catches.len())
            .map(|_| builder.create_unbound_label())
            .collect();
        if !catch_labels.is_empty() {
            builder.nondeterministic_jump_many(&catch_labels);
        }
        for (index, catch) in catches.iter().enumerate() {
            if index > 0 {
                builder.bind_label(&catch_labels[index - 1]);
            }
            generate_block(builder, subroutine, &catch.body);
            builder.jump(&after_catches);
        }
        builder.bind_label(&after_catches);
    }

    if let (Some(finally), Some(on_exception_to_finally)) = (finally, on_exception_to_finally) {
        builder.exit_try_finally();
        builder.bind_label(&on_exception_to_finally);
        generate_block(builder, subroutine, finally);
    }
}

fn generate_expression(builder: &mut dyn ControlFlowBuilder, subroutine: NodeId, expr: &Expr) {
    match expr {
        Expr::Value { id } => builder.read(*id),
        Expr::Call { id, args } => {
            for arg in args {
                generate_expression(builder, subroutine, arg);
            }
            builder.read(*id);
        }
        Expr::And { id, left, right } => {
            generate_expression(builder, subroutine, left);
            let result = builder.create_unbound_label();
            builder.jump_on_false(&result);
            generate_expression(builder, subroutine, right);
            builder.bind_label(&result);
            builder.read(*id);
        }
        Expr::Or { id, left, right } => {
            generate_expression(builder, subroutine, left);
            let result = builder.create_unbound_label();
            builder.jump_on_true(&result);
            generate_expression(builder, subroutine, right);
            builder.bind_label(&result);
            builder.read(*id);
        }
        Expr::Lambda(function) => generate(builder, function),
        Expr::Unsupported { id } => builder.unsupported(*id),
    }
}
