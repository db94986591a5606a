//! A miniature structured syntax tree for driving the builder in tests.
//!
//! Nodes carry only their `NodeId` and children; the builder never needs
//! more than identity.

use std::rc::Rc;

use pseudoflow_core::NodeId;

/// A subroutine: a top-level function or a lambda body.
#[derive(Debug, Clone)]
pub struct Function {
    pub id: NodeId,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct Catch {
    pub id: NodeId,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(Expr),
    Assign {
        id: NodeId,
        target: NodeId,
        value: Expr,
    },
    If {
        id: NodeId,
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Vec<Stmt>,
    },
    While {
        id: NodeId,
        condition: Expr,
        body: Vec<Stmt>,
    },
    DoWhile {
        id: NodeId,
        body: Vec<Stmt>,
        condition: Expr,
    },
    /// `target` names the loop; `None` means the innermost one.
    Break {
        id: NodeId,
        target: Option<NodeId>,
    },
    Continue {
        id: NodeId,
        target: Option<NodeId>,
    },
    /// `target` names the subroutine; `None` means the innermost one.
    Return {
        id: NodeId,
        value: Option<Expr>,
        target: Option<NodeId>,
    },
    Throw {
        id: NodeId,
        value: Expr,
    },
    Try {
        id: NodeId,
        body: Vec<Stmt>,
        catches: Vec<Catch>,
        finally: Option<Rc<[Stmt]>>,
    },
    Unsupported {
        id: NodeId,
    },
}

#[derive(Debug, Clone)]
pub enum Expr {
    /// A name or literal.
    Value { id: NodeId },
    Call { id: NodeId, args: Vec<Expr> },
    And {
        id: NodeId,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Or {
        id: NodeId,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Lambda(Function),
    Unsupported { id: NodeId },
}

impl Expr {
    pub fn id(&self) -> NodeId {
        match self {
            Expr::Value { id }
            | Expr::Call { id, .. }
            | Expr::And { id, .. }
            | Expr::Or { id, .. }
            | Expr::Unsupported { id } => *id,
            Expr::Lambda(function) => function.id,
        }
    }
}

impl Stmt {
    pub fn id(&self) -> NodeId {
        match self {
            Stmt::Expr(expr) => expr.id(),
            Stmt::Assign { id, .. }
            | Stmt::If { id, .. }
            | Stmt::While { id, .. }
            | Stmt::DoWhile { id, .. }
            | Stmt::Break { id, .. }
            | Stmt::Continue { id, .. }
            | Stmt::Return { id, .. }
            | Stmt::Throw { id, .. }
            | Stmt::Try { id, .. }
            | Stmt::Unsupported { id } => *id,
        }
    }
}

/// Allocates node ids in creation order.
///
/// Loops and subroutines take their id up front so nested `break`,
/// `continue` and `return` statements can name them.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    next_id: u32,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn function(&mut self, id: NodeId, body: Vec<Stmt>) -> Function {
        Function { id, body }
    }

    pub fn value(&mut self) -> Expr {
        Expr::Value { id: self.id() }
    }

    pub fn call(&mut self, args: Vec<Expr>) -> Expr {
        Expr::Call {
            id: self.id(),
            args,
        }
    }

    pub fn and(&mut self, left: Expr, right: Expr) -> Expr {
        Expr::And {
            id: self.id(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn or(&mut self, left: Expr, right: Expr) -> Expr {
        Expr::Or {
            id: self.id(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn lambda(&mut self, id: NodeId, body: Vec<Stmt>) -> Expr {
        Expr::Lambda(Function { id, body })
    }

    pub fn unsupported_expr(&mut self) -> Expr {
        Expr::Unsupported { id: self.id() }
    }

    pub fn expr(&mut self, expr: Expr) -> Stmt {
        Stmt::Expr(expr)
    }

    pub fn assign(&mut self, value: Expr) -> Stmt {
        Stmt::Assign {
            id: self.id(),
            target: self.id(),
            value,
        }
    }

    pub fn if_else(&mut self, condition: Expr, then_branch: Vec<Stmt>, else_branch: Vec<Stmt>) -> Stmt {
        Stmt::If {
            id: self.id(),
            condition,
            then_branch,
            else_branch,
        }
    }

    pub fn while_loop(&mut self, id: NodeId, condition: Expr, body: Vec<Stmt>) -> Stmt {
        Stmt::While {
            id,
            condition,
            body,
        }
    }

    pub fn do_while(&mut self, id: NodeId, body: Vec<Stmt>, condition: Expr) -> Stmt {
        Stmt::DoWhile {
            id,
            body,
            condition,
        }
    }

    pub fn break_(&mut self, target: Option<NodeId>) -> Stmt {
        Stmt::Break {
            id: self.id(),
            target,
        }
    }

    pub fn continue_(&mut self, target: Option<NodeId>) -> Stmt {
        Stmt::Continue {
            id: self.id(),
            target,
        }
    }

    pub fn return_(&mut self, value: Option<Expr>) -> Stmt {
        Stmt::Return {
            id: self.id(),
            value,
            target: None,
        }
    }

    /// A `return` that names the subroutine it leaves.
    pub fn return_to(&mut self, target: NodeId, value: Option<Expr>) -> Stmt {
        Stmt::Return {
            id: self.id(),
            value,
            target: Some(target),
        }
    }

    pub fn throw(&mut self, value: Expr) -> Stmt {
        Stmt::Throw {
            id: self.id(),
            value,
        }
    }

    pub fn catch(&mut self, body: Vec<Stmt>) -> Catch {
        Catch {
            id: self.id(),
            body,
        }
    }

    pub fn try_(&mut self, body: Vec<Stmt>, catches: Vec<Catch>, finally: Option<Vec<Stmt>>) -> Stmt {
        Stmt::Try {
            id: self.id(),
            body,
            catches,
            finally: finally.map(Rc::from),
        }
    }

    pub fn unsupported(&mut self) -> Stmt {
        Stmt::Unsupported { id: self.id() }
    }
}
