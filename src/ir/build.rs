//! Constructors for assembling program trees in process. The front end
//! that owns parsing and resolution lives outside this crate; it — and the
//! tests here — build the restricted-form input through these functions.
//! Spans default to synthetic; callers with real source positions set them
//! on the returned nodes.

use super::{
    Assign, AssignOp, Block, Condition, DoWhileLoop, Expr, ExprKind, ForLoop, FunctionId,
    IfStatement, Invocation, Label, LocalDecl, Method, Program, Span, Statement, StatementKind,
    Test, TestOp, Ty, VarId, WhileLoop,
};

pub fn program(methods: Vec<Method>, entry_points: Vec<FunctionId>) -> Program {
    Program {
        methods,
        entry_points,
    }
}

pub fn method(id: FunctionId, params: Vec<VarId>, statements: Vec<Statement>) -> Method {
    Method {
        id,
        params,
        body: Block::new(Span::SYNTHETIC, statements),
        span: Span::SYNTHETIC,
    }
}

fn stmt(kind: StatementKind) -> Statement {
    Statement::new(Span::SYNTHETIC, kind)
}

pub fn block(statements: Vec<Statement>) -> Statement {
    stmt(StatementKind::Block(Block::new(Span::SYNTHETIC, statements)))
}

pub fn local(var: VarId) -> Statement {
    stmt(StatementKind::LocalDecl(Box::new(LocalDecl {
        var,
        ty: Ty::Int,
        initializer: None,
    })))
}

pub fn local_with_initializer(var: VarId, initializer: Expr) -> Statement {
    stmt(StatementKind::LocalDecl(Box::new(LocalDecl {
        var,
        ty: Ty::Int,
        initializer: Some(initializer),
    })))
}

pub fn assign(target: VarId, value: Expr) -> Statement {
    compound(target, AssignOp::Assign, value)
}

pub fn compound(target: VarId, op: AssignOp, value: Expr) -> Statement {
    stmt(StatementKind::Assign(Box::new(Assign { target, op, value })))
}

pub fn call_stmt(target: FunctionId, args: Vec<Expr>) -> Statement {
    stmt(StatementKind::Expr(invoke(target, args)))
}

pub fn ret(value: Option<Expr>) -> Statement {
    stmt(StatementKind::Return(value))
}

pub fn if_then(condition: Condition, then: Vec<Statement>) -> Statement {
    stmt(StatementKind::If(Box::new(IfStatement {
        condition,
        then_branch: block(then),
        else_branch: None,
    })))
}

pub fn if_then_else(
    condition: Condition,
    then: Vec<Statement>,
    els: Vec<Statement>,
) -> Statement {
    stmt(StatementKind::If(Box::new(IfStatement {
        condition,
        then_branch: block(then),
        else_branch: Some(block(els)),
    })))
}

pub fn while_loop(condition: Condition, body: Vec<Statement>) -> Statement {
    stmt(StatementKind::While(Box::new(WhileLoop {
        condition,
        body: block(body),
    })))
}

pub fn for_loop(
    initializers: Vec<Statement>,
    condition: Condition,
    incrementors: Vec<Statement>,
    body: Vec<Statement>,
) -> Statement {
    stmt(StatementKind::For(Box::new(ForLoop {
        initializers,
        condition,
        incrementors,
        body: block(body),
    })))
}

pub fn do_while(body: Vec<Statement>, condition: Condition) -> Statement {
    stmt(StatementKind::DoWhile(Box::new(DoWhileLoop {
        body: block(body),
        condition,
    })))
}

pub fn goto(label: Label) -> Statement {
    stmt(StatementKind::Goto(label))
}

pub fn labeled(label: Label, statements: Vec<Statement>) -> Statement {
    stmt(StatementKind::Labeled(label, Box::new(block(statements))))
}

pub fn brk() -> Statement {
    stmt(StatementKind::Break)
}

pub fn cont() -> Statement {
    stmt(StatementKind::Continue)
}

/// `var != 0`, the canonical branch condition.
pub fn nonzero(var: VarId) -> Condition {
    test(var, TestOp::NotEqual, 0)
}

pub fn test(var: VarId, op: TestOp, value: i32) -> Condition {
    Condition::Test(Test { var, op, value })
}

pub fn lit(value: i32) -> Expr {
    Expr {
        span: Span::SYNTHETIC,
        kind: ExprKind::IntLiteral(value),
    }
}

pub fn ident(var: VarId) -> Expr {
    Expr {
        span: Span::SYNTHETIC,
        kind: ExprKind::Identifier(var),
    }
}

pub fn invoke(target: FunctionId, args: Vec<Expr>) -> Expr {
    Expr {
        span: Span::SYNTHETIC,
        kind: ExprKind::Invocation(Box::new(Invocation { target, args })),
    }
}
