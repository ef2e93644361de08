//! Goto-to-flag lowering.
//!
//! The target model cannot jump: control only moves by invoking a named
//! unit, and a unit never resumes its caller at an arbitrary point. A
//! `goto L` therefore becomes `flag := id(L)` on a single per-method
//! integer flag (0 meaning "no jump pending"). Every scope between the
//! goto and the label guards its remaining statements with
//! `if (flag == 0) { .. }` so nothing runs while a jump is pending, and
//! the finest scope containing both the goto and the label appends
//! `if (flag == id(L)) { flag := 0; goto L; }` — the one place the jump
//! actually lands. A goto to the canonical method-exit label needs no
//! jump at all: its dispatch just clears the flag and lets the method
//! drain.
//!
//! In code form, a block like
//! ```text
//!     { { .. { /* has a goto */ } .. } }
//!     // label somewhere at this level
//! ```
//! is rewritten to
//! ```text
//!     { { .. { /* goto replaced by flag */ }
//!           if (flag == 0) { /* rest of this scope */ } .. }
//!       if (flag == 0) { /* rest of this scope */ } }
//!     if (flag == <id>) { flag := 0; goto label; }
//! ```

use crate::{
    diagnostics::ice,
    ir::{
        Assign, AssignOp, Block, Condition, Expr, ExprKind, FunctionId, IfStatement, Label,
        LocalDecl, Statement, StatementKind, Test, TestOp, Ty, VarId,
    },
    lower::{
        FlagTable,
        scope::{self, FlagDecode, LabelCounts},
    },
    names::NameTable,
};

pub fn flagify_method(
    body: Block,
    method: FunctionId,
    names: &mut NameTable,
    table: &mut FlagTable,
) -> Block {
    // Nothing to do unless the method actually jumps. (It may still
    // contain labels; those are harmless on their own.)
    let gotos = scope::contained_goto_labels(&body, None);
    if gotos.is_empty() {
        return body;
    }

    let span = body.span;
    let flag_var = names.goto_flag_var(method);
    let mut lowering = Flagify {
        flag_var,
        table,
        exit: NameTable::method_exit_label(),
        dispatched: Vec::new(),
    };

    let mut new_body = lowering.rewrite_block(body, None);

    // Every live goto target must have found exactly one dispatch site;
    // anything else would be a silently wrong jump, so fail loudly instead.
    for label in gotos.labels() {
        match lowering.dispatched.iter().filter(|l| **l == label).count() {
            1 => {}
            0 => ice!("no finest scope found for goto target `{label}`"),
            n => ice!("goto target `{label}` was dispatched {n} times"),
        }
    }

    // The flag cell, declared like any other root-scope local.
    new_body.statements.insert(
        0,
        Statement::new(
            span,
            StatementKind::LocalDecl(Box::new(LocalDecl {
                var: flag_var,
                ty: Ty::Int,
                initializer: None,
            })),
        ),
    );

    new_body
}

struct Flagify<'a> {
    flag_var: VarId,
    table: &'a mut FlagTable,
    exit: Label,
    /// Labels we have emitted a dispatch for, in order.
    dispatched: Vec<Label>,
}

impl Flagify<'_> {
    fn contained_gotos(&self, block: &Block) -> LabelCounts {
        scope::contained_goto_labels(
            block,
            Some(FlagDecode {
                flag_var: self.flag_var,
                table: self.table,
            }),
        )
    }

    /// `enclosing_label` is `Some` when `block` is the body of a labeled
    /// statement; the label counts as part of the block it labels.
    fn rewrite_block(&mut self, block: Block, enclosing_label: Option<Label>) -> Block {
        let gotos = self.contained_gotos(&block);
        if gotos.is_empty() {
            return block;
        }

        let span = block.span;

        // Split the block at the first branch: everything before it runs
        // unconditionally, everything after it may have to be skipped when
        // a descendant of the branch requested a jump.
        let mut before: Vec<Statement> = Vec::new();
        let mut first_branch: Option<Statement> = None;
        let mut after: Vec<Statement> = Vec::new();
        let mut encountered_goto = false;

        for statement in block.statements {
            if encountered_goto {
                // Splitting a method into units makes a goto basically a
                // call; anything after it in the same block would run on
                // the wrong side of the jump. Earlier stages never emit
                // this shape.
                ice!("goto must be the last statement of its block");
            }

            let mut statement = statement;

            if let StatementKind::Goto(label) = &statement.kind {
                let id = self.table.id(*label);
                statement = Statement::new(
                    statement.span,
                    StatementKind::Assign(Box::new(Assign {
                        target: self.flag_var,
                        op: AssignOp::Assign,
                        value: Expr {
                            span: statement.span,
                            kind: ExprKind::IntLiteral(id as i32),
                        },
                    })),
                );
                encountered_goto = true;
            }

            if first_branch.is_some() {
                after.push(statement);
                continue;
            }

            if matches!(statement.kind, StatementKind::If(_)) {
                first_branch = Some(self.rewrite_if(statement));
                continue;
            }

            if matches!(statement.kind, StatementKind::Labeled(_, _)) {
                statement = self.rewrite_labeled(statement);
            }

            before.push(statement);
        }

        let after_len = after.len();
        let after_block = self.rewrite_block(Block::new(span, after), None);

        let mut new_statements = before;
        if let Some(branch) = first_branch {
            new_statements.push(branch);
        }

        if after_len > 0 {
            // if (flag == 0) { rest of this scope }
            new_statements.push(Statement::new(
                span,
                StatementKind::If(Box::new(IfStatement {
                    condition: self.flag_test(0),
                    then_branch: Statement::new(span, StatementKind::Block(after_block)),
                    else_branch: None,
                })),
            ));
        }

        for label in gotos.labels() {
            let is_finest = {
                let candidate = Block::new(span, new_statements);
                let finest = scope::is_finest_scope_for(
                    &candidate,
                    enclosing_label,
                    label,
                    Some(FlagDecode {
                        flag_var: self.flag_var,
                        table: self.table,
                    }),
                );
                new_statements = candidate.statements;
                finest
            };

            if !is_finest {
                continue;
            }

            self.dispatched.push(label);
            let id = self.table.id(label);

            // if (flag == <id>) { flag := 0; goto label; }
            // Jumping to the method exit is jumping nowhere: the block is
            // already over, so only the flag reset remains.
            let mut dispatch = vec![Statement::new(
                span,
                StatementKind::Assign(Box::new(Assign {
                    target: self.flag_var,
                    op: AssignOp::Assign,
                    value: Expr {
                        span,
                        kind: ExprKind::IntLiteral(0),
                    },
                })),
            )];
            if label != self.exit {
                dispatch.push(Statement::new(span, StatementKind::Goto(label)));
            }

            new_statements.push(Statement::new(
                span,
                StatementKind::If(Box::new(IfStatement {
                    condition: self.flag_test(id as i32),
                    then_branch: Statement::new(
                        span,
                        StatementKind::Block(Block::new(span, dispatch)),
                    ),
                    else_branch: None,
                })),
            ));
        }

        Block::new(span, new_statements)
    }

    fn rewrite_if(&mut self, statement: Statement) -> Statement {
        let span = statement.span;
        let StatementKind::If(mut if_statement) = statement.kind else {
            unreachable!()
        };

        if_statement.then_branch = self.rewrite_branch(if_statement.then_branch);
        if_statement.else_branch = if_statement
            .else_branch
            .map(|e| self.rewrite_branch(e));

        Statement::new(span, StatementKind::If(if_statement))
    }

    fn rewrite_branch(&mut self, statement: Statement) -> Statement {
        let span = statement.span;
        match statement.kind {
            StatementKind::Block(block) => {
                Statement::new(span, StatementKind::Block(self.rewrite_block(block, None)))
            }
            _ => ice!("branches must be blocks at this stage"),
        }
    }

    fn rewrite_labeled(&mut self, statement: Statement) -> Statement {
        let span = statement.span;
        let StatementKind::Labeled(label, inner) = statement.kind else {
            unreachable!()
        };
        let inner = *inner;
        let inner_span = inner.span;

        match inner.kind {
            StatementKind::Block(block) => Statement::new(
                span,
                StatementKind::Labeled(
                    label,
                    Box::new(Statement::new(
                        inner_span,
                        StatementKind::Block(self.rewrite_block(block, Some(label))),
                    )),
                ),
            ),
            _ => ice!("a labeled statement may only label a block at this stage"),
        }
    }

    fn flag_test(&self, value: i32) -> Condition {
        Condition::Test(Test {
            var: self.flag_var,
            op: TestOp::Equal,
            value,
        })
    }
}
