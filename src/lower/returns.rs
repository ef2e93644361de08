//! Return rewriting for methods that use the goto machinery.
//!
//! A method whose body still contains gotos or labels after loop lowering
//! cannot keep `return` statements: the flag lowering appends dispatch
//! checks at block ends, and the code generator rejects anything that
//! follows a return. Such methods instead store their return value in the
//! reserved `#RET` cell and jump to the canonical method-exit label, which
//! the flag lowering dispatches by merely clearing the flag (the method is
//! over once control drains back to the root).
//!
//! Methods without any jumps are left alone; their returns flow to the
//! code generator, which validates and emits them directly.

use crate::{
    diagnostics::{Diagnostic, DiagnosticKind, ice},
    intern::InternedSymbol,
    ir::{
        Assign, AssignOp, Block, Expr, ExprKind, Label, Statement, StatementKind, VarId,
    },
    lower::scope,
    names::NameTable,
};

pub fn lower_returns(
    body: Block,
    method_unit: InternedSymbol,
    names: &mut NameTable,
    diagnostics: &mut Vec<Diagnostic>,
) -> Block {
    if !scope::contains_jumps(&body) {
        return body;
    }

    let mut lowering = ReturnLowering {
        ret_var: names.ret_var(),
        exit: NameTable::method_exit_label(),
        method_unit,
        diagnostics,
        introduced_goto: false,
    };

    let mut body = lowering.rewrite_block(body, true);

    if lowering.introduced_goto {
        // The landing site. It goes at the very end of the method, inside
        // any trailing labeled blocks so that no label is ever followed by
        // a statement in its own scope.
        let trailer = Statement::new(
            body.span,
            StatementKind::Labeled(
                lowering.exit,
                Box::new(Statement::new(
                    body.span,
                    StatementKind::Block(Block::empty(body.span)),
                )),
            ),
        );
        append_through_labels(&mut body, trailer);
    }

    body
}

struct ReturnLowering<'a> {
    ret_var: VarId,
    exit: Label,
    method_unit: InternedSymbol,
    diagnostics: &'a mut Vec<Diagnostic>,
    introduced_goto: bool,
}

impl ReturnLowering<'_> {
    /// `root_chain` is true while the path up to the method root crosses
    /// only labeled blocks. A return in such a position is already the
    /// last thing the method does, so the exit jump degenerates to just
    /// the value store.
    fn rewrite_block(&mut self, block: Block, root_chain: bool) -> Block {
        // A (conditionally) returning statement must be the block's last;
        // catch violations here while the returns are still visible.
        for pair in block.statements.windows(2) {
            if pair[0].fully_returns() {
                self.diagnostics.push(Diagnostic::new(
                    self.method_unit,
                    pair[1].span,
                    DiagnosticKind::StatementAfterReturn,
                ));
            }
        }

        let rewritten = Block {
            span: block.span,
            statements: block
                .statements
                .into_iter()
                .map(|s| self.rewrite_statement(s, root_chain))
                .collect(),
        };

        rewritten.flattened()
    }

    fn rewrite_statement(&mut self, statement: Statement, root_chain: bool) -> Statement {
        let span = statement.span;
        let kind = match statement.kind {
            StatementKind::Return(value) => {
                let mut statements = Vec::with_capacity(2);

                if let Some(value) = value {
                    statements.push(Statement::new(
                        span,
                        StatementKind::Assign(Box::new(Assign {
                            target: self.ret_var,
                            op: AssignOp::Assign,
                            value,
                        })),
                    ));
                }

                if !root_chain {
                    statements.push(Statement::new(span, StatementKind::Goto(self.exit)));
                    self.introduced_goto = true;
                }

                StatementKind::Block(Block::new(span, statements))
            }
            StatementKind::If(mut if_statement) => {
                if_statement.then_branch =
                    self.rewrite_branch(if_statement.then_branch);
                if_statement.else_branch = if_statement
                    .else_branch
                    .map(|e| self.rewrite_branch(e));
                StatementKind::If(if_statement)
            }
            StatementKind::Labeled(label, inner) => {
                let inner = *inner;
                let inner_span = inner.span;
                match inner.kind {
                    StatementKind::Block(block) => StatementKind::Labeled(
                        label,
                        Box::new(Statement::new(
                            inner_span,
                            // Labels are transparent for the root-chain
                            // test: `label: { return; }` at the method end
                            // is still the method's final act.
                            StatementKind::Block(self.rewrite_block(block, root_chain)),
                        )),
                    ),
                    _ => ice!("a labeled statement may only label a block at this stage"),
                }
            }
            StatementKind::Block(block) => {
                StatementKind::Block(self.rewrite_block(block, false))
            }
            StatementKind::While(_) | StatementKind::For(_) | StatementKind::DoWhile(_) => {
                ice!("loops must be lowered before returns are rewritten")
            }
            other => other,
        };

        Statement::new(span, kind)
    }

    fn rewrite_branch(&mut self, statement: Statement) -> Statement {
        let span = statement.span;
        match statement.kind {
            StatementKind::Block(block) => {
                Statement::new(span, StatementKind::Block(self.rewrite_block(block, false)))
            }
            _ => ice!("branches must be blocks at this stage"),
        }
    }
}

fn append_through_labels(block: &mut Block, trailer: Statement) {
    let is_trailing_label = matches!(
        block.statements.last(),
        Some(Statement {
            kind: StatementKind::Labeled(_, _),
            ..
        })
    );

    if is_trailing_label {
        let Some(Statement {
            kind: StatementKind::Labeled(_, inner),
            ..
        }) = block.statements.last_mut()
        else {
            unreachable!()
        };
        match &mut inner.kind {
            StatementKind::Block(inner_block) => {
                append_through_labels(inner_block, trailer);
            }
            _ => ice!("a labeled statement may only label a block at this stage"),
        }
    } else {
        block.statements.push(trailer);
    }
}
