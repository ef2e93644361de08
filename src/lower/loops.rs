//! The first two loop lowerings: `for` loops become `while` loops and
//! `do`-`while` loops become `while (true)` loops. Both leave plain
//! `while` loops alone; those fall to the labeled-goto lowering.

use crate::{
    diagnostics::ice,
    ir::{
        Block, Condition, IfStatement, Statement, StatementKind,
    },
};

/// Transform
/// ```text
///     for (init; cond; update) { .. }
/// ```
/// into
/// ```text
///     { init; while (cond) { ..; update; } }
/// ```
/// where every `continue` in the loop's own scope is replaced with
/// `{ update; continue; }` so the update still runs.
pub fn lower_for_loops(block: Block) -> Block {
    let mut lowering = ForLowering {
        // Keep a base of "not in a for loop" so the stack is never empty.
        incrementors: vec![None],
    };
    lowering.rewrite_block(block)
}

struct ForLowering {
    /// `Some(update statements)` while directly inside a for loop being
    /// converted, `None` inside any other loop type. `continue` only picks
    /// up the update of the *innermost* for conversion.
    incrementors: Vec<Option<Vec<Statement>>>,
}

impl ForLowering {
    fn rewrite_block(&mut self, block: Block) -> Block {
        let rewritten = Block {
            span: block.span,
            statements: block
                .statements
                .into_iter()
                .map(|s| self.rewrite_statement(s))
                .collect(),
        };

        // `continue` rewriting introduces nested blocks; splice them away.
        rewritten.flattened()
    }

    fn rewrite_statement(&mut self, statement: Statement) -> Statement {
        let span = statement.span;
        let kind = match statement.kind {
            StatementKind::For(for_loop) => {
                let for_loop = *for_loop;

                // Declarations have been hoisted to the method root before
                // this core runs; a declaration in loop position is a
                // front-end defect, not a user error.
                for init in for_loop.initializers.iter().chain(&for_loop.incrementors) {
                    if matches!(init.kind, StatementKind::LocalDecl(_)) {
                        ice!("for-loop initializers may not contain declarations");
                    }
                }

                self.incrementors.push(Some(for_loop.incrementors.clone()));
                let mut body = self.rewrite_block(expect_block(for_loop.body));
                self.incrementors.pop();

                body.statements.extend(for_loop.incrementors);

                let mut statements = for_loop.initializers;
                statements.push(Statement::new(
                    span,
                    StatementKind::While(Box::new(crate::ir::WhileLoop {
                        condition: for_loop.condition,
                        body: Statement::new(span, StatementKind::Block(body)),
                    })),
                ));

                StatementKind::Block(Block::new(span, statements))
            }
            StatementKind::While(mut while_loop) => {
                self.incrementors.push(None);
                while_loop.body = self.rewrite_body(while_loop.body);
                self.incrementors.pop();
                StatementKind::While(while_loop)
            }
            StatementKind::DoWhile(mut do_while) => {
                self.incrementors.push(None);
                do_while.body = self.rewrite_body(do_while.body);
                self.incrementors.pop();
                StatementKind::DoWhile(do_while)
            }
            StatementKind::Continue => {
                match self.incrementors.last().cloned().flatten() {
                    None => StatementKind::Continue,
                    Some(incrementors) => {
                        // Part of a for -> while conversion; run the update
                        // before continuing.
                        let mut statements = incrementors;
                        statements
                            .push(Statement::new(span, StatementKind::Continue));
                        StatementKind::Block(Block::new(span, statements))
                    }
                }
            }
            StatementKind::If(mut if_statement) => {
                if_statement.then_branch = self.rewrite_body(if_statement.then_branch);
                if_statement.else_branch = if_statement
                    .else_branch
                    .map(|e| self.rewrite_body(e));
                StatementKind::If(if_statement)
            }
            StatementKind::Labeled(label, inner) => {
                StatementKind::Labeled(label, Box::new(self.rewrite_body(*inner)))
            }
            StatementKind::Block(block) => StatementKind::Block(self.rewrite_block(block)),
            other => other,
        };

        Statement::new(span, kind)
    }

    fn rewrite_body(&mut self, statement: Statement) -> Statement {
        let span = statement.span;
        match statement.kind {
            StatementKind::Block(block) => {
                Statement::new(span, StatementKind::Block(self.rewrite_block(block)))
            }
            _ => self.rewrite_statement(statement),
        }
    }
}

/// Transform
/// ```text
///     do { .. } while (cond);
/// ```
/// into
/// ```text
///     while (true) { ..; if (cond) { continue; } else { break; } }
/// ```
pub fn lower_do_while_loops(block: Block) -> Block {
    let rewritten = Block {
        span: block.span,
        statements: block
            .statements
            .into_iter()
            .map(rewrite_do_while)
            .collect(),
    };

    rewritten.flattened()
}

fn rewrite_do_while(statement: Statement) -> Statement {
    let span = statement.span;
    let kind = match statement.kind {
        StatementKind::DoWhile(do_while) => {
            let do_while = *do_while;
            let mut body = lower_do_while_loops(expect_block(do_while.body));

            body.statements.push(Statement::new(
                span,
                StatementKind::If(Box::new(IfStatement {
                    condition: do_while.condition,
                    then_branch: Statement::new(
                        span,
                        StatementKind::Block(Block::new(
                            span,
                            vec![Statement::new(span, StatementKind::Continue)],
                        )),
                    ),
                    else_branch: Some(Statement::new(
                        span,
                        StatementKind::Block(Block::new(
                            span,
                            vec![Statement::new(span, StatementKind::Break)],
                        )),
                    )),
                })),
            ));

            StatementKind::While(Box::new(crate::ir::WhileLoop {
                condition: Condition::Always,
                body: Statement::new(span, StatementKind::Block(body)),
            }))
        }
        StatementKind::While(mut while_loop) => {
            while_loop.body = rewrite_do_while_body(while_loop.body);
            StatementKind::While(while_loop)
        }
        StatementKind::For(mut for_loop) => {
            for_loop.body = rewrite_do_while_body(for_loop.body);
            StatementKind::For(for_loop)
        }
        StatementKind::If(mut if_statement) => {
            if_statement.then_branch = rewrite_do_while_body(if_statement.then_branch);
            if_statement.else_branch =
                if_statement.else_branch.map(rewrite_do_while_body);
            StatementKind::If(if_statement)
        }
        StatementKind::Labeled(label, inner) => {
            StatementKind::Labeled(label, Box::new(rewrite_do_while_body(*inner)))
        }
        StatementKind::Block(block) => StatementKind::Block(lower_do_while_loops(block)),
        other => other,
    };

    Statement::new(span, kind)
}

fn rewrite_do_while_body(statement: Statement) -> Statement {
    let span = statement.span;
    match statement.kind {
        StatementKind::Block(block) => {
            Statement::new(span, StatementKind::Block(lower_do_while_loops(block)))
        }
        _ => rewrite_do_while(statement),
    }
}

fn expect_block(statement: Statement) -> Block {
    match statement.kind {
        StatementKind::Block(block) => block,
        _ => ice!("loop bodies must be blocks at this stage"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Assign, AssignOp, Expr, ExprKind, Span, Test, TestOp, VarId, WhileLoop};

    fn stmt(kind: StatementKind) -> Statement {
        Statement::new(Span::SYNTHETIC, kind)
    }

    fn assign_lit(var: VarId, value: i32) -> Statement {
        stmt(StatementKind::Assign(Box::new(Assign {
            target: var,
            op: AssignOp::Assign,
            value: Expr {
                span: Span::SYNTHETIC,
                kind: ExprKind::IntLiteral(value),
            },
        })))
    }

    fn test_cond(var: VarId) -> Condition {
        Condition::Test(Test {
            var,
            op: TestOp::NotEqual,
            value: 0,
        })
    }

    #[test]
    fn for_loops_append_updates_and_rewrite_continue() {
        let i = VarId::from_raw(800);
        let body = Block::new(
            Span::SYNTHETIC,
            vec![stmt(StatementKind::Continue)],
        );
        let tree = Block::new(
            Span::SYNTHETIC,
            vec![stmt(StatementKind::For(Box::new(crate::ir::ForLoop {
                initializers: vec![assign_lit(i, 0)],
                condition: test_cond(i),
                incrementors: vec![assign_lit(i, 1)],
                body: stmt(StatementKind::Block(body)),
            })))],
        );

        let lowered = lower_for_loops(tree);

        // { i = 0; while (cond) { i = 1; continue; i = 1; } } flattened
        assert_eq!(lowered.statements.len(), 2);
        assert!(matches!(lowered.statements[0].kind, StatementKind::Assign(_)));
        let StatementKind::While(while_loop) = &lowered.statements[1].kind else {
            panic!("expected while loop");
        };
        let StatementKind::Block(while_body) = &while_loop.body.kind else {
            panic!("expected block body");
        };
        assert_eq!(while_body.statements.len(), 3);
        assert!(matches!(
            while_body.statements[0].kind,
            StatementKind::Assign(_)
        ));
        assert!(matches!(
            while_body.statements[1].kind,
            StatementKind::Continue
        ));
        assert!(matches!(
            while_body.statements[2].kind,
            StatementKind::Assign(_)
        ));
    }

    #[test]
    fn continue_inside_unrelated_loop_is_untouched() {
        let i = VarId::from_raw(801);
        let inner_while = stmt(StatementKind::While(Box::new(WhileLoop {
            condition: test_cond(i),
            body: stmt(StatementKind::Block(Block::new(
                Span::SYNTHETIC,
                vec![stmt(StatementKind::Continue)],
            ))),
        })));
        let tree = Block::new(
            Span::SYNTHETIC,
            vec![stmt(StatementKind::For(Box::new(crate::ir::ForLoop {
                initializers: vec![],
                condition: test_cond(i),
                incrementors: vec![assign_lit(i, 1)],
                body: stmt(StatementKind::Block(Block::new(
                    Span::SYNTHETIC,
                    vec![inner_while],
                ))),
            })))],
        );

        let lowered = lower_for_loops(tree);

        let StatementKind::While(outer) = &lowered.statements[0].kind else {
            panic!("expected while");
        };
        let StatementKind::Block(outer_body) = &outer.body.kind else {
            panic!("expected block");
        };
        let StatementKind::While(inner) = &outer_body.statements[0].kind else {
            panic!("expected inner while");
        };
        let StatementKind::Block(inner_body) = &inner.body.kind else {
            panic!("expected block");
        };
        // The inner loop's continue picked up no update statements.
        assert_eq!(inner_body.statements.len(), 1);
        assert!(matches!(
            inner_body.statements[0].kind,
            StatementKind::Continue
        ));
    }

    #[test]
    fn do_while_becomes_while_true_with_branch_exit() {
        let i = VarId::from_raw(802);
        let tree = Block::new(
            Span::SYNTHETIC,
            vec![stmt(StatementKind::DoWhile(Box::new(
                crate::ir::DoWhileLoop {
                    body: stmt(StatementKind::Block(Block::new(
                        Span::SYNTHETIC,
                        vec![assign_lit(i, 1)],
                    ))),
                    condition: test_cond(i),
                },
            )))],
        );

        let lowered = lower_do_while_loops(tree);

        let StatementKind::While(while_loop) = &lowered.statements[0].kind else {
            panic!("expected while");
        };
        assert_eq!(while_loop.condition, Condition::Always);
        let StatementKind::Block(body) = &while_loop.body.kind else {
            panic!("expected block");
        };
        assert_eq!(body.statements.len(), 2);
        let StatementKind::If(exit) = &body.statements[1].kind else {
            panic!("expected branch exit");
        };
        assert!(exit.else_branch.is_some());
    }
}
