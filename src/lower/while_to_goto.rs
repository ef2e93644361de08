//! The last loop lowering: `while` loops become labeled conditional gotos.
//!
//! Transform
//! ```text
//!     while (cond) { .. }
//! ```
//! into
//! ```text
//!     whilestart0:
//!     if (cond) {
//!         ..
//!         goto whilestart0;
//!     }
//!     whilebreak0: {}   // only if the body contained a `break`
//! ```
//! Contained `break`s become `goto whilebreak0` and `continue`s become
//! `goto whilestart0`, each targeting the innermost loop's labels. The
//! appended back-edge goto is dropped when the body's last statement
//! already leaves the block unconditionally — it would be dead, and a
//! later stage rejects statements following an unconditional jump.

use crate::{
    diagnostics::ice,
    ir::{Block, IfStatement, Label, Statement, StatementKind},
    lower::LoweringContext,
};

pub fn lower_while_loops(block: Block, ctx: &mut LoweringContext) -> Block {
    let mut lowering = WhileToGoto {
        ctx,
        // Keep a base entry so the stacks are never empty.
        labels: vec![None],
        found_break: vec![false],
    };
    lowering.rewrite_block(block)
}

struct WhileToGoto<'a> {
    ctx: &'a mut LoweringContext,
    /// `(start, break)` labels of the innermost enclosing loop.
    labels: Vec<Option<(Label, Label)>>,
    found_break: Vec<bool>,
}

impl WhileToGoto<'_> {
    fn rewrite_block(&mut self, block: Block) -> Block {
        let rewritten = Block {
            span: block.span,
            statements: block
                .statements
                .into_iter()
                .map(|s| self.rewrite_statement(s))
                .collect(),
        };

        // Loops with breaks expand to two statements wrapped in a block;
        // splice those into the enclosing scope.
        rewritten.flattened()
    }

    fn rewrite_statement(&mut self, statement: Statement) -> Statement {
        let span = statement.span;
        let kind = match statement.kind {
            StatementKind::While(while_loop) => {
                let while_loop = *while_loop;
                let (start, brk) = self.ctx.fresh_loop_labels();

                self.labels.push(Some((start, brk)));
                self.found_break.push(false);
                let body = self.rewrite_block(expect_block(while_loop.body));
                let found_break = self.found_break.pop().unwrap();
                self.labels.pop();

                let mut statements = body.statements;

                // If the body already ends in an unconditional transfer
                // (a rewritten break/continue, a goto, a return, or a
                // branch tree all of whose paths do one of those), the
                // back edge is unreachable; adding it anyway would leave
                // dead code after a jump.
                if !statements.last().is_some_and(Statement::transfers_control) {
                    statements.push(Statement::new(span, StatementKind::Goto(start)));
                }

                let looped = Statement::new(
                    span,
                    StatementKind::Labeled(
                        start,
                        Box::new(Statement::new(
                            span,
                            StatementKind::If(Box::new(IfStatement {
                                condition: while_loop.condition,
                                then_branch: Statement::new(
                                    span,
                                    StatementKind::Block(Block::new(span, statements)),
                                ),
                                else_branch: None,
                            })),
                        )),
                    ),
                );

                if found_break {
                    // Somewhere to land after the loop.
                    let break_target = Statement::new(
                        span,
                        StatementKind::Labeled(
                            brk,
                            Box::new(Statement::new(
                                span,
                                StatementKind::Block(Block::empty(span)),
                            )),
                        ),
                    );
                    StatementKind::Block(Block::new(span, vec![looped, break_target]))
                } else {
                    looped.kind
                }
            }
            StatementKind::Break => {
                let Some((_, brk)) = self.innermost_labels() else {
                    ice!("break outside of any loop reached the loop lowering");
                };
                *self.found_break.last_mut().unwrap() = true;
                StatementKind::Goto(brk)
            }
            StatementKind::Continue => {
                let Some((start, _)) = self.innermost_labels() else {
                    ice!("continue outside of any loop reached the loop lowering");
                };
                StatementKind::Goto(start)
            }
            StatementKind::For(_) | StatementKind::DoWhile(_) => {
                ice!("for/do-while loops must be lowered to while loops first")
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

    fn innermost_labels(&self) -> Option<(Label, Label)> {
        *self.labels.last().unwrap()
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
    use crate::ir::{
        Assign, AssignOp, Condition, Expr, ExprKind, Span, Test, TestOp, VarId,
        WhileLoop,
    };

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

    fn while_loop(var: VarId, body: Vec<Statement>) -> Statement {
        stmt(StatementKind::While(Box::new(WhileLoop {
            condition: Condition::Test(Test {
                var,
                op: TestOp::NotEqual,
                value: 0,
            }),
            body: stmt(StatementKind::Block(Block::new(Span::SYNTHETIC, body))),
        })))
    }

    fn lower(block: Block) -> Block {
        lower_while_loops(block, &mut LoweringContext::new())
    }

    #[test]
    fn canonical_form_without_break() {
        let i = VarId::from_raw(810);
        let tree = Block::new(
            Span::SYNTHETIC,
            vec![while_loop(i, vec![assign_lit(i, 1)])],
        );

        let lowered = lower(tree);

        // One labeled statement, no break landing pad.
        assert_eq!(lowered.statements.len(), 1);
        let StatementKind::Labeled(start, inner) = &lowered.statements[0].kind else {
            panic!("expected label");
        };
        assert_eq!(start.value(), "whilestart0");
        let StatementKind::If(if_statement) = &inner.kind else {
            panic!("expected if");
        };
        let StatementKind::Block(body) = &if_statement.then_branch.kind else {
            panic!("expected block");
        };
        assert_eq!(body.statements.len(), 2);
        let StatementKind::Goto(target) = &body.statements[1].kind else {
            panic!("expected back-edge goto");
        };
        assert_eq!(*target, *start);
    }

    #[test]
    fn break_gets_a_landing_label_and_no_back_edge() {
        let i = VarId::from_raw(811);
        let tree = Block::new(
            Span::SYNTHETIC,
            vec![while_loop(i, vec![assign_lit(i, 1), stmt(StatementKind::Break)])],
        );

        let lowered = lower(tree);

        assert_eq!(lowered.statements.len(), 2);
        let StatementKind::Labeled(_, inner) = &lowered.statements[0].kind else {
            panic!("expected loop label");
        };
        let StatementKind::If(if_statement) = &inner.kind else {
            panic!("expected if");
        };
        let StatementKind::Block(body) = &if_statement.then_branch.kind else {
            panic!("expected block");
        };
        // `i = 1; goto whilebreak0;` and nothing else: the rewritten break
        // already transfers, so no back edge was appended.
        assert_eq!(body.statements.len(), 2);
        let StatementKind::Goto(brk) = &body.statements[1].kind else {
            panic!("expected rewritten break");
        };
        assert_eq!(brk.value(), "whilebreak0");

        let StatementKind::Labeled(landing, _) = &lowered.statements[1].kind else {
            panic!("expected break landing label");
        };
        assert_eq!(landing.value(), "whilebreak0");
    }

    #[test]
    fn break_and_continue_target_the_innermost_loop() {
        let i = VarId::from_raw(812);
        let inner = while_loop(i, vec![stmt(StatementKind::Break)]);
        let tree = Block::new(
            Span::SYNTHETIC,
            vec![while_loop(i, vec![inner, stmt(StatementKind::Continue)])],
        );

        let lowered = lower(tree);

        // Outer loop is labeled whilestart0; the inner loop allocated the
        // next pair. The outer body holds the lowered inner loop (with its
        // break landing pad spliced in) and the rewritten continue.
        let StatementKind::Labeled(outer_start, outer) = &lowered.statements[0].kind else {
            panic!("expected outer label");
        };
        assert_eq!(outer_start.value(), "whilestart0");
        let StatementKind::If(outer_if) = &outer.kind else {
            panic!("expected if");
        };
        let StatementKind::Block(outer_body) = &outer_if.then_branch.kind else {
            panic!("expected block");
        };

        let StatementKind::Labeled(inner_start, _) = &outer_body.statements[0].kind else {
            panic!("expected inner loop label");
        };
        assert_eq!(inner_start.value(), "whilestart1");
        let StatementKind::Labeled(inner_brk, _) = &outer_body.statements[1].kind else {
            panic!("expected inner break label");
        };
        assert_eq!(inner_brk.value(), "whilebreak1");
        let StatementKind::Goto(continue_target) = &outer_body.statements[2].kind else {
            panic!("expected rewritten continue");
        };
        assert_eq!(continue_target.value(), "whilestart0");
    }
}
