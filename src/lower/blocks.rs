//! Block-shape normalization.
//!
//! Every later stage assumes branches, loop bodies, and labeled statements
//! are blocks. The guarantee runs twice in the standard pipeline: once
//! before the loop lowerings (front ends may hand us bare statements) and
//! once after them, because the while lowering deliberately produces
//! `Labeled(L, If(..))` which has to become `Labeled(L, Block[If(..)])`
//! before scope analysis treats labels as owning a scope.

use crate::ir::{Block, Condition, IfStatement, Statement, StatementKind};

pub fn guarantee_blocks(block: Block) -> Block {
    Block {
        span: block.span,
        statements: block
            .statements
            .into_iter()
            .map(guarantee_statement)
            .collect(),
    }
}

fn guarantee_statement(statement: Statement) -> Statement {
    let span = statement.span;
    let kind = match statement.kind {
        StatementKind::Block(block) => StatementKind::Block(guarantee_blocks(block)),
        StatementKind::If(mut if_statement) => {
            if_statement.then_branch = as_block(guarantee_statement(if_statement.then_branch));
            if_statement.else_branch = if_statement
                .else_branch
                .map(|e| as_block(guarantee_statement(e)));
            StatementKind::If(if_statement)
        }
        StatementKind::While(mut while_loop) => {
            while_loop.body = as_block(guarantee_statement(while_loop.body));
            StatementKind::While(while_loop)
        }
        StatementKind::For(mut for_loop) => {
            for_loop.body = as_block(guarantee_statement(for_loop.body));
            StatementKind::For(for_loop)
        }
        StatementKind::DoWhile(mut do_while) => {
            do_while.body = as_block(guarantee_statement(do_while.body));
            StatementKind::DoWhile(do_while)
        }
        StatementKind::Labeled(label, inner) => {
            StatementKind::Labeled(label, Box::new(as_block(guarantee_statement(*inner))))
        }
        other => other,
    };

    Statement::new(span, kind)
}

/// Wraps a lone statement into a single-statement block; blocks pass
/// through untouched.
fn as_block(statement: Statement) -> Statement {
    match statement.kind {
        StatementKind::Block(_) => statement,
        _ => {
            let span = statement.span;
            Statement::new(
                span,
                StatementKind::Block(Block::new(span, vec![statement])),
            )
        }
    }
}

/// Collapses `if (true) { .. }` into its branch. The do-while lowering is
/// the only producer of constant conditions, so after this pass every
/// surviving condition is an identifier test.
pub fn fold_constant_conditions(block: Block) -> Block {
    let folded = Block {
        span: block.span,
        statements: block.statements.into_iter().map(fold_statement).collect(),
    };

    // Folding replaces if-statements with their branch blocks; splice those
    // back into the enclosing scope.
    folded.flattened()
}

fn fold_statement(statement: Statement) -> Statement {
    let span = statement.span;
    let kind = match statement.kind {
        StatementKind::Block(block) => StatementKind::Block(fold_constant_conditions(block)),
        StatementKind::If(if_statement) => {
            let if_statement = *if_statement;
            let then_branch = fold_statement(if_statement.then_branch);

            match if_statement.condition {
                // The else branch of a constant-true conditional is
                // unreachable and dropped with it.
                Condition::Always => then_branch.kind,
                condition => StatementKind::If(Box::new(IfStatement {
                    condition,
                    then_branch,
                    else_branch: if_statement.else_branch.map(fold_statement),
                })),
            }
        }
        StatementKind::Labeled(label, inner) => {
            // A constant-true conditional under a label folds to its branch
            // block, which is still a single statement — the label keeps
            // owning it.
            StatementKind::Labeled(label, Box::new(fold_statement(*inner)))
        }
        other => other,
    };

    Statement::new(span, kind)
}
