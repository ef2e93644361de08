//! Scope analysis for the goto-to-flag lowering.
//!
//! For any block we can ask three things: which goto targets occur in its
//! subtree (with multiplicity), which labels are defined in its subtree,
//! and whether it is the *finest* scope containing both a goto to some
//! label and that label itself — the one place where the flag-to-jump
//! dispatch for the label belongs. Gotos that have already been rewritten
//! into `flag := <id>` assignments still count; the analysis runs on
//! partially rewritten trees.

use hashbrown::HashSet;

use crate::{
    diagnostics::ice,
    ir::{AssignOp, Block, ExprKind, Label, Statement, StatementKind, VarId},
    lower::FlagTable,
};

/// How to recognize an already-flagified goto: an assignment of a nonzero
/// literal to the method's flag variable.
#[derive(Clone, Copy)]
pub struct FlagDecode<'a> {
    pub flag_var: VarId,
    pub table: &'a FlagTable,
}

/// Goto-target multiplicities in first-encounter order. Downstream code
/// iterates this for output, so the order must be a function of the tree
/// alone.
#[derive(Debug, Default)]
pub struct LabelCounts {
    entries: Vec<(Label, usize)>,
}

impl LabelCounts {
    fn add(&mut self, label: Label) {
        if let Some(entry) = self.entries.iter_mut().find(|(l, _)| *l == label) {
            entry.1 += 1;
        } else {
            self.entries.push((label, 1));
        }
    }

    pub fn count(&self, label: Label) -> usize {
        self.entries
            .iter()
            .find(|(l, _)| *l == label)
            .map_or(0, |(_, c)| *c)
    }

    pub fn labels(&self) -> impl Iterator<Item = Label> + '_ {
        self.entries.iter().map(|(l, _)| *l)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Every goto target in `block`'s subtree, including flag-encoded ones.
pub fn contained_goto_labels(block: &Block, decode: Option<FlagDecode>) -> LabelCounts {
    let mut counts = LabelCounts::default();
    for statement in &block.statements {
        collect_gotos(statement, decode, &mut counts);
    }
    counts
}

fn collect_gotos(statement: &Statement, decode: Option<FlagDecode>, counts: &mut LabelCounts) {
    match &statement.kind {
        StatementKind::Goto(label) => counts.add(*label),
        StatementKind::Assign(assign) => {
            if let Some(decode) = decode
                && assign.target == decode.flag_var
                && assign.op == AssignOp::Assign
                && let ExprKind::IntLiteral(value) = &assign.value.kind
                && *value != 0
            {
                counts.add(decode.table.label(*value as u32));
            }
        }
        StatementKind::Block(block) => {
            for s in &block.statements {
                collect_gotos(s, decode, counts);
            }
        }
        StatementKind::If(if_statement) => {
            collect_gotos(&if_statement.then_branch, decode, counts);
            if let Some(else_branch) = &if_statement.else_branch {
                collect_gotos(else_branch, decode, counts);
            }
        }
        StatementKind::Labeled(_, inner) => collect_gotos(inner, decode, counts),
        StatementKind::While(w) => collect_gotos(&w.body, decode, counts),
        StatementKind::For(f) => collect_gotos(&f.body, decode, counts),
        StatementKind::DoWhile(d) => collect_gotos(&d.body, decode, counts),
        StatementKind::Break
        | StatementKind::Continue
        | StatementKind::Return(_)
        | StatementKind::LocalDecl(_)
        | StatementKind::Expr(_) => {}
    }
}

/// Every label defined in `block`'s subtree. Does *not* include a label
/// that wraps `block` itself; the caller passes that separately.
pub fn contained_labels(block: &Block) -> HashSet<Label> {
    let mut labels = HashSet::new();
    for statement in &block.statements {
        collect_labels(statement, &mut labels);
    }
    labels
}

fn collect_labels(statement: &Statement, labels: &mut HashSet<Label>) {
    match &statement.kind {
        StatementKind::Labeled(label, inner) => {
            labels.insert(*label);
            collect_labels(inner, labels);
        }
        StatementKind::Block(block) => {
            for s in &block.statements {
                collect_labels(s, labels);
            }
        }
        StatementKind::If(if_statement) => {
            collect_labels(&if_statement.then_branch, labels);
            if let Some(else_branch) = &if_statement.else_branch {
                collect_labels(else_branch, labels);
            }
        }
        StatementKind::While(w) => collect_labels(&w.body, labels),
        StatementKind::For(f) => collect_labels(&f.body, labels),
        StatementKind::DoWhile(d) => collect_labels(&d.body, labels),
        _ => {}
    }
}

/// Whether `block`'s subtree mentions any goto or label at all. Methods
/// without jumps skip the flag protocol (and the return rewrite) entirely.
pub fn contains_jumps(block: &Block) -> bool {
    !contained_goto_labels(block, None).is_empty() || !contained_labels(block).is_empty()
}

/// Whether `block` is the finest scope containing both a goto to `label`
/// and the label itself. `parent_label` is `Some` when `block` is the body
/// of a labeled statement — the label counts as part of the block it
/// labels.
///
/// The tie-break is "finer but not fewer": a child scope only takes the
/// dispatch away from us if it sees the label *and* the same number of
/// gotos we do. A child with fewer gotos means some goto lives beside it,
/// so the dispatch must stay at our level.
pub fn is_finest_scope_for(
    block: &Block,
    parent_label: Option<Label>,
    label: Label,
    decode: Option<FlagDecode>,
) -> bool {
    let goto_count = contained_goto_labels(block, decode).count(label);
    let contains_label =
        contained_labels(block).contains(&label) || parent_label == Some(label);

    if goto_count == 0 || !contains_label {
        return false;
    }

    for statement in &block.statements {
        let mut check: Vec<(&Block, Option<Label>)> = Vec::with_capacity(2);

        match &statement.kind {
            StatementKind::Labeled(inner_label, inner) => match &inner.kind {
                StatementKind::Block(b) => check.push((b, Some(*inner_label))),
                _ => ice!("a labeled statement may only label a block at this stage"),
            },
            StatementKind::If(if_statement) => {
                match &if_statement.then_branch.kind {
                    StatementKind::Block(b) => check.push((b, None)),
                    _ => ice!("branches must be blocks at this stage"),
                }
                if let Some(else_branch) = &if_statement.else_branch {
                    match &else_branch.kind {
                        StatementKind::Block(b) => check.push((b, None)),
                        _ => ice!("branches must be blocks at this stage"),
                    }
                }
            }
            _ => {}
        }

        for (child, child_parent_label) in check {
            let child_count = contained_goto_labels(child, decode).count(label);
            let child_contains_label =
                contained_labels(child).contains(&label) || child_parent_label == Some(label);

            if child_contains_label && child_count == goto_count {
                return false;
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        intern::InternedSymbol,
        ir::{Condition, IfStatement, Span, Test, TestOp, VarId},
    };

    fn stmt(kind: StatementKind) -> Statement {
        Statement::new(Span::SYNTHETIC, kind)
    }

    fn block(statements: Vec<Statement>) -> Block {
        Block::new(Span::SYNTHETIC, statements)
    }

    fn labeled_block(label: Label, statements: Vec<Statement>) -> Statement {
        stmt(StatementKind::Labeled(
            label,
            Box::new(stmt(StatementKind::Block(block(statements)))),
        ))
    }

    fn branch(then_statements: Vec<Statement>) -> Statement {
        stmt(StatementKind::If(Box::new(IfStatement {
            condition: Condition::Test(Test {
                var: VarId::from_raw(900),
                op: TestOp::NotEqual,
                value: 0,
            }),
            then_branch: stmt(StatementKind::Block(block(then_statements))),
            else_branch: None,
        })))
    }

    #[test]
    fn goto_counts_keep_encounter_order() {
        let a = InternedSymbol::new("scope-a");
        let b = InternedSymbol::new("scope-b");
        let tree = block(vec![
            stmt(StatementKind::Goto(a)),
            branch(vec![stmt(StatementKind::Goto(b)), stmt(StatementKind::Goto(a))]),
        ]);

        let counts = contained_goto_labels(&tree, None);
        let order: Vec<_> = counts.labels().collect();

        assert_eq!(order, vec![a, b]);
        assert_eq!(counts.count(a), 2);
        assert_eq!(counts.count(b), 1);
    }

    #[test]
    fn finest_scope_prefers_the_deepest_candidate() {
        let l = InternedSymbol::new("scope-l");
        // l: { if (..) { goto l } }  — the labeled block itself is finest
        let inner = vec![branch(vec![stmt(StatementKind::Goto(l))])];
        let root = block(vec![labeled_block(l, inner.clone())]);

        assert!(!is_finest_scope_for(&root, None, l, None));

        let labeled = block(inner);
        assert!(is_finest_scope_for(&labeled, Some(l), l, None));
    }

    #[test]
    fn sibling_goto_keeps_dispatch_in_the_outer_scope() {
        let l = InternedSymbol::new("scope-m");
        // { l: { goto l }  goto l } — the labeled child sees fewer gotos
        // than the root, so the root stays the dispatch site.
        let root = block(vec![
            labeled_block(l, vec![stmt(StatementKind::Goto(l))]),
            stmt(StatementKind::Goto(l)),
        ]);

        assert!(is_finest_scope_for(&root, None, l, None));
    }
}
