//! The code generator: walks the fully lowered tree and emits the call
//! graph of straight-line units.
//!
//! By the time a method arrives here, earlier stages guarantee that the
//! only statements left are root-scope declarations, assignments with
//! literal/identifier/call right-hand sides, bare calls, identifier-test
//! conditionals with block branches, returns, and the goto/label pairs the
//! flag lowering itself planted around its dispatch sites.
//!
//! The instruction vocabulary of a unit:
//!
//! ```text
//!     set <cell> <int>                   assign an integer literal
//!     op <cell> <assignop> <cell>        copy or arithmetic between cells
//!     call <unit>                        invoke a unit
//!     guard-if-eq <cell> <int> run <i>   run <i> iff the cell matches
//!     guard-if-ne <cell> <int> run <i>   run <i> iff the cell differs
//! ```
//!
//! Guards nest: inlining a guarded one-instruction branch into an outer
//! guard chains the conditions. Literal operands of arithmetic assignments
//! go through constant storage (`#CONST#<n>`) because `op` only reads
//! cells; the setup unit fills those.

use std::collections::BTreeMap;

use crate::{
    diagnostics::{Diagnostic, DiagnosticKind, ice},
    ir::{
        Assign, AssignOp, Block, Condition, Expr, ExprKind, FunctionId, IfStatement, Invocation,
        Label, LocalDecl, Program, Statement, StatementKind, TestOp, VarId,
    },
    index::IndexVec,
    lower::FlagTable,
    names::{NameTable, UnitName},
};

pub mod pretty_print;
pub mod unit;

pub use unit::{CompiledUnit, UnitGraph, UnitId};

pub fn emit_units(
    program: &Program,
    names: &mut NameTable,
    flag_tables: &mut BTreeMap<FunctionId, FlagTable>,
    diagnostics: &mut Vec<Diagnostic>,
) -> UnitGraph {
    let mut emitter = UnitEmitter {
        names,
        flag_tables,
        diagnostics,
        units: IndexVec::new(),
        wip: Vec::new(),
        method: None,
        branch_counter: 0,
        goto_unit_names: BTreeMap::new(),
    };

    let mut method_roots = BTreeMap::new();
    for method in &program.methods {
        let root = emitter.emit_method(method);
        method_roots.insert(method.id, root);
    }

    let setup = emitter.emit_setup_unit(program);

    let entry_points = program
        .entry_points
        .iter()
        .map(|id| match method_roots.get(id) {
            Some(root) => *root,
            None => ice!("entry point references a method that was not compiled"),
        })
        .collect();

    UnitGraph {
        units: emitter.units,
        entry_points,
        setup,
    }
}

struct WipUnit {
    unit: CompiledUnit,
    /// Whether this unit is an if/else branch. Root scope means no branch
    /// unit anywhere on the stack; goto-label units do not leave it.
    branch: bool,
}

struct UnitEmitter<'a> {
    names: &'a mut NameTable,
    flag_tables: &'a mut BTreeMap<FunctionId, FlagTable>,
    diagnostics: &'a mut Vec<Diagnostic>,

    /// Sealed units, in completion order.
    units: IndexVec<UnitId, CompiledUnit>,
    /// Units being appended to; the top is the current one.
    wip: Vec<WipUnit>,

    /// Method currently being emitted.
    method: Option<FunctionId>,
    /// Increments in fixed traversal order; with the method identity and a
    /// branch tag it makes unit names deterministic.
    branch_counter: u32,
    /// Unit names already allocated for goto flag ids this method.
    goto_unit_names: BTreeMap<u32, UnitName>,
}

impl UnitEmitter<'_> {
    fn emit_method(&mut self, method: &crate::ir::Method) -> UnitId {
        self.method = Some(method.id);
        self.branch_counter = 0;
        self.goto_unit_names.clear();

        let name = self.names.unit_name(method.id);
        self.wip.push(WipUnit {
            unit: CompiledUnit::new(name),
            branch: false,
        });
        let stack_size = self.wip.len();

        self.handle_statements(&method.body);

        self.pop_wip_until(stack_size);
        let root = self.wip.pop().unwrap();
        // The method's own unit is always part of the graph, even when it
        // came out empty.
        self.units.push(root.unit)
    }

    fn method(&self) -> FunctionId {
        match self.method {
            Some(method) => method,
            None => ice!("emitting outside of a method"),
        }
    }

    /// The statements of one block, with the sibling validation the fully
    /// lowered grammar demands: nothing may follow a statement that
    /// returns on every path.
    fn handle_statements(&mut self, block: &Block) {
        for (index, statement) in block.statements.iter().enumerate() {
            if index > 0 && block.statements[index - 1].fully_returns() {
                self.diagnostics.push(Diagnostic::new(
                    self.current_unit_method_name(),
                    statement.span,
                    DiagnosticKind::StatementAfterReturn,
                ));
            }
            self.handle_statement(statement);
        }
    }

    fn current_unit_method_name(&self) -> UnitName {
        self.names.unit_name(self.method())
    }

    fn handle_statement(&mut self, statement: &Statement) {
        match &statement.kind {
            StatementKind::Labeled(label, inner) => self.handle_goto_label(*label, inner),
            StatementKind::If(if_statement) => self.handle_if_else(if_statement, statement),
            StatementKind::LocalDecl(decl) => self.handle_local_decl(decl, statement),
            StatementKind::Expr(expr) => self.handle_expression(expr),
            StatementKind::Goto(label) => self.handle_goto(*label),
            StatementKind::Assign(assign) => self.handle_assignment(assign),
            StatementKind::Return(value) => self.handle_return(value.as_ref()),
            StatementKind::Block(_) => {
                // Blocks correspond to units at this point; a bare nested
                // one means an earlier stage failed to flatten.
                ice!("nested block reached the code generator")
            }
            StatementKind::While(_)
            | StatementKind::For(_)
            | StatementKind::DoWhile(_)
            | StatementKind::Break
            | StatementKind::Continue => {
                ice!("unlowered control flow reached the code generator")
            }
        }
    }

    /// Compiles `block` into a candidate unit named `reason` and decides
    /// what the call site gets: nothing for an empty unit, the lone
    /// instruction itself for a one-instruction unit (the unit is
    /// discarded unless `store` asks to keep it), or a `call` to the
    /// sealed unit otherwise.
    fn handle_block(&mut self, block: &Block, reason: UnitName, branch: bool, store: bool) -> String {
        self.wip.push(WipUnit {
            unit: CompiledUnit::new(reason),
            branch,
        });
        let stack_size = self.wip.len();

        self.handle_statements(block);

        self.pop_wip_until(stack_size);
        let finished = self.wip.pop().unwrap();

        match finished.unit.code.len() {
            0 => {
                // Goto-label units stay in the graph even when empty;
                // dispatch sites call them by name.
                if store {
                    self.units.push(finished.unit);
                }
                String::new()
            }
            1 => {
                let instruction = finished.unit.code[0].clone();
                if store {
                    self.units.push(finished.unit);
                }
                instruction
            }
            _ => {
                let name = finished.unit.name;
                self.units.push(finished.unit);
                format!("call {name}")
            }
        }
    }

    fn handle_local_decl(&mut self, decl: &LocalDecl, statement: &Statement) {
        if !self.at_root_scope() {
            self.diagnostics.push(Diagnostic::new(
                self.current_unit_method_name(),
                statement.span,
                DiagnosticKind::DeclarationOutsideRootScope,
            ));
        }
        if decl.initializer.is_some() {
            self.diagnostics.push(Diagnostic::new(
                self.current_unit_method_name(),
                statement.span,
                DiagnosticKind::DeclarationWithInitializer,
            ));
        }
        // Declarations reserve no storage by themselves; cells exist the
        // moment they are written.
    }

    fn handle_expression(&mut self, expr: &Expr) {
        if let ExprKind::Invocation(invocation) = &expr.kind {
            self.handle_invocation(invocation);
        }
        // Bare identifiers and literals have no effect and emit nothing.
    }

    fn handle_assignment(&mut self, assign: &Assign) {
        let lhs = self.names.storage_name(assign.target);

        match &assign.value.kind {
            ExprKind::IntLiteral(value) => {
                if assign.op == AssignOp::Assign {
                    self.add_code(format!("set {lhs} {value}"));
                } else {
                    // `op` only reads cells, so the literal operand lives
                    // in constant storage filled by the setup unit.
                    let constant = self.names.constant(*value);
                    self.add_code(format!("op {lhs} {} {constant}", assign.op));
                }
            }
            ExprKind::Identifier(var) => {
                let rhs = self.names.storage_name(*var);
                self.add_code(format!("op {lhs} {} {rhs}", assign.op));
            }
            ExprKind::Invocation(invocation) => {
                self.handle_invocation(invocation);

                // The call left its result in #RET; `#RET = #RET` would be
                // a pointless copy.
                let ret = self.names.ret_var();
                if !(assign.target == ret && assign.op == AssignOp::Assign) {
                    let ret_name = self.names.storage_name(ret);
                    self.add_code(format!("op {lhs} {} {ret_name}", assign.op));
                }
            }
        }
    }

    fn handle_return(&mut self, value: Option<&Expr>) {
        let Some(value) = value else {
            // A bare `return;` stores nothing; reaching the end of the
            // unit is the return.
            return;
        };

        let ret = self.names.ret_var();
        let ret_name = self.names.storage_name(ret);

        match &value.kind {
            ExprKind::IntLiteral(literal) => {
                self.add_code(format!("set {ret_name} {literal}"));
            }
            ExprKind::Identifier(var) => {
                if *var != ret {
                    let rhs = self.names.storage_name(*var);
                    self.add_code(format!("op {ret_name} = {rhs}"));
                }
            }
            ExprKind::Invocation(invocation) => {
                // The callee already leaves its result in #RET.
                self.handle_invocation(invocation);
            }
        }
    }

    fn handle_invocation(&mut self, invocation: &Invocation) {
        let target = self.names.unit_name(invocation.target);

        for (index, arg) in invocation.args.iter().enumerate() {
            let slot = self.names.argument_slot(target, index);
            match &arg.kind {
                ExprKind::IntLiteral(value) => {
                    self.add_code(format!("set {slot} {value}"));
                }
                ExprKind::Identifier(var) => {
                    let rhs = self.names.storage_name(*var);
                    self.add_code(format!("op {slot} = {rhs}"));
                }
                ExprKind::Invocation(_) => {
                    // Nested calls were flattened by the front end; one
                    // surviving here is a user-visible shape error.
                    self.diagnostics.push(Diagnostic::new(
                        self.current_unit_method_name(),
                        arg.span,
                        DiagnosticKind::CallArgumentNotLiteralOrIdentifier,
                    ));
                }
            }
        }

        self.add_code(format!("call {target}"));
    }

    fn handle_if_else(&mut self, if_statement: &IfStatement, statement: &Statement) {
        self.validate_return_symmetry(if_statement, statement);

        let test = match if_statement.condition {
            Condition::Test(test) => test,
            Condition::Always => {
                ice!("constant condition reached the code generator unfolded")
            }
        };

        let then_block = expect_block(&if_statement.then_branch);
        let else_block = if_statement.else_branch.as_ref().map(expect_block);

        let if_name = self.branch_path("if-branch");
        let else_name = else_block
            .as_ref()
            .map(|_| self.branch_path("else-branch"));

        // If the taken branch can overwrite the tested cell, the other
        // branch's guard would re-read a changed value and both branches
        // could run. Snapshot the cell first in that case.
        let mut condition_cell = self.names.storage_name(test.var).to_string();
        if let Some(else_block) = &else_block {
            let ret = self.names.ret_var();
            let writes = then_block
                .statements
                .iter()
                .chain(&else_block.statements)
                .any(|s| writes_var(s, test.var, ret));

            if writes {
                let snapshot = self
                    .names
                    .condition_var(self.method(), self.branch_counter);
                let snapshot_name = self.names.storage_name(snapshot).to_string();
                self.add_code(format!("op {snapshot_name} = {condition_cell}"));
                condition_cell = snapshot_name;
            }
        }

        let then_guard = guard_keyword(test.op);
        let else_guard = guard_keyword(test.op.negated());

        let call = self.handle_block(then_block, if_name, true, false);
        if !call.is_empty() {
            self.add_code(format!(
                "guard-if-{then_guard} {condition_cell} {} run {call}",
                test.value
            ));
        }

        if let Some(else_block) = else_block {
            let call = self.handle_block(else_block, else_name.unwrap(), true, false);
            if !call.is_empty() {
                self.add_code(format!(
                    "guard-if-{else_guard} {condition_cell} {} run {call}",
                    test.value
                ));
            }
        }
    }

    /// The return-tree symmetry rule: once either branch of a conditional
    /// returns, both branches must exist and consist solely of returns —
    /// otherwise one execution path falls out of the branch unit into code
    /// its sibling path skipped.
    fn validate_return_symmetry(&mut self, if_statement: &IfStatement, statement: &Statement) {
        let then_block = expect_block(&if_statement.then_branch);
        let else_block = if_statement.else_branch.as_ref().map(expect_block);

        let then_returns = if_statement.then_branch.contains_return();
        let else_returns = if_statement
            .else_branch
            .as_ref()
            .is_some_and(|e| e.contains_return());

        if !then_returns && !else_returns {
            return;
        }

        let method = self.current_unit_method_name();

        if then_returns && !returns_only(then_block) {
            self.diagnostics.push(Diagnostic::new(
                method,
                if_statement.then_branch.span,
                DiagnosticKind::BranchMustBeReturnOnly,
            ));
        }
        if let Some(else_block) = else_block
            && else_returns
            && !returns_only(else_block)
        {
            self.diagnostics.push(Diagnostic::new(
                method,
                if_statement.else_branch.as_ref().unwrap().span,
                DiagnosticKind::BranchMustBeReturnOnly,
            ));
        }

        if then_returns && !else_returns {
            self.diagnostics.push(Diagnostic::new(
                method,
                statement.span,
                DiagnosticKind::IfNeedsMatchingElse,
            ));
        }
        if else_returns && !then_returns {
            self.diagnostics.push(Diagnostic::new(
                method,
                statement.span,
                DiagnosticKind::ElseNeedsMatchingIf,
            ));
        }
    }

    fn handle_goto(&mut self, label: Label) {
        // The flag lowering guarantees the only gotos left are its own
        // dispatch jumps; turning one into a plain call is now correct.
        let id = self.flag_id(label);
        let name = self.goto_unit_name(id);
        self.add_code(format!("call {name}"));
    }

    fn handle_goto_label(&mut self, label: Label, inner: &Statement) {
        // The method-exit label's content is worthless at this point: every
        // return value was stored before the jump was requested.
        if label == NameTable::method_exit_label() {
            return;
        }

        let block = expect_block(inner);
        let id = self.flag_id(label);
        let name = self.goto_unit_name(id);

        // Labels exist because something jumps to them, so the unit is
        // kept even when it boils down to one (or zero) instructions.
        let call = self.handle_block(block, name, false, true);
        if !call.is_empty() {
            self.add_code(call);
        }
    }

    fn flag_id(&mut self, label: Label) -> u32 {
        let method = self.method();
        self.flag_tables.entry(method).or_default().id(label)
    }

    fn goto_unit_name(&mut self, id: u32) -> UnitName {
        if let Some(name) = self.goto_unit_names.get(&id) {
            return *name;
        }
        let name = self.branch_path(&format!("goto-label-{id}"));
        self.goto_unit_names.insert(id, name);
        name
    }

    fn branch_path(&mut self, tag: &str) -> UnitName {
        let name = self
            .names
            .branch_unit(self.method(), self.branch_counter, tag);
        self.branch_counter += 1;
        name
    }

    fn at_root_scope(&self) -> bool {
        !self.wip.iter().any(|w| w.branch)
    }

    fn add_code(&mut self, code: String) {
        self.wip.last_mut().unwrap().unit.code.push(code);
    }

    fn pop_wip_until(&mut self, size: usize) {
        while self.wip.len() > size {
            let finished = self.wip.pop().unwrap();
            self.units.push(finished.unit);
        }
    }

    /// The setup unit: zeroes every method's flag cell and fills constant
    /// storage. Flags first in method order, then constants ascending, so
    /// the content is deterministic.
    fn emit_setup_unit(&mut self, program: &Program) -> UnitId {
        let mut setup = CompiledUnit::new(NameTable::setup_unit_name());

        for method in &program.methods {
            let has_flags = self
                .flag_tables
                .get(&method.id)
                .is_some_and(|t| !t.is_empty());
            if has_flags {
                let flag = self.names.goto_flag_var(method.id);
                let flag_name = self.names.storage_name(flag);
                setup.code.push(format!("set {flag_name} 0"));
            }
        }

        for (value, name) in self.names.constants().collect::<Vec<_>>() {
            setup.code.push(format!("set {name} {value}"));
        }

        self.units.push(setup)
    }
}

fn expect_block(statement: &Statement) -> &Block {
    match &statement.kind {
        StatementKind::Block(block) => block,
        _ => ice!("branches and labeled statements must be blocks at this stage"),
    }
}

fn guard_keyword(op: TestOp) -> &'static str {
    match op {
        TestOp::Equal => "eq",
        TestOp::NotEqual => "ne",
    }
}

fn returns_only(block: &Block) -> bool {
    !block.statements.is_empty()
        && block
            .statements
            .iter()
            .all(|s| matches!(s.kind, StatementKind::Return(_)))
}

/// Whether `statement`'s subtree can write `var`. Calls only ever write
/// their own method's cells and `#RET`, so a call counts as a write only
/// when `var` is the return cell.
fn writes_var(statement: &Statement, var: VarId, ret: VarId) -> bool {
    match &statement.kind {
        StatementKind::Assign(assign) => {
            assign.target == var
                || (var == ret && matches!(assign.value.kind, ExprKind::Invocation(_)))
        }
        StatementKind::Expr(expr) => {
            var == ret && matches!(expr.kind, ExprKind::Invocation(_))
        }
        StatementKind::Return(_) => var == ret,
        StatementKind::Block(block) => block
            .statements
            .iter()
            .any(|s| writes_var(s, var, ret)),
        StatementKind::If(if_statement) => {
            writes_var(&if_statement.then_branch, var, ret)
                || if_statement
                    .else_branch
                    .as_ref()
                    .is_some_and(|e| writes_var(e, var, ret))
        }
        StatementKind::Labeled(_, inner) => writes_var(inner, var, ret),
        _ => false,
    }
}
