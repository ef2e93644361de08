//! The driver: owns the program and the name table, schedules the
//! requested passes, and runs them with a barrier in between — each pass
//! finishes over every method before the next one starts.
//!
//! User-facing diagnostics accumulate across all methods within a pass so
//! one run surfaces every problem; if any were reported, compilation stops
//! at the pass boundary and produces no artifacts at all. Pipeline
//! invariant violations panic immediately via `ice!` — they are compiler
//! defects and continuing would emit meaningless units.

use std::collections::BTreeMap;

use crate::{
    codegen::{self, UnitGraph},
    diagnostics::{Diagnostic, ice},
    ir::{Block, FunctionId, Program},
    lower::{FlagTable, LoweringContext, blocks, goto_flag, loops, returns, while_to_goto},
    names::NameTable,
    passes::{PassKind, schedule},
};

pub struct Compiler {
    program: Program,
    names: NameTable,
    requested: Vec<PassKind>,
    diagnostics: Vec<Diagnostic>,
    /// Flag id tables per method, written by the goto lowering and read
    /// (and extended, for label-only methods) by the code generator.
    flag_tables: BTreeMap<FunctionId, FlagTable>,
}

#[derive(Debug)]
pub struct CompileFailure {
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileFailure {
    pub fn report(&self) {
        for diagnostic in &self.diagnostics {
            diagnostic.report();
        }
    }
}

impl Compiler {
    pub fn new(program: Program, names: NameTable) -> Self {
        Self::with_passes(program, names, vec![PassKind::EmitUnits])
    }

    /// A compiler with an explicit pass request. Dependencies are closed
    /// over automatically; requesting only the last pass of a chain is the
    /// normal way to use this.
    pub fn with_passes(program: Program, names: NameTable, requested: Vec<PassKind>) -> Self {
        Self {
            program,
            names,
            requested,
            diagnostics: Vec::new(),
            flag_tables: BTreeMap::new(),
        }
    }

    /// Runs the pipeline to completion. Either every method compiled
    /// cleanly and the sealed unit graph comes back, or the accumulated
    /// diagnostics do and no partial output survives.
    pub fn compile(mut self) -> Result<UnitGraph, CompileFailure> {
        let pipeline = schedule(&self.requested);
        let mut graph = None;

        for pass in pipeline {
            self.run_pass(pass, &mut graph);

            if !self.diagnostics.is_empty() {
                return Err(CompileFailure {
                    diagnostics: self.diagnostics,
                });
            }
        }

        match graph {
            Some(graph) => Ok(graph),
            None => ice!("the requested pipeline never emitted units"),
        }
    }

    fn run_pass(&mut self, pass: PassKind, graph: &mut Option<UnitGraph>) {
        match pass {
            PassKind::GuaranteeBlocks | PassKind::RestoreBlockShape => {
                self.rewrite_bodies(|body, _, _, _| blocks::guarantee_blocks(body));
            }
            PassKind::ForToWhile => {
                self.rewrite_bodies(|body, _, _, _| loops::lower_for_loops(body));
            }
            PassKind::DoWhileToWhile => {
                self.rewrite_bodies(|body, _, _, _| loops::lower_do_while_loops(body));
            }
            PassKind::WhileToGoto => {
                self.rewrite_bodies(|body, _, _, _| {
                    let mut ctx = LoweringContext::new();
                    while_to_goto::lower_while_loops(body, &mut ctx)
                });
            }
            PassKind::FoldConstantConditions => {
                self.rewrite_bodies(|body, _, _, _| blocks::fold_constant_conditions(body));
            }
            PassKind::LowerLoops => {
                // Grouping pass; its dependencies already did the work.
            }
            PassKind::LowerReturns => {
                self.rewrite_bodies(|body, method, names, diagnostics| {
                    let unit = names.unit_name(method);
                    returns::lower_returns(body, unit, names, diagnostics)
                });
            }
            PassKind::FlagifyGotos => {
                let mut tables = Vec::new();
                self.rewrite_bodies(|body, method, names, _| {
                    let mut table = FlagTable::default();
                    let body = goto_flag::flagify_method(body, method, names, &mut table);
                    if !table.is_empty() {
                        tables.push((method, table));
                    }
                    body
                });
                self.flag_tables.extend(tables);
            }
            PassKind::EmitUnits => {
                *graph = Some(codegen::emit_units(
                    &self.program,
                    &mut self.names,
                    &mut self.flag_tables,
                    &mut self.diagnostics,
                ));
            }
        }
    }

    /// Applies one rewriting pass to every method, in program order.
    fn rewrite_bodies(
        &mut self,
        mut rewrite: impl FnMut(Block, FunctionId, &mut NameTable, &mut Vec<Diagnostic>) -> Block,
    ) {
        for method in &mut self.program.methods {
            let body = std::mem::replace(&mut method.body, Block::empty(method.span));
            method.body = rewrite(body, method.id, &mut self.names, &mut self.diagnostics);
        }
    }
}
