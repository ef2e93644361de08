//! Backend of a source-to-target compiler whose target has no call stack,
//! no registers, and exactly one control-transfer primitive: invoking a
//! named unit of straight-line instructions.
//!
//! The front end (parsing, resolution, desugaring, typing) lives outside
//! this crate and hands over a restricted imperative tree (see
//! [`ir`]). The pipeline here rewrites loops into labeled gotos, gotos
//! into a per-method flag protocol that simulates jumps under the
//! call-only model, and finally emits the unit call graph; the pass
//! scheduler ([`passes`]) closes the requested passes over their declared
//! dependencies and orders them.

pub mod codegen;
pub mod compiler;
pub mod diagnostics;
pub mod index;
pub mod intern;
pub mod ir;
pub mod lower;
pub mod names;
pub mod passes;

pub use codegen::{CompiledUnit, UnitGraph, UnitId, pretty_print};
pub use compiler::{CompileFailure, Compiler};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use names::NameTable;
pub use passes::PassKind;
