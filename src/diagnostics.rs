//! User-facing structural diagnostics, and the fatal channel for pipeline
//! defects.
//!
//! The split matters: a [`Diagnostic`] means the *user's* program has a
//! shape the target model cannot express, is collected across all methods,
//! and is reported in one batch. The [`ice!`] macro is for trees that an
//! earlier pass was contractually obligated to have rewritten — reaching
//! one is a compiler defect and aborts immediately.

use colored::Colorize;

use crate::{intern::InternedSymbol, ir::Span};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Unit name of the method the problem was found in.
    pub method: InternedSymbol,
    pub span: Span,
    pub kind: DiagnosticKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A (conditional) return must be the last thing its block does.
    StatementAfterReturn,
    /// In a nested scope, a branch that returns may contain nothing but
    /// that return.
    BranchMustBeReturnOnly,
    /// The if-branch returns, so an else-branch that also returns is
    /// required.
    IfNeedsMatchingElse,
    /// The else-branch returns, so the if-branch must too.
    ElseNeedsMatchingIf,
    /// Locals may only be declared in the method's outermost block.
    DeclarationOutsideRootScope,
    /// Declarations carry no initializer; initialization is a separate,
    /// already-lowered assignment.
    DeclarationWithInitializer,
    /// Call arguments must be integer literals or identifiers.
    CallArgumentNotLiteralOrIdentifier,
}

impl Diagnostic {
    pub fn new(method: InternedSymbol, span: Span, kind: DiagnosticKind) -> Self {
        Self { method, span, kind }
    }

    pub fn message(&self) -> &'static str {
        match self.kind {
            DiagnosticKind::StatementAfterReturn => {
                "no statement may follow a (conditional) return in the same block"
            }
            DiagnosticKind::BranchMustBeReturnOnly => {
                "a returning branch of a nested conditional must consist of a single return"
            }
            DiagnosticKind::IfNeedsMatchingElse => {
                "if-branch returns, so it needs a matching else-branch that also returns"
            }
            DiagnosticKind::ElseNeedsMatchingIf => {
                "else-branch returns, so the if-branch must also return"
            }
            DiagnosticKind::DeclarationOutsideRootScope => {
                "declarations must be in the method's root scope"
            }
            DiagnosticKind::DeclarationWithInitializer => {
                "declarations may not have initializers"
            }
            DiagnosticKind::CallArgumentNotLiteralOrIdentifier => {
                "call arguments must be integer literals or identifiers"
            }
        }
    }

    /// Renders the diagnostic to stderr the way the front end renders its
    /// own: a red `error:` marker, the message, and the origin. Byte
    /// offsets stand in for line/column since the source text lives with
    /// the front-end collaborator.
    pub fn report(&self) {
        eprintln!(
            "{}: {} {}",
            "error".red(),
            self.message(),
            format!(
                "(in `{}` at bytes {}..{})",
                self.method, self.span.start, self.span.end
            )
            .white()
        );
    }
}

/// Internal compiler error: an invariant an earlier pass was supposed to
/// establish does not hold. Never represents a user mistake.
macro_rules! ice {
    ($($arg:tt)*) => {
        panic!("internal compiler error: {}", format_args!($($arg)*))
    };
}

pub(crate) use ice;
