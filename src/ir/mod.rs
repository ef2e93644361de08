//! The restricted imperative tree consumed and rewritten by the lowering
//! pipeline. The front end hands us a validated program in this form; every
//! pass produces a new tree rather than mutating in place, and the code
//! generator consumes the final, fully lowered shape.

use crate::intern::InternedSymbol;

pub mod build;

/// A byte range in the original source, carried through every rewrite so
/// diagnostics can point at user code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Used for nodes the compiler synthesizes with no better origin.
    pub const SYNTHETIC: Self = Self { start: 0, end: 0 };

    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Opaque handle for a method, assigned by the [`NameTable`](crate::names::NameTable).
/// Equality is identity, never structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionId(u32);

impl FunctionId {
    pub(crate) fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// Opaque handle for a variable (method local, parameter, or a storage cell
/// the compiler synthesizes), assigned by the [`NameTable`](crate::names::NameTable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(u32);

impl VarId {
    pub(crate) fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// Goto labels are plain interned strings; they never appear in the output,
/// only flag ids derived from them do.
pub type Label = InternedSymbol;

#[derive(Debug)]
pub struct Program {
    pub methods: Vec<Method>,
    /// Methods designated externally invokable. Seeds the output's entry
    /// units; every method in `methods` is compiled regardless.
    pub entry_points: Vec<FunctionId>,
}

#[derive(Debug)]
pub struct Method {
    pub id: FunctionId,
    pub params: Vec<VarId>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub span: Span,
    pub statements: Vec<Statement>,
}

impl Block {
    pub fn new(span: Span, statements: Vec<Statement>) -> Self {
        Self { span, statements }
    }

    pub fn empty(span: Span) -> Self {
        Self {
            span,
            statements: Vec::new(),
        }
    }

    /// Splices directly nested blocks into this one, recursively. Nested
    /// blocks are scope-inert in this tree and must not leak between
    /// passes: the goto lowering reasons about "the scope" as the nearest
    /// enclosing block.
    pub fn flattened(self) -> Block {
        let mut statements = Vec::with_capacity(self.statements.len());

        for statement in self.statements {
            match statement.kind {
                StatementKind::Block(inner) => {
                    statements.extend(inner.flattened().statements);
                }
                _ => statements.push(statement),
            }
        }

        Block {
            span: self.span,
            statements,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub span: Span,
    pub kind: StatementKind,
}

impl Statement {
    pub fn new(span: Span, kind: StatementKind) -> Self {
        Self { span, kind }
    }

    /// Whether executing this statement always leaves the enclosing block
    /// without falling through to the next sibling. Loop statements never
    /// count: their lowering decides their exits.
    pub fn transfers_control(&self) -> bool {
        match &self.kind {
            StatementKind::Goto(_)
            | StatementKind::Break
            | StatementKind::Continue
            | StatementKind::Return(_) => true,
            StatementKind::Block(block) => block
                .statements
                .last()
                .is_some_and(Statement::transfers_control),
            StatementKind::If(if_statement) => {
                if_statement.then_branch.transfers_control()
                    && if_statement
                        .else_branch
                        .as_ref()
                        .is_some_and(Statement::transfers_control)
            }
            StatementKind::Labeled(_, inner) => inner.transfers_control(),
            StatementKind::While(_)
            | StatementKind::For(_)
            | StatementKind::DoWhile(_)
            | StatementKind::Assign(_)
            | StatementKind::LocalDecl(_)
            | StatementKind::Expr(_) => false,
        }
    }

    /// Whether this statement returns on every path through it.
    pub fn fully_returns(&self) -> bool {
        match &self.kind {
            StatementKind::Return(_) => true,
            StatementKind::If(if_statement) => {
                if_statement.then_branch.fully_returns()
                    && if_statement
                        .else_branch
                        .as_ref()
                        .is_some_and(Statement::fully_returns)
            }
            StatementKind::Block(block) => block
                .statements
                .last()
                .is_some_and(Statement::fully_returns),
            StatementKind::Labeled(_, inner) => inner.fully_returns(),
            _ => false,
        }
    }

    /// Whether this subtree mentions a return statement anywhere.
    pub fn contains_return(&self) -> bool {
        match &self.kind {
            StatementKind::Return(_) => true,
            StatementKind::Block(block) => {
                block.statements.iter().any(Statement::contains_return)
            }
            StatementKind::If(if_statement) => {
                if_statement.then_branch.contains_return()
                    || if_statement
                        .else_branch
                        .as_ref()
                        .is_some_and(Statement::contains_return)
            }
            StatementKind::While(while_loop) => while_loop.body.contains_return(),
            StatementKind::For(for_loop) => for_loop.body.contains_return(),
            StatementKind::DoWhile(do_while) => do_while.body.contains_return(),
            StatementKind::Labeled(_, inner) => inner.contains_return(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum StatementKind {
    Block(Block),
    If(Box<IfStatement>),
    While(Box<WhileLoop>),
    For(Box<ForLoop>),
    DoWhile(Box<DoWhileLoop>),
    Goto(Label),
    Labeled(Label, Box<Statement>),
    Break,
    Continue,
    Return(Option<Expr>),
    Assign(Box<Assign>),
    LocalDecl(Box<LocalDecl>),
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub struct IfStatement {
    pub condition: Condition,
    pub then_branch: Statement,
    pub else_branch: Option<Statement>,
}

#[derive(Debug, Clone)]
pub struct WhileLoop {
    pub condition: Condition,
    pub body: Statement,
}

#[derive(Debug, Clone)]
pub struct ForLoop {
    /// Assignments or expression statements only; declarations are hoisted
    /// to the method root by the front end before this core runs.
    pub initializers: Vec<Statement>,
    pub condition: Condition,
    pub incrementors: Vec<Statement>,
    pub body: Statement,
}

#[derive(Debug, Clone)]
pub struct DoWhileLoop {
    pub body: Statement,
    pub condition: Condition,
}

#[derive(Debug, Clone)]
pub struct Assign {
    pub target: VarId,
    pub op: AssignOp,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub struct LocalDecl {
    pub var: VarId,
    pub ty: Ty,
    /// Never legal; carried so the "declarations may not have
    /// initializers" diagnostic can point at the offending expression.
    pub initializer: Option<Expr>,
}

/// The target model stores every scalar as an integer cell; aggregate
/// lowering happens upstream of this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ty {
    Int,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum AssignOp {
    #[strum(serialize = "=")]
    Assign,
    #[strum(serialize = "+=")]
    Add,
    #[strum(serialize = "-=")]
    Subtract,
    #[strum(serialize = "*=")]
    Multiply,
    #[strum(serialize = "/=")]
    Divide,
    #[strum(serialize = "%=")]
    Modulus,
}

/// Branch conditions are a closed form, not general expressions: after the
/// front end has run, the only tests left are an identifier compared
/// against an integer literal, plus the transient `true` produced by the
/// do-while lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// `while (true)`; folded away before the goto lowering ever runs.
    Always,
    Test(Test),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Test {
    pub var: VarId,
    pub op: TestOp,
    pub value: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum TestOp {
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = "!=")]
    NotEqual,
}

impl TestOp {
    pub fn negated(self) -> Self {
        match self {
            TestOp::Equal => TestOp::NotEqual,
            TestOp::NotEqual => TestOp::Equal,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Identifier(VarId),
    IntLiteral(i32),
    Invocation(Box<Invocation>),
}

#[derive(Debug, Clone)]
pub struct Invocation {
    pub target: FunctionId,
    pub args: Vec<Expr>,
}
