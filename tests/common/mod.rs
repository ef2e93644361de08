use rillc::{
    CompileFailure, Compiler, NameTable, UnitGraph,
    ir::{FunctionId, Statement},
    pretty_print,
};

/// Compiles a single parameterless method built by `body` and returns the
/// plain rendering of the resulting unit graph.
///
/// The method is registered under `name` so two calls with the same name
/// (and fresh tables) produce comparable storage and unit names.
pub fn compile_method_to_text(
    name: &str,
    body: impl FnOnce(&mut NameTable, FunctionId) -> Vec<Statement>,
) -> String {
    let graph = compile_method(name, body).expect("compilation should succeed");
    pretty_print::render_plain(&graph)
}

pub fn compile_method(
    name: &str,
    body: impl FnOnce(&mut NameTable, FunctionId) -> Vec<Statement>,
) -> Result<UnitGraph, CompileFailure> {
    let mut names = NameTable::new();
    let method = names.register_method(name);
    let statements = body(&mut names, method);

    let program = rillc::ir::build::program(
        vec![rillc::ir::build::method(method, vec![], statements)],
        vec![method],
    );

    Compiler::new(program, names).compile()
}
