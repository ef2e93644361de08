//! Code generator properties: the one-instruction inlining threshold,
//! deterministic naming, validation diagnostics, and the setup unit.

mod common;

use common::{compile_method, compile_method_to_text};
use indoc::indoc;
use rillc::{
    DiagnosticKind,
    ir::{AssignOp, build},
    pretty_print,
};

#[test]
fn one_instruction_branches_are_inlined() {
    let graph = compile_method("cg.inline", |names, m| {
        let i = names.register_var(m, "i");
        let x = names.register_var(m, "x");
        vec![
            build::local(x),
            build::if_then(build::nonzero(i), vec![build::assign(x, build::lit(1))]),
        ]
    })
    .expect("compiles");

    // No separate unit for the branch; the parent holds one guarded
    // instruction.
    assert!(graph.unit_named("cg.inline-0-if-branch").is_none());
    let root = graph.unit_named("cg.inline").unwrap();
    assert_eq!(
        root.code,
        vec!["guard-if-ne #cg.inline#i 0 run set #cg.inline#x 1"]
    );
}

#[test]
fn two_instruction_branches_become_called_units() {
    let graph = compile_method("cg.called", |names, m| {
        let i = names.register_var(m, "i");
        let x = names.register_var(m, "x");
        vec![
            build::local(x),
            build::if_then(
                build::nonzero(i),
                vec![
                    build::assign(x, build::lit(1)),
                    build::assign(x, build::lit(2)),
                ],
            ),
        ]
    })
    .expect("compiles");

    let branch = graph.unit_named("cg.called-0-if-branch").unwrap();
    assert_eq!(
        branch.code,
        vec!["set #cg.called#x 1", "set #cg.called#x 2"]
    );

    let root = graph.unit_named("cg.called").unwrap();
    assert_eq!(
        root.code,
        vec!["guard-if-ne #cg.called#i 0 run call cg.called-0-if-branch"]
    );

    // Exactly one call site references the branch unit.
    let callers = graph
        .units
        .iter()
        .flat_map(|u| u.code.iter())
        .filter(|c| c.contains("call cg.called-0-if-branch"))
        .count();
    assert_eq!(callers, 1);
}

#[test]
fn compilation_is_deterministic() {
    let build_body = |names: &mut rillc::NameTable, m| {
        let i = names.register_var(m, "i");
        let x = names.register_var(m, "x");
        vec![
            build::local(x),
            build::for_loop(
                vec![build::assign(i, build::lit(5))],
                build::nonzero(i),
                vec![build::compound(i, AssignOp::Subtract, build::lit(1))],
                vec![build::compound(x, AssignOp::Add, build::lit(2))],
            ),
            build::ret(Some(build::ident(x))),
        ]
    };

    let first = compile_method_to_text("cg.determinism", build_body);
    let second = compile_method_to_text("cg.determinism", build_body);

    assert_eq!(first, second);
}

#[test]
fn whole_method_renders_as_expected() {
    let text = compile_method_to_text("cg.snapshot", |names, m| {
        let x = names.register_var(m, "x");
        vec![
            build::local(x),
            build::assign(x, build::lit(1)),
            build::if_then(
                build::nonzero(x),
                vec![
                    build::assign(x, build::lit(2)),
                    build::assign(x, build::lit(3)),
                ],
            ),
            build::ret(Some(build::ident(x))),
        ]
    });

    assert_eq!(
        text,
        indoc! {"
            unit cg.snapshot-0-if-branch:
                set #cg.snapshot#x 2
                set #cg.snapshot#x 3

            unit cg.snapshot:
                set #cg.snapshot#x 1
                guard-if-ne #cg.snapshot#x 0 run call cg.snapshot-0-if-branch
                op #RET = #cg.snapshot#x

            unit internal/setup:
                (empty)"}
    );
}

#[test]
fn returning_if_without_matching_else_is_rejected() {
    let failure = compile_method("cg.retneedselse", |names, m| {
        let i = names.register_var(m, "i");
        let x = names.register_var(m, "x");
        vec![
            build::local(x),
            build::if_then_else(
                build::nonzero(i),
                vec![build::ret(Some(build::lit(1)))],
                vec![build::assign(x, build::lit(1))],
            ),
        ]
    })
    .expect_err("must fail");

    assert!(
        failure
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::IfNeedsMatchingElse)
    );
}

#[test]
fn returning_if_without_any_else_is_rejected() {
    let failure = compile_method("cg.noelse", |names, m| {
        let i = names.register_var(m, "i");
        vec![build::if_then(
            build::nonzero(i),
            vec![build::ret(Some(build::lit(1)))],
        )]
    })
    .expect_err("must fail");

    assert!(
        failure
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::IfNeedsMatchingElse)
    );
}

#[test]
fn returning_else_requires_returning_if() {
    let failure = compile_method("cg.elseneedsif", |names, m| {
        let i = names.register_var(m, "i");
        let x = names.register_var(m, "x");
        vec![
            build::local(x),
            build::if_then_else(
                build::nonzero(i),
                vec![build::assign(x, build::lit(1))],
                vec![build::ret(Some(build::lit(2)))],
            ),
        ]
    })
    .expect_err("must fail");

    assert!(
        failure
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::ElseNeedsMatchingIf)
    );
}

#[test]
fn mixed_return_branches_must_be_return_only() {
    let failure = compile_method("cg.mixedbranch", |names, m| {
        let i = names.register_var(m, "i");
        let x = names.register_var(m, "x");
        vec![
            build::local(x),
            build::if_then_else(
                build::nonzero(i),
                vec![
                    build::assign(x, build::lit(1)),
                    build::ret(Some(build::lit(1))),
                ],
                vec![build::ret(Some(build::lit(2)))],
            ),
        ]
    })
    .expect_err("must fail");

    assert!(
        failure
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::BranchMustBeReturnOnly)
    );
}

#[test]
fn statements_after_returns_are_rejected() {
    let failure = compile_method("cg.afterret", |names, m| {
        let x = names.register_var(m, "x");
        vec![
            build::local(x),
            build::ret(Some(build::lit(1))),
            build::assign(x, build::lit(2)),
        ]
    })
    .expect_err("must fail");

    assert!(
        failure
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::StatementAfterReturn)
    );
}

#[test]
fn declarations_outside_root_scope_are_rejected() {
    let failure = compile_method("cg.nestdecl", |names, m| {
        let i = names.register_var(m, "i");
        let x = names.register_var(m, "x");
        vec![build::if_then(
            build::nonzero(i),
            vec![
                build::local(x),
                build::assign(x, build::lit(1)),
                build::assign(x, build::lit(2)),
            ],
        )]
    })
    .expect_err("must fail");

    assert!(
        failure
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::DeclarationOutsideRootScope)
    );
}

#[test]
fn declarations_with_initializers_are_rejected() {
    let failure = compile_method("cg.initdecl", |names, m| {
        let x = names.register_var(m, "x");
        vec![build::local_with_initializer(x, build::lit(3))]
    })
    .expect_err("must fail");

    assert!(
        failure
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::DeclarationWithInitializer)
    );
}

#[test]
fn nested_call_arguments_are_rejected() {
    let mut names = rillc::NameTable::new();
    let callee = names.register_method("cg.args.callee");
    let caller = names.register_method("cg.args.caller");
    let i = names.register_var(caller, "i");

    let program = build::program(
        vec![
            build::method(callee, vec![], vec![]),
            build::method(
                caller,
                vec![],
                vec![build::call_stmt(
                    callee,
                    vec![build::invoke(callee, vec![build::ident(i)])],
                )],
            ),
        ],
        vec![caller],
    );

    let failure = rillc::Compiler::new(program, names)
        .compile()
        .expect_err("must fail");

    assert!(
        failure
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::CallArgumentNotLiteralOrIdentifier)
    );
}

#[test]
fn calls_copy_arguments_into_parameter_slots() {
    let mut names = rillc::NameTable::new();
    let callee = names.register_method("cg.copy.callee");
    let a = names.register_param(callee, 0);
    let caller = names.register_method("cg.copy.caller");
    let i = names.register_var(caller, "i");

    let program = build::program(
        vec![
            build::method(
                callee,
                vec![a],
                vec![build::ret(Some(build::ident(a)))],
            ),
            build::method(
                caller,
                vec![],
                vec![build::call_stmt(callee, vec![build::ident(i)])],
            ),
        ],
        vec![caller],
    );

    let graph = rillc::Compiler::new(program, names)
        .compile()
        .expect("compiles");

    let caller_unit = graph.unit_named("cg.copy.caller").unwrap();
    assert_eq!(
        caller_unit.code,
        vec![
            "op #cg.copy.callee##arg0 = #cg.copy.caller#i",
            "call cg.copy.callee",
        ]
    );
}

#[test]
fn setup_unit_initializes_flags_and_constants() {
    let graph = compile_method("cg.setup", |names, m| {
        let i = names.register_var(m, "i");
        vec![
            build::while_loop(
                build::nonzero(i),
                vec![build::compound(i, AssignOp::Subtract, build::lit(7))],
            ),
        ]
    })
    .expect("compiles");

    let setup = graph.units.get(graph.setup).unwrap();
    assert_eq!(setup.name.value(), "internal/setup");
    assert_eq!(
        setup.code,
        vec!["set #cg.setup##gotoflag 0", "set #CONST#7 7"]
    );
}

#[test]
fn entry_points_reference_method_root_units() {
    let graph = compile_method("cg.entry", |names, m| {
        let x = names.register_var(m, "x");
        vec![build::local(x), build::assign(x, build::lit(1))]
    })
    .expect("compiles");

    assert_eq!(graph.entry_points.len(), 1);
    let entry = graph.units.get(graph.entry_points[0]).unwrap();
    assert_eq!(entry.name.value(), "cg.entry");
}

#[test]
fn failed_compilations_produce_no_units() {
    // The Err carries only diagnostics; the graph type is never returned,
    // so "zero output artifacts" holds by construction. Make sure the
    // plain renderer is reachable only through a successful graph.
    let result = compile_method("cg.nounits", |names, m| {
        let x = names.register_var(m, "x");
        vec![
            build::ret(Some(build::lit(1))),
            build::assign(x, build::lit(2)),
        ]
    });

    match result {
        Err(failure) => assert!(!failure.diagnostics.is_empty()),
        Ok(graph) => panic!(
            "expected failure, got units:\n{}",
            pretty_print::render_plain(&graph)
        ),
    }
}
