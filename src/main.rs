use clap::Parser as ClapParser;

use rillc::{
    Compiler, NameTable,
    ir::{AssignOp, Program, build},
    pretty_print,
};

#[derive(Debug, ClapParser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Print the unit graph without colors
    #[arg(long)]
    plain: bool,
}

fn main() {
    let args = Args::parse();

    let (program, names) = demo_program();

    match Compiler::new(program, names).compile() {
        Ok(graph) => {
            if args.plain {
                println!("{}", pretty_print::render_plain(&graph));
            } else {
                pretty_print::pretty_print_units(&graph);
            }
        }
        Err(failure) => {
            failure.report();
            std::process::exit(1);
        }
    }
}

/// A small built-in program exercising the interesting paths: a for loop,
/// a while loop with a break, calls with argument copying, and returns.
/// Front ends construct their input exactly like this, via [`build`].
fn demo_program() -> (Program, NameTable) {
    let mut names = NameTable::new();

    let double = names.register_method("demo/double");
    let x = names.register_param(double, 0);
    let r = names.register_var(double, "r");
    let double_method = build::method(
        double,
        vec![x],
        vec![
            build::local(r),
            build::assign(r, build::ident(x)),
            build::compound(r, AssignOp::Add, build::ident(x)),
            build::ret(Some(build::ident(r))),
        ],
    );

    let main_fn = names.register_method("demo/main");
    let acc = names.register_var(main_fn, "acc");
    let i = names.register_var(main_fn, "i");
    let main_method = build::method(
        main_fn,
        vec![],
        vec![
            build::local(acc),
            build::local(i),
            build::assign(acc, build::lit(0)),
            // for (i = 3; i != 0; i -= 1) { acc += demo/double(i); }
            build::for_loop(
                vec![build::assign(i, build::lit(3))],
                build::nonzero(i),
                vec![build::compound(i, AssignOp::Subtract, build::lit(1))],
                vec![build::compound(
                    acc,
                    AssignOp::Add,
                    build::invoke(double, vec![build::ident(i)]),
                )],
            ),
            // while (acc != 0) { acc -= 10; if (acc != 0) { break; } }
            build::while_loop(
                build::nonzero(acc),
                vec![
                    build::compound(acc, AssignOp::Subtract, build::lit(10)),
                    build::if_then(build::nonzero(acc), vec![build::brk()]),
                ],
            ),
            build::ret(Some(build::ident(acc))),
        ],
    );

    let program = build::program(vec![double_method, main_method], vec![main_fn]);
    (program, names)
}
