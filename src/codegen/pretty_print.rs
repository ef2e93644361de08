use colored::Colorize;
use itertools::Itertools;

use super::unit::UnitGraph;

/// Renders the whole graph as plain text, one unit per paragraph, in seal
/// order. This is the canonical textual form: identical programs must
/// render identically, which is what the equivalence tests compare.
pub fn render_plain(graph: &UnitGraph) -> String {
    graph
        .units
        .iter()
        .map(|unit| {
            let body = if unit.code.is_empty() {
                "    (empty)".to_owned()
            } else {
                unit.code.iter().map(|c| format!("    {c}")).join("\n")
            };
            format!("unit {}:\n{}", unit.name, body)
        })
        .join("\n\n")
}

/// Prints the graph to stdout with a little color, for humans.
pub fn pretty_print_units(graph: &UnitGraph) {
    for (id, unit) in graph.units.enumerate() {
        let marker = if id == graph.setup {
            " (setup)"
        } else if graph.entry_points.contains(&id) {
            " (entry)"
        } else {
            ""
        };

        println!(
            "{} {}{}",
            "unit".magenta(),
            unit.name.value().blue(),
            marker.yellow()
        );

        if unit.code.is_empty() {
            println!("    {}", "(empty)".white().dimmed());
        }
        for instruction in &unit.code {
            let highlighted = match instruction.split_whitespace().next() {
                Some(keyword @ ("set" | "op" | "call")) => format!(
                    "{} {}",
                    keyword.cyan(),
                    &instruction[keyword.len() + 1..]
                ),
                Some(keyword) if keyword.starts_with("guard-if-") => format!(
                    "{} {}",
                    keyword.green(),
                    &instruction[keyword.len() + 1..]
                ),
                _ => instruction.clone(),
            };
            println!("    {highlighted}");
        }

        println!();
    }
}
