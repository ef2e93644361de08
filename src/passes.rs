//! The lowering pass vocabulary and the dependency scheduler.
//!
//! Passes declare their prerequisites as data; the scheduler turns a
//! requested list into a complete, dependency-closed pipeline. Requesting
//! just [`PassKind::EmitUnits`] therefore yields the whole standard
//! pipeline.

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum PassKind {
    /// Wrap branches, loop bodies, and labeled statements in blocks.
    GuaranteeBlocks,
    /// `for` -> `while`, with `continue` picking up the update statements.
    ForToWhile,
    /// `do { .. } while (c)` -> `while (true) { ..; if (c) continue else break; }`.
    DoWhileToWhile,
    /// `while` -> labeled conditional goto in canonical form.
    WhileToGoto,
    /// Collapse the `if (true)` wrappers the do-while lowering leaves.
    FoldConstantConditions,
    /// Re-establish block shape after the while lowering; same
    /// implementation as [`GuaranteeBlocks`](Self::GuaranteeBlocks), but
    /// the scheduler keeps at most one instance per kind, so the second
    /// run needs its own kind.
    RestoreBlockShape,
    /// Grouping pass for the complete loop elimination; runs nothing
    /// itself, its ordered dependencies do the work.
    LowerLoops,
    /// In methods that jump, rewrite returns into `#RET` stores plus
    /// gotos to the method-exit label.
    LowerReturns,
    /// Replace gotos with the flag protocol.
    FlagifyGotos,
    /// Generate the final unit graph.
    EmitUnits,
}

impl PassKind {
    /// Declared prerequisites, in the order they must run. The tables are
    /// static and acyclic; a cycle would make [`schedule`] loop forever.
    pub fn dependencies(self) -> &'static [PassKind] {
        match self {
            PassKind::GuaranteeBlocks => &[],
            PassKind::ForToWhile => &[PassKind::GuaranteeBlocks],
            PassKind::DoWhileToWhile => &[PassKind::GuaranteeBlocks],
            PassKind::WhileToGoto => &[PassKind::GuaranteeBlocks],
            PassKind::FoldConstantConditions => &[],
            PassKind::RestoreBlockShape => &[],
            PassKind::LowerLoops => &[
                PassKind::GuaranteeBlocks,
                PassKind::ForToWhile,
                PassKind::DoWhileToWhile,
                PassKind::WhileToGoto,
                PassKind::FoldConstantConditions,
                PassKind::RestoreBlockShape,
            ],
            PassKind::LowerReturns => &[PassKind::GuaranteeBlocks, PassKind::LowerLoops],
            PassKind::FlagifyGotos => &[
                PassKind::GuaranteeBlocks,
                PassKind::LowerLoops,
                PassKind::LowerReturns,
            ],
            PassKind::EmitUnits => &[
                PassKind::LowerLoops,
                PassKind::LowerReturns,
                PassKind::FlagifyGotos,
            ],
        }
    }
}

/// Expands `requested` into a full pipeline: every requested pass, every
/// transitive dependency, each kind at most once, and every dependency
/// strictly before its dependent.
///
/// Missing dependencies are inserted immediately before their dependent; a
/// dependency that is already scheduled but *after* its dependent is moved
/// ahead, and its own dependencies are re-examined. A dependency cycle
/// makes that re-examination ping-pong forever — cycles are a build-time
/// contract violation to rule out when declaring the tables, not a
/// runtime condition to detect.
pub fn schedule(requested: &[PassKind]) -> Vec<PassKind> {
    let mut scheduled: Vec<PassKind> = Vec::new();
    for pass in requested {
        if !scheduled.contains(pass) {
            scheduled.push(*pass);
        }
    }

    let mut queue: VecDeque<PassKind> = scheduled.iter().copied().collect();

    while let Some(pass) = queue.pop_front() {
        for &dependency in pass.dependencies() {
            let pass_index = scheduled
                .iter()
                .position(|p| *p == pass)
                .expect("every queued pass stays scheduled");

            match scheduled.iter().position(|p| *p == dependency) {
                Some(dependency_index) if dependency_index < pass_index => {}
                Some(dependency_index) => {
                    // Scheduled too late; move it ahead of its dependent
                    // and let its own dependencies catch up.
                    scheduled.remove(dependency_index);
                    let pass_index = scheduled
                        .iter()
                        .position(|p| *p == pass)
                        .expect("dependent is still scheduled");
                    scheduled.insert(pass_index, dependency);
                    queue.push_back(dependency);
                }
                None => {
                    scheduled.insert(pass_index, dependency);
                    queue.push_back(dependency);
                }
            }
        }
    }

    scheduled
}
