//! Tree-to-tree lowering passes: block-shape guarantees, loop elimination,
//! return rewriting, and the goto-to-flag protocol. Everything here runs
//! per method with a fresh [`LoweringContext`]; no counter or table
//! survives from one method to the next.

use hashbrown::HashMap;

use crate::{
    diagnostics::ice,
    intern::InternedSymbol,
    ir::Label,
};

pub mod blocks;
pub mod goto_flag;
pub mod loops;
pub mod returns;
pub mod scope;
pub mod while_to_goto;

/// Per-method lowering state. Created fresh at method entry so label
/// numbering never leaks between methods, which keeps unit naming a pure
/// function of the input. The flag lowering's per-method [`FlagTable`]
/// plays the same role and outlives its pass so the code generator can
/// name goto-label units by flag id.
#[derive(Debug, Default)]
pub struct LoweringContext {
    next_loop_label: u32,
}

impl LoweringContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh `(start, break)` label pair for one loop.
    pub fn fresh_loop_labels(&mut self) -> (Label, Label) {
        let n = self.next_loop_label;
        self.next_loop_label += 1;
        (
            InternedSymbol::new(&format!("whilestart{n}")),
            InternedSymbol::new(&format!("whilebreak{n}")),
        )
    }
}

/// The correspondence `goto label <-> positive flag id` for one method.
/// Id 0 is reserved for "no jump pending"; ids are assigned on first
/// encounter, so they are a function of traversal order and nothing else.
#[derive(Debug, Default, Clone)]
pub struct FlagTable {
    /// Label for id `i` at position `i - 1`
    labels: Vec<Label>,
    ids: HashMap<Label, u32>,
}

impl FlagTable {
    /// The id for `label`, assigning the next free one if it has none yet.
    pub fn id(&mut self, label: Label) -> u32 {
        if let Some(id) = self.ids.get(&label) {
            return *id;
        }

        // +1 as 0 represents "none"
        let id = self.labels.len() as u32 + 1;
        self.labels.push(label);
        self.ids.insert(label, id);
        id
    }

    pub fn existing_id(&self, label: Label) -> Option<u32> {
        self.ids.get(&label).copied()
    }

    pub fn label(&self, id: u32) -> Label {
        match id
            .checked_sub(1)
            .and_then(|i| self.labels.get(i as usize))
        {
            Some(label) => *label,
            None => ice!("flag id {id} has no label assigned"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
