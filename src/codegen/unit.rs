//! The output model: named units of straight-line instructions forming a
//! call graph. A unit is append-only while it sits on the emitter's
//! work-in-progress stack and sealed the moment it is moved into the
//! graph; nothing ever revisits a sealed unit.

use crate::{
    index::{IndexVec, simple_index},
    names::UnitName,
};

simple_index! {
    /// Identifies a sealed unit in the output graph
    pub struct UnitId;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledUnit {
    pub name: UnitName,
    /// One primitive instruction per entry, in execution order.
    pub code: Vec<String>,
}

impl CompiledUnit {
    pub fn new(name: UnitName) -> Self {
        Self {
            name,
            code: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct UnitGraph {
    /// Units in the order they were sealed. Unit names are a pure function
    /// of the input program, so this order is too.
    pub units: IndexVec<UnitId, CompiledUnit>,
    /// Root units of the externally invokable methods.
    pub entry_points: Vec<UnitId>,
    /// The unit that initializes flag and constant storage. Must run once
    /// before any entry point.
    pub setup: UnitId,
}

impl UnitGraph {
    pub fn unit_named(&self, name: &str) -> Option<&CompiledUnit> {
        self.units.iter().find(|u| u.name.value() == name)
    }
}
