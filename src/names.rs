//! Naming for everything that reaches the output: unit names, storage
//! cells, argument slots, the return slot, goto flags, and the
//! fresh-constant registry. Unit names come from the naming collaborator
//! and must be injective over the restricted charset `[a-z0-9/._-]`; every
//! name the compiler itself introduces is prefixed with `#` so it can never
//! collide with one of those.

use std::collections::BTreeSet;

use hashbrown::HashMap;

use crate::{
    intern::InternedSymbol,
    ir::{FunctionId, Label, VarId},
};

/// A sealed unit's name in the output call graph.
pub type UnitName = InternedSymbol;

/// The characters a unit name may consist of.
pub fn is_valid_unit_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "/._-".contains(c))
}

#[derive(Debug, Default)]
pub struct NameTable {
    /// Unit name per method, indexed by the `FunctionId` we handed out
    method_names: Vec<InternedSymbol>,
    method_lookup: HashMap<InternedSymbol, FunctionId>,
    /// Storage cell name per variable, indexed by the `VarId` we handed out
    var_names: Vec<InternedSymbol>,
    var_lookup: HashMap<InternedSymbol, VarId>,
    /// Integer literals used as operands of arithmetic assignments. The
    /// target has no literal operand form for those, so each gets a
    /// storage cell filled by the setup unit.
    constants: BTreeSet<i32>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a method under the name the naming collaborator chose for
    /// it. The name function is contractually injective and
    /// charset-restricted; violations are defects in the collaborator, not
    /// user errors.
    pub fn register_method(&mut self, name: &str) -> FunctionId {
        assert!(
            is_valid_unit_name(name),
            "method name {name:?} is not restricted to [a-z0-9/._-]"
        );
        let symbol = InternedSymbol::new(name);
        assert!(
            !self.method_lookup.contains_key(&symbol),
            "method name {name:?} registered twice; name(FunctionId) must be injective"
        );

        let id = FunctionId::from_raw(self.method_names.len() as u32);
        self.method_names.push(symbol);
        self.method_lookup.insert(symbol, id);
        id
    }

    pub fn unit_name(&self, method: FunctionId) -> UnitName {
        self.method_names[method.as_u32() as usize]
    }

    /// Registers a local of `method`. Variables are keyed by their storage
    /// name, so registering the same name twice yields the same id.
    pub fn register_var(&mut self, method: FunctionId, name: &str) -> VarId {
        debug_assert!(
            !name.contains('#'),
            "front-end variable names may not contain '#'"
        );
        self.register_storage(format!("#{}#{}", self.unit_name(method), name))
    }

    /// Registers the `index`th parameter of `method`. Parameters lose
    /// their source name: their storage *is* the argument slot callers
    /// fill before the invocation, `#<method>##arg<index>`.
    pub fn register_param(&mut self, method: FunctionId, index: usize) -> VarId {
        let slot = self.argument_slot(self.unit_name(method), index);
        self.register_storage(slot)
    }

    /// The per-method integer flag cell the goto lowering writes.
    pub fn goto_flag_var(&mut self, method: FunctionId) -> VarId {
        self.register_storage(format!("#{}##gotoflag", self.unit_name(method)))
    }

    /// A snapshot cell for a branch condition that the taken branch might
    /// overwrite before the other branch's guard reads it.
    pub fn condition_var(&mut self, method: FunctionId, counter: u32) -> VarId {
        self.register_storage(format!("#{}##cond{}", self.unit_name(method), counter))
    }

    /// The reserved cell every method's return value is stored in.
    pub fn ret_var(&mut self) -> VarId {
        self.register_storage("#RET".to_owned())
    }

    fn register_storage(&mut self, storage: String) -> VarId {
        let symbol = InternedSymbol::new(&storage);
        if let Some(existing) = self.var_lookup.get(&symbol) {
            return *existing;
        }

        let id = VarId::from_raw(self.var_names.len() as u32);
        self.var_names.push(symbol);
        self.var_lookup.insert(symbol, id);
        id
    }

    pub fn storage_name(&self, var: VarId) -> InternedSymbol {
        self.var_names[var.as_u32() as usize]
    }

    /// The parameter slot a caller fills before invoking `unit`.
    pub fn argument_slot(&self, unit: UnitName, index: usize) -> String {
        format!("#{unit}##arg{index}")
    }

    /// A branch unit's deterministic name: method identity, a counter in
    /// fixed traversal order, and a human-readable tag.
    pub fn branch_unit(&self, method: FunctionId, counter: u32, tag: &str) -> UnitName {
        InternedSymbol::new(&format!("{}-{}-{}", self.unit_name(method), counter, tag))
    }

    /// Storage holding the integer `value`, initialized by the setup unit.
    pub fn constant(&mut self, value: i32) -> String {
        self.constants.insert(value);
        format!("#CONST#{value}")
    }

    /// All constants encountered so far, ascending.
    pub fn constants(&self) -> impl Iterator<Item = (i32, String)> + '_ {
        self.constants.iter().map(|v| (*v, format!("#CONST#{v}")))
    }

    pub fn setup_unit_name() -> UnitName {
        InternedSymbol::new("internal/setup")
    }

    /// The canonical label at a method's return point. A goto targeting it
    /// needs no jump: the dispatch site merely clears the flag, since the
    /// method is over anyway.
    pub fn method_exit_label() -> Label {
        InternedSymbol::new("#ret-label")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_name_charset() {
        assert!(is_valid_unit_name("test.testmethod"));
        assert!(is_valid_unit_name("internal/int.operator-add"));
        assert!(!is_valid_unit_name("Test.Method"));
        assert!(!is_valid_unit_name("has space"));
        assert!(!is_valid_unit_name(""));
    }

    #[test]
    #[should_panic(expected = "injective")]
    fn duplicate_method_names_are_rejected() {
        let mut names = NameTable::new();
        names.register_method("a.b");
        names.register_method("a.b");
    }

    #[test]
    fn variables_are_method_scoped_and_stable() {
        let mut names = NameTable::new();
        let m1 = names.register_method("m1");
        let m2 = names.register_method("m2");

        let a = names.register_var(m1, "i");
        let b = names.register_var(m2, "i");
        let c = names.register_var(m1, "i");

        assert_ne!(a, b);
        assert_eq!(a, c);
        assert_eq!(names.storage_name(a).value(), "#m1#i");
        assert_eq!(names.storage_name(b).value(), "#m2#i");
    }

    #[test]
    fn parameters_live_in_their_argument_slots() {
        let mut names = NameTable::new();
        let m = names.register_method("params.m");
        let p = names.register_param(m, 0);

        assert_eq!(names.storage_name(p).value(), "#params.m##arg0");
        assert_eq!(
            names.argument_slot(names.unit_name(m), 0),
            "#params.m##arg0"
        );
    }

    #[test]
    fn constants_are_deduplicated_and_sorted() {
        let mut names = NameTable::new();
        names.constant(7);
        names.constant(-2);
        names.constant(7);

        let all: Vec<_> = names.constants().collect();
        assert_eq!(
            all,
            vec![(-2, "#CONST#-2".to_owned()), (7, "#CONST#7".to_owned())]
        );
    }
}
