use std::sync::RwLock;

use hashbrown::HashMap;
use once_cell::sync::Lazy;

#[derive(Default)]
struct InterningTable {
    /// Symbol -> string. Strings are leaked so symbols can hand out
    /// `&'static str` without holding the lock.
    strings: Vec<&'static str>,
    indices: HashMap<&'static str, u32>,
}

static INTERNING_TABLE: Lazy<RwLock<InterningTable>> = Lazy::new(Default::default);

/// An index into the global string interning table. Copyable, cheap to
/// compare, and resolvable back to its string at any time.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InternedSymbol(u32);

impl InternedSymbol {
    pub fn new(value: &str) -> Self {
        {
            let table = INTERNING_TABLE.read().unwrap();

            if let Some(index) = table.indices.get(value) {
                return Self(*index);
            }
        }

        let mut table = INTERNING_TABLE.write().unwrap();

        // Someone may have raced us between the read and write locks
        if let Some(index) = table.indices.get(value) {
            return Self(*index);
        }

        let leaked: &'static str = Box::leak(value.to_owned().into_boxed_str());
        let index = table.strings.len() as u32;
        table.strings.push(leaked);
        table.indices.insert(leaked, index);

        Self(index)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn value(&self) -> &'static str {
        INTERNING_TABLE.read().unwrap().strings[self.0 as usize]
    }
}

impl core::fmt::Debug for InternedSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("InternedSymbol")
            .field(&self.0)
            .field(&self.value())
            .finish()
    }
}

impl core::fmt::Display for InternedSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.value())
    }
}
