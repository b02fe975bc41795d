//! Interface descriptors and vtable layout resolution.
//!
//! Every bridged interface declares one immutable [`InterfaceDesc`]: its
//! identity, its single optional base and its methods in declaration order.
//! The flattened slot order — base interface first, most-derived last — is a
//! hard external contract with the native library's vtable convention. A
//! mismatch does not fail loudly; it calls the wrong native function.

use crate::guid::Guid;

/// One method in an interface declaration.
#[derive(Debug, PartialEq, Eq)]
pub struct MethodDesc {
    pub name: &'static str,
}

/// Immutable description of a bridged interface.
///
/// Declared once per interface (by `#[com_interface]`); interfaces extend at
/// most one base, transitively rooted at `IUnknown`, whose three methods own
/// slots 0..3 of every vtable.
#[derive(Debug)]
pub struct InterfaceDesc {
    pub name: &'static str,
    pub iid: Guid,
    pub base: Option<&'static InterfaceDesc>,
    pub methods: &'static [MethodDesc],
}

impl InterfaceDesc {
    /// Total number of vtable slots, base chain included.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.base.map_or(0, InterfaceDesc::slot_count) + self.methods.len()
    }

    /// Inheritance depth; the root interface has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.base.map_or(0, |base| base.depth() + 1)
    }

    /// Walk the inheritance chain root-first and concatenate each level's
    /// declared methods. The result is the slot order of the native vtable.
    #[must_use]
    pub fn flatten(&'static self) -> Vec<&'static MethodDesc> {
        let mut flat = match self.base {
            Some(base) => base.flatten(),
            None => Vec::new(),
        };
        flat.extend(self.methods.iter());
        flat
    }

    /// Absolute vtable slot of a method, resolved against the cached
    /// flattened layout.
    #[must_use]
    pub fn slot_of(&'static self, name: &str) -> Option<usize> {
        crate::registry::layout_of(self)
            .iter()
            .position(|m| m.name == name)
    }
}
