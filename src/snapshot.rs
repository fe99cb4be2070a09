//! Full-state snapshots handed to replicas that join late.

use alloc::vec::Vec;

use crate::atom::Atom;
use crate::ident::Ident;

/// The atoms of a replica in identifier order, plus its tombstones.
///
/// Replaying only `atoms` reconstructs the visible state but cannot tell
/// "never existed" from "removed before I joined"; `removed` carries the
/// identifier tombstones so late inserts for removed atoms stay suppressed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Snapshot<T> {
    /// Live atoms, ascending by identifier.
    pub atoms: Vec<Atom<T>>,
    /// Removed identifiers.
    #[cfg_attr(feature = "serde", serde(default))]
    pub removed: Vec<Ident>,
}

impl<T> Snapshot<T> {
    /// Snapshot carrying only atoms, as sent by hosts that do not ship tombstones.
    pub fn from_atoms(atoms: Vec<Atom<T>>) -> Self {
        Self {
            atoms,
            removed: Vec::new(),
        }
    }

    /// Number of live atoms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Whether there are no live atoms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}
