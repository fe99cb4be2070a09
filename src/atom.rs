use crate::ident::Ident;

/// A value placed in the sequence under an identifier.
///
/// The materialized list is the identifier-sorted sequence of atoms.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Atom<T> {
    id: Ident,
    value: T,
}

impl<T> Atom<T> {
    /// Pair a value with its position.
    pub fn new(id: Ident, value: T) -> Self {
        Self { id, value }
    }

    /// Position of this atom.
    #[must_use]
    pub fn id(&self) -> &Ident {
        &self.id
    }

    /// The stored value.
    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Split into identifier and value.
    pub fn into_parts(self) -> (Ident, T) {
        (self.id, self.value)
    }
}
