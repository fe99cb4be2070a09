//! Replication operations and the outcome of applying them.

use alloc::string::String;

use crate::ident::Ident;

/// The kind of change an [`Operation`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OpKind {
    /// Place `value` under `id`.
    Insert,
    /// Retire `id`.
    Remove,
    /// Replace a record in place (record collections only).
    Set,
}

/// The unit of replication.
///
/// Operations are self-contained: applying one needs nothing but the
/// operation and the receiving replica's state. Remove operations carry the
/// value that was removed so that record-aware replicas can tell which record
/// was targeted.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Operation<T> {
    /// What to do.
    pub kind: OpKind,
    /// Replica that produced the operation.
    pub replica_id: String,
    /// Wall-clock time at the producer, informational only.
    pub wall_time: i64,
    /// Position the operation refers to.
    pub id: Ident,
    /// Payload.
    pub value: T,
}

impl<T> Operation<T> {
    /// Build an insert.
    pub fn insert(replica_id: impl Into<String>, wall_time: i64, id: Ident, value: T) -> Self {
        Self::new(OpKind::Insert, replica_id, wall_time, id, value)
    }

    /// Build a remove.
    pub fn remove(replica_id: impl Into<String>, wall_time: i64, id: Ident, value: T) -> Self {
        Self::new(OpKind::Remove, replica_id, wall_time, id, value)
    }

    /// Build a set.
    pub fn set(replica_id: impl Into<String>, wall_time: i64, id: Ident, value: T) -> Self {
        Self::new(OpKind::Set, replica_id, wall_time, id, value)
    }

    fn new(kind: OpKind, replica_id: impl Into<String>, wall_time: i64, id: Ident, value: T) -> Self {
        Self {
            kind,
            replica_id: replica_id.into(),
            wall_time,
            id,
            value,
        }
    }
}

/// What applying an operation did to the local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A new atom now sits at `index`.
    Inserted {
        /// Position of the new atom.
        index: usize,
    },
    /// The atom formerly at `index` is gone.
    Removed {
        /// Position the atom occupied.
        index: usize,
    },
    /// A record was replaced and its atom moved from `from` to `to`.
    Replaced {
        /// Position before the replace.
        from: usize,
        /// Position after the replace.
        to: usize,
    },
    /// A set was buffered until its record's insert arrives.
    Queued,
    /// Nothing changed: duplicate, superseded, or tombstoned.
    Ignored,
}

impl Applied {
    /// Whether the visible sequence changed.
    pub fn changed(&self) -> bool {
        matches!(
            self,
            Applied::Inserted { .. } | Applied::Removed { .. } | Applied::Replaced { .. }
        )
    }
}
