//! Error types for sequence and record collection operations.
//!
//! Most situations a replica runs into while applying remote operations are
//! absorbed as idempotent no-ops. The variants here cover the few cases where
//! the caller handed in something the collection cannot act on.

use thiserror::Error;

use crate::ident::Ident;
use crate::record::RecordId;

/// Errors produced by [`Sequence`](crate::Sequence),
/// [`RecordCollection`](crate::RecordCollection) and the session registry.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A positional insert targeted an index past the end of the sequence.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The sequence length at the time of the call.
        len: usize,
    },

    /// A replace referenced a record that is not present locally.
    #[error("cannot replace record {id}: not present in this collection")]
    UnknownRecord {
        /// The record id that was looked up.
        id: RecordId,
    },

    /// A local insert carried a record id that is already present.
    #[error("record {id} is already present in this collection")]
    DuplicateRecord {
        /// The duplicated record id.
        id: RecordId,
    },

    /// An insert arrived whose identifier is ordered before a set already
    /// queued for the same record.
    #[error("insert {insert} for record {id} is ordered before its queued set {queued}")]
    QueuedSetConflict {
        /// The record both operations target.
        id: RecordId,
        /// Identifier carried by the insert.
        insert: Ident,
        /// Identifier carried by the queued set.
        queued: Ident,
    },

    /// A configuration value is outside the supported bounds.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with it.
        reason: String,
    },

    /// No session is registered under the given id.
    #[error("unknown session: {id}")]
    UnknownSession {
        /// The session id that was looked up.
        id: String,
    },

    /// A session with the given id is already open.
    #[error("session already open: {id}")]
    SessionExists {
        /// The conflicting session id.
        id: String,
    },
}

impl Error {
    /// Check if this error was caused by a positional argument.
    pub fn is_range_error(&self) -> bool {
        matches!(self, Error::IndexOutOfRange { .. })
    }

    /// Check if this error signals operations that cannot be reconciled.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::QueuedSetConflict { .. })
    }
}

/// Result type used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
