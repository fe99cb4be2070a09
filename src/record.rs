//! Record identities for [`RecordCollection`](crate::RecordCollection).
//!
//! A [`RecordId`] is assigned once, on the replica that creates the record,
//! and never changes afterwards. The high 32 bits are a stable hash of the
//! replica name and the low 32 bits a per-replica counter, so replicas with
//! distinct names mint distinct ids without talking to each other.

use core::fmt;

/// Globally unique identity of a record. Zero means "not yet assigned".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RecordId(u64);

impl RecordId {
    /// The placeholder carried by records that have not been assigned an id.
    pub const UNASSIGNED: RecordId = RecordId(0);

    /// Wrap a raw id, e.g. one read back from storage.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw integer.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Whether an id has been assigned.
    #[must_use]
    pub const fn is_assigned(self) -> bool {
        self.0 != 0
    }

    /// The replica-derived high half.
    #[must_use]
    pub const fn prefix(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// The per-replica counter half.
    #[must_use]
    pub const fn counter(self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}:{}", self.prefix(), self.counter())
    }
}

/// A value stored in a [`RecordCollection`](crate::RecordCollection).
///
/// ```
/// use kseq::{Record, RecordId};
///
/// #[derive(Clone, Default)]
/// struct Piece {
///     id: RecordId,
///     square: u8,
/// }
///
/// impl Record for Piece {
///     fn record_id(&self) -> RecordId {
///         self.id
///     }
///
///     fn set_record_id(&mut self, id: RecordId) {
///         self.id = id;
///     }
/// }
/// ```
pub trait Record: Clone {
    /// The record's identity, [`RecordId::UNASSIGNED`] if it has none yet.
    fn record_id(&self) -> RecordId;

    /// Store an identity. Called at most once per record by the collection.
    fn set_record_id(&mut self, id: RecordId);
}

/// Stable 32-bit prefix for a replica name.
pub fn replica_prefix(replica_id: &str) -> u32 {
    let hash = blake3::hash(replica_id.as_bytes());
    let bytes = hash.as_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Mints record ids for one replica.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    prefix: u32,
    counter: u32,
}

impl IdAllocator {
    /// Allocator for the named replica, starting at counter 1.
    pub fn new(replica_id: &str) -> Self {
        Self {
            prefix: replica_prefix(replica_id),
            counter: 0,
        }
    }

    /// The prefix stamped on every id this allocator mints.
    #[must_use]
    pub fn prefix(&self) -> u32 {
        self.prefix
    }

    /// Mint the next id.
    pub fn next_id(&mut self) -> RecordId {
        self.counter = self.counter.wrapping_add(1).max(1);
        RecordId(((self.prefix as u64) << 32) | self.counter as u64)
    }

    /// Give `record` an id unless it already has one. Returns whether an id
    /// was assigned.
    pub fn assign<R: Record>(&mut self, record: &mut R) -> bool {
        if record.record_id().is_assigned() {
            return false;
        }
        record.set_record_id(self.next_id());
        true
    }

    /// Advance past `id` if it was minted under this allocator's prefix, so a
    /// replica restored from a snapshot never reissues one of its own ids.
    pub fn observe(&mut self, id: RecordId) {
        if id.prefix() == self.prefix && id.counter() > self.counter {
            self.counter = id.counter();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Item {
        id: RecordId,
    }

    impl Record for Item {
        fn record_id(&self) -> RecordId {
            self.id
        }

        fn set_record_id(&mut self, id: RecordId) {
            self.id = id;
        }
    }

    #[test]
    fn ids_are_monotonic_per_replica() {
        let mut ids = IdAllocator::new("alice");
        let a = ids.next_id();
        let b = ids.next_id();
        assert!(a.is_assigned());
        assert_eq!(a.prefix(), b.prefix());
        assert_eq!(a.counter() + 1, b.counter());
    }

    #[test]
    fn replicas_get_distinct_prefixes() {
        let mut alice = IdAllocator::new("alice");
        let mut bob = IdAllocator::new("bob");
        assert_ne!(alice.prefix(), bob.prefix());
        assert_ne!(alice.next_id(), bob.next_id());
    }

    #[test]
    fn prefix_is_stable() {
        assert_eq!(replica_prefix("alice"), replica_prefix("alice"));
        assert_eq!(IdAllocator::new("x").prefix(), replica_prefix("x"));
    }

    #[test]
    fn assign_is_once_only() {
        let mut ids = IdAllocator::new("a");
        let mut item = Item::default();
        assert!(ids.assign(&mut item));
        let first = item.id;
        assert!(!ids.assign(&mut item));
        assert_eq!(item.id, first);
    }

    #[test]
    fn observe_skips_past_own_ids() {
        let mut original = IdAllocator::new("a");
        original.next_id();
        let last = original.next_id();

        let mut restored = IdAllocator::new("a");
        restored.observe(last);
        restored.observe(IdAllocator::new("b").next_id());
        assert_eq!(restored.next_id().counter(), last.counter() + 1);
    }

    #[test]
    fn unassigned_is_zero() {
        assert!(!RecordId::UNASSIGNED.is_assigned());
        assert_eq!(RecordId::default(), RecordId::UNASSIGNED);
        assert_eq!(RecordId::from_raw(5).get(), 5);
    }
}
