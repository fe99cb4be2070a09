use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::String;
use alloc::vec::Vec;

use tracing::{debug, trace, warn};

use crate::atom::Atom;
use crate::clock::WallClock;
use crate::config::Config;
use crate::crdt::Replicated;
use crate::error::{Error, Result};
use crate::events::Events;
use crate::op::{Applied, OpKind, Operation};
use crate::record::{IdAllocator, Record, RecordId};
use crate::sequence::Sequence;
use crate::snapshot::Snapshot;

/// A [`Sequence`] of records that can also be replaced in place.
///
/// Each record carries a [`RecordId`] assigned by the replica that created
/// it. A replace is shipped as a [`OpKind::Set`] operation whose identifier is
/// allocated just before the record's current one; when two replicas replace
/// the same record concurrently the set with the smaller identifier wins on
/// every replica, and the record moves to that identifier.
///
/// A set that arrives before the insert of its record is held back and
/// merged into the insert when it shows up.
///
/// # Example
///
/// ```
/// use kseq::{Record, RecordCollection, RecordId};
///
/// #[derive(Clone, Debug, Default, PartialEq)]
/// struct Card {
///     id: RecordId,
///     title: String,
/// }
///
/// impl Record for Card {
///     fn record_id(&self) -> RecordId { self.id }
///     fn set_record_id(&mut self, id: RecordId) { self.id = id; }
/// }
///
/// let mut alice = RecordCollection::new("alice");
/// let mut bob = RecordCollection::new("bob");
///
/// let insert = alice.push(Card { title: "draft".into(), ..Card::default() }).unwrap();
/// bob.apply(insert).unwrap();
///
/// let mut card = bob.get(0).unwrap().clone();
/// card.title = "final".into();
/// let set = bob.replace(card).unwrap();
/// alice.apply(set).unwrap();
///
/// assert_eq!(alice.get(0).unwrap().title, "final");
/// assert_eq!(alice.to_vec(), bob.to_vec());
/// ```
#[derive(Debug)]
pub struct RecordCollection<T: Record> {
    seq: Sequence<T>,
    ids: IdAllocator,
    /// Record id to current position.
    index: BTreeMap<RecordId, usize>,
    removed_records: BTreeSet<RecordId>,
    /// Sets whose record has not been inserted here yet.
    queued: BTreeMap<RecordId, Operation<T>>,
}

impl<T: Record> RecordCollection<T> {
    /// Create an empty collection for the given replica with default settings.
    pub fn new(replica_id: impl Into<String>) -> Self {
        Self::wrap(Sequence::new(replica_id))
    }

    /// Create an empty collection from a validated configuration.
    pub fn with_config(config: Config) -> Result<Self> {
        Sequence::with_config(config).map(Self::wrap)
    }

    /// Rebuild a replica from another replica's snapshot.
    pub fn from_snapshot(config: Config, snapshot: Snapshot<T>) -> Result<Self> {
        let mut collection = Self::wrap(Sequence::from_snapshot(config, snapshot)?);
        for record in collection.seq.iter() {
            collection.ids.observe(record.record_id());
        }
        collection.reindex_from(0);
        Ok(collection)
    }

    fn wrap(seq: Sequence<T>) -> Self {
        Self {
            ids: IdAllocator::new(seq.replica_id()),
            seq,
            index: BTreeMap::new(),
            removed_records: BTreeSet::new(),
            queued: BTreeMap::new(),
        }
    }

    /// Replace the wall-clock source stamped onto outgoing operations.
    pub fn set_clock(&mut self, clock: WallClock) {
        self.seq.set_clock(clock);
    }

    /// A fresh record with an id already assigned.
    pub fn create_record(&mut self) -> T
    where
        T: Default,
    {
        let mut record = T::default();
        self.ids.assign(&mut record);
        record
    }

    /// Give `record` an id if it has none, returning the id it ends up with.
    pub fn assign_id(&mut self, record: &mut T) -> RecordId {
        self.ids.assign(record);
        record.record_id()
    }

    /// Insert `record` so that it ends up at `index`.
    ///
    /// Records without an id get one. Fails with
    /// [`Error::IndexOutOfRange`] if `index > len()` and with
    /// [`Error::DuplicateRecord`] if a record with the same id is present.
    pub fn insert(&mut self, index: usize, mut record: T) -> Result<Operation<T>> {
        let id = self.assign_id(&mut record);
        if self.index.contains_key(&id) {
            return Err(Error::DuplicateRecord { id });
        }
        let op = self.seq.prepare_insert(index, record)?;
        self.apply_with(op.clone(), false)?;
        self.seq.set_last_op(Some(op.clone()));
        Ok(op)
    }

    /// Append `record` to the end.
    pub fn push(&mut self, record: T) -> Result<Operation<T>> {
        self.insert(self.seq.len(), record)
    }

    /// Remove the record at `index`. Past the end nothing happens and
    /// [`last_op`](RecordCollection::last_op) is cleared.
    pub fn remove_at(&mut self, index: usize) -> Option<Operation<T>> {
        let Some(op) = self.seq.prepare_remove(index) else {
            self.seq.set_last_op(None);
            return None;
        };
        self.apply_remove(op.clone(), false);
        self.seq.set_last_op(Some(op.clone()));
        Some(op)
    }

    /// Replace the stored record that has the same id as `record`.
    ///
    /// The record is re-keyed just before its current position, so it stays
    /// where it is locally and wins against any concurrent replace that was
    /// keyed later.
    pub fn replace(&mut self, record: T) -> Result<Operation<T>> {
        let record_id = record.record_id();
        let index = self
            .index_of(record_id)
            .ok_or(Error::UnknownRecord { id: record_id })?;
        let id = self.seq.allocate(index);
        let op = Operation::set(
            self.seq.replica_id(),
            self.seq.wall_time(),
            id,
            record,
        );
        self.apply_with(op.clone(), false)?;
        self.seq.set_last_op(Some(op.clone()));
        Ok(op)
    }

    /// Apply a local or remote operation and notify listeners.
    ///
    /// Inserts and sets whose record carries no id are ignored. Fails only
    /// with [`Error::QueuedSetConflict`], when an insert arrives with an
    /// identifier smaller than the set already queued for its record.
    pub fn apply(&mut self, op: Operation<T>) -> Result<Applied> {
        self.apply_with(op, false)
    }

    /// Apply an operation without notifying listeners.
    pub fn apply_quiet(&mut self, op: Operation<T>) -> Result<Applied> {
        self.apply_with(op, true)
    }

    fn apply_with(&mut self, op: Operation<T>, quiet: bool) -> Result<Applied> {
        match op.kind {
            OpKind::Insert => self.apply_insert(op, quiet),
            OpKind::Remove => Ok(self.apply_remove(op, quiet)),
            OpKind::Set => Ok(self.apply_set(op, quiet)),
        }
    }

    fn apply_insert(&mut self, mut op: Operation<T>, quiet: bool) -> Result<Applied> {
        let record_id = op.value.record_id();
        if !record_id.is_assigned() {
            warn!(replica = %self.seq.replica_id(), origin = %op.replica_id, insert = %op.id, "insert without record id dropped");
            return Ok(Applied::Ignored);
        }
        if self.removed_records.contains(&record_id) {
            debug!(replica = %self.seq.replica_id(), record = %record_id, "insert of removed record dropped");
            return Ok(Applied::Ignored);
        }
        if self.index.contains_key(&record_id) {
            trace!(replica = %self.seq.replica_id(), record = %record_id, "record already present");
            return Ok(Applied::Ignored);
        }
        if let Some(queued) = self.queued.get(&record_id) {
            if op.id < queued.id {
                warn!(
                    replica = %self.seq.replica_id(),
                    record = %record_id,
                    insert = %op.id,
                    queued = %queued.id,
                    "insert ordered before queued set"
                );
                return Err(Error::QueuedSetConflict {
                    id: record_id,
                    insert: op.id,
                    queued: queued.id.clone(),
                });
            }
            if let Some(queued) = self.queued.remove(&record_id) {
                debug!(replica = %self.seq.replica_id(), record = %record_id, "merging queued set into insert");
                let original = core::mem::replace(&mut op.id, queued.id);
                op.value = queued.value;
                self.seq.retire(original);
            }
        }

        let applied = self.seq.apply_with(op, quiet);
        if let Applied::Inserted { index } = applied {
            self.ids.observe(record_id);
            self.reindex_from(index);
        }
        Ok(applied)
    }

    fn apply_remove(&mut self, op: Operation<T>, quiet: bool) -> Applied {
        let record_id = op.value.record_id();
        let origin = op.replica_id.clone();
        let applied = self.seq.apply_with(op, quiet);

        if record_id.is_assigned() {
            self.queued.remove(&record_id);
            self.removed_records.insert(record_id);
        }

        if let Applied::Removed { index } = applied {
            self.index.remove(&record_id);
            self.reindex_from(index);
            return applied;
        }

        // The record may live under a newer identifier after a set.
        let Some(index) = self.index.remove(&record_id) else {
            return applied;
        };
        let atom = self.seq.remove_atom(index);
        trace!(replica = %self.seq.replica_id(), record = %record_id, index, "removed re-keyed record");
        if !quiet {
            self.seq.notify_removed(index, atom.value(), &origin);
        }
        let (id, _) = atom.into_parts();
        self.seq.retire(id);
        self.reindex_from(index);
        Applied::Removed { index }
    }

    fn apply_set(&mut self, op: Operation<T>, quiet: bool) -> Applied {
        let record_id = op.value.record_id();
        if !record_id.is_assigned() {
            warn!(replica = %self.seq.replica_id(), origin = %op.replica_id, set = %op.id, "set without record id dropped");
            return Applied::Ignored;
        }
        if self.removed_records.contains(&record_id) || self.seq.is_removed(&op.id) {
            trace!(replica = %self.seq.replica_id(), record = %record_id, "set for removed record dropped");
            return Applied::Ignored;
        }

        let Some(&from) = self.index.get(&record_id) else {
            return self.queue_set(record_id, op);
        };
        let current = match self.seq.atom(from) {
            Some(atom) => atom.id(),
            None => return Applied::Ignored,
        };
        if op.id >= *current || self.seq.position(&op.id).is_some() {
            debug!(replica = %self.seq.replica_id(), record = %record_id, "set superseded by smaller identifier");
            return Applied::Ignored;
        }

        let old = self.seq.remove_atom(from);
        let origin = op.replica_id;
        let Some(to) = self.seq.insert_atom(op.id, op.value) else {
            return Applied::Ignored;
        };
        let (old_id, old_value) = old.into_parts();
        self.seq.retire(old_id);
        self.reindex_from(from.min(to));
        trace!(replica = %self.seq.replica_id(), record = %record_id, from, to, "set applied");
        if !quiet {
            self.seq.notify_replaced(from, to, &old_value, &origin);
        }
        Applied::Replaced { from, to }
    }

    fn queue_set(&mut self, record_id: RecordId, op: Operation<T>) -> Applied {
        if let Some(queued) = self.queued.get(&record_id) {
            if queued.id <= op.id {
                return Applied::Ignored;
            }
        }
        debug!(replica = %self.seq.replica_id(), record = %record_id, "set queued until insert arrives");
        self.queued.insert(record_id, op);
        Applied::Queued
    }

    fn reindex_from(&mut self, start: usize) {
        for (pos, atom) in self.seq.atoms().iter().enumerate().skip(start) {
            self.index.insert(atom.value().record_id(), pos);
        }
    }

    /// Name of this replica.
    #[must_use]
    pub fn replica_id(&self) -> &str {
        self.seq.replica_id()
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    /// Whether there are no live records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// The record at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.seq.get(index)
    }

    /// The record with the given id.
    #[must_use]
    pub fn get_by_id(&self, id: RecordId) -> Option<&T> {
        self.index_of(id).and_then(|index| self.seq.get(index))
    }

    /// Current position of the record with the given id.
    #[must_use]
    pub fn index_of(&self, id: RecordId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Whether a record with the given id is present.
    #[must_use]
    pub fn contains_record(&self, id: RecordId) -> bool {
        self.index.contains_key(&id)
    }

    /// Whether the record with the given id has been removed.
    #[must_use]
    pub fn is_record_removed(&self, id: RecordId) -> bool {
        self.removed_records.contains(&id)
    }

    /// Number of sets waiting for their record's insert.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    /// All live atoms in order.
    #[must_use]
    pub fn atoms(&self) -> &[Atom<T>] {
        self.seq.atoms()
    }

    /// Iterate over the records in order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.seq.iter()
    }

    /// Clone the records into a `Vec`.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.seq.to_vec()
    }

    /// The operation most recently produced by a local edit.
    #[must_use]
    pub fn last_op(&self) -> Option<&Operation<T>> {
        self.seq.last_op()
    }

    /// Listener registry for change notifications.
    pub fn events_mut(&mut self) -> &mut Events<T> {
        self.seq.events_mut()
    }

    /// Capture the live atoms and tombstones.
    pub fn snapshot(&self) -> Snapshot<T> {
        self.seq.snapshot()
    }
}

impl<T: Record> Replicated for RecordCollection<T> {
    type Value = T;

    fn replica_id(&self) -> &str {
        self.seq.replica_id()
    }

    fn apply_op(&mut self, op: Operation<T>) -> Result<Applied> {
        self.apply(op)
    }

    fn snapshot(&self) -> Snapshot<T> {
        self.seq.snapshot()
    }
}
