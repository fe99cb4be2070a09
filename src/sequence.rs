use alloc::collections::BTreeSet;
use alloc::string::String;
use alloc::vec::Vec;

use tracing::{debug, trace};

use crate::atom::Atom;
use crate::clock::WallClock;
use crate::config::Config;
use crate::crdt::Replicated;
use crate::error::{Error, Result};
use crate::events::Events;
use crate::generator::PositionGenerator;
use crate::ident::Ident;
use crate::op::{Applied, OpKind, Operation};
use crate::snapshot::Snapshot;

/// An ordered sequence CRDT with LSEQ identifiers and tombstone removal.
///
/// Each element lives under an [`Ident`]; the visible list is the atoms
/// sorted by identifier. Local edits produce an [`Operation`] that is applied
/// locally and handed back for the transport to ship. Remote replicas feed
/// those operations to [`apply`](Sequence::apply) in any order, any number of
/// times, and converge on the same list.
///
/// Removed identifiers are remembered forever, so an insert that arrives
/// after its own remove stays removed.
///
/// # Example
///
/// ```
/// use kseq::Sequence;
///
/// let mut alice = Sequence::new("alice");
/// let mut bob = Sequence::new("bob");
///
/// let ops = vec![
///     alice.insert(0, "a").unwrap(),
///     alice.insert(1, "b").unwrap(),
///     alice.insert(0, "c").unwrap(),
/// ];
///
/// for op in ops.into_iter().rev() {
///     bob.apply(op);
/// }
///
/// assert_eq!(alice.to_vec(), vec!["c", "a", "b"]);
/// assert_eq!(bob.to_vec(), alice.to_vec());
/// ```
#[derive(Debug)]
pub struct Sequence<T> {
    replica_id: String,
    time: i64,
    /// Sorted ascending by identifier.
    atoms: Vec<Atom<T>>,
    removed: BTreeSet<Ident>,
    generator: PositionGenerator,
    clock: WallClock,
    last_op: Option<Operation<T>>,
    events: Events<T>,
}

impl<T: Clone> Sequence<T> {
    /// Create an empty sequence for the given replica with default settings.
    pub fn new(replica_id: impl Into<String>) -> Self {
        let replica_id = replica_id.into();
        Self::build(&Config::new(replica_id.clone()), replica_id)
    }

    /// Create an empty sequence from a validated configuration.
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        let replica_id = config.replica_id.clone();
        Ok(Self::build(&config, replica_id))
    }

    /// Rebuild a replica from a snapshot taken on another replica.
    ///
    /// Atoms are replayed as quiet inserts, then the snapshot's tombstones are
    /// recorded. No notifications fire.
    pub fn from_snapshot(config: Config, snapshot: Snapshot<T>) -> Result<Self> {
        let mut sequence = Self::with_config(config)?;
        let count = snapshot.atoms.len();
        for atom in snapshot.atoms {
            let (id, value) = atom.into_parts();
            let origin = sequence.replica_id.clone();
            sequence.apply_quiet(Operation::insert(origin, 0, id, value));
        }
        sequence.removed.extend(snapshot.removed);
        // Never reissue an identifier this replica name minted before.
        sequence.time = sequence
            .atoms
            .iter()
            .map(Atom::id)
            .chain(sequence.removed.iter())
            .map(Ident::time)
            .max()
            .unwrap_or(0);
        debug!(
            replica = %sequence.replica_id,
            atoms = count,
            tombstones = sequence.removed.len(),
            "restored sequence from snapshot"
        );
        Ok(sequence)
    }

    fn build(config: &Config, replica_id: String) -> Self {
        let generator = match config.seed {
            Some(seed) => PositionGenerator::with_seed(config.generator, seed),
            None => PositionGenerator::new(config.generator),
        };
        Self {
            events: Events::new(replica_id.clone()),
            replica_id,
            time: 0,
            atoms: Vec::new(),
            removed: BTreeSet::new(),
            generator,
            clock: WallClock::system(),
            last_op: None,
        }
    }

    /// Replace the wall-clock source stamped onto outgoing operations.
    pub fn set_clock(&mut self, clock: WallClock) {
        self.clock = clock;
    }

    /// Insert `value` so that it ends up at `index`.
    ///
    /// Returns the operation to replicate. Fails if `index > len()`.
    pub fn insert(&mut self, index: usize, value: T) -> Result<Operation<T>> {
        let op = self.prepare_insert(index, value)?;
        self.apply(op.clone());
        self.last_op = Some(op.clone());
        Ok(op)
    }

    /// Append `value` to the end.
    pub fn push(&mut self, value: T) -> Operation<T> {
        let op = self.insert_op(self.atoms.len(), value);
        self.apply(op.clone());
        self.last_op = Some(op.clone());
        op
    }

    /// Remove the value at `index`.
    ///
    /// An index past the end is not an error: nothing happens, `None` is
    /// returned and [`last_op`](Sequence::last_op) is cleared.
    pub fn remove_at(&mut self, index: usize) -> Option<Operation<T>> {
        let Some(op) = self.prepare_remove(index) else {
            self.last_op = None;
            return None;
        };
        self.apply(op.clone());
        self.last_op = Some(op.clone());
        Some(op)
    }

    /// Apply a local or remote operation and notify listeners.
    pub fn apply(&mut self, op: Operation<T>) -> Applied {
        self.apply_with(op, false)
    }

    /// Apply an operation without notifying listeners, for bulk replay.
    pub fn apply_quiet(&mut self, op: Operation<T>) -> Applied {
        self.apply_with(op, true)
    }

    pub(crate) fn apply_with(&mut self, op: Operation<T>, quiet: bool) -> Applied {
        match op.kind {
            OpKind::Insert => {
                if self.removed.contains(&op.id) {
                    debug!(replica = %self.replica_id, id = %op.id, "insert of removed identifier dropped");
                    return Applied::Ignored;
                }
                let Some(index) = self.insert_atom(op.id, op.value) else {
                    trace!(replica = %self.replica_id, "duplicate insert ignored");
                    return Applied::Ignored;
                };
                trace!(replica = %self.replica_id, from = %op.replica_id, index, "insert applied");
                if !quiet {
                    self.events
                        .added(index, self.atoms[index].value(), &op.replica_id);
                    self.events.count_changed(self.atoms.len());
                }
                Applied::Inserted { index }
            }
            OpKind::Remove => {
                if self.removed.contains(&op.id) {
                    trace!(replica = %self.replica_id, id = %op.id, "remove already applied");
                    return Applied::Ignored;
                }
                self.removed.insert(op.id.clone());
                let Some(index) = self.position(&op.id) else {
                    debug!(replica = %self.replica_id, id = %op.id, "remove recorded ahead of its insert");
                    return Applied::Ignored;
                };
                let atom = self.remove_atom(index);
                trace!(replica = %self.replica_id, from = %op.replica_id, index, "remove applied");
                if !quiet {
                    self.events.removed(index, atom.value(), &op.replica_id);
                    self.events.count_changed(self.atoms.len());
                }
                Applied::Removed { index }
            }
            OpKind::Set => {
                debug!(replica = %self.replica_id, "set ignored by plain sequence");
                Applied::Ignored
            }
        }
    }

    /// The operation most recently produced by a local edit.
    #[must_use]
    pub fn last_op(&self) -> Option<&Operation<T>> {
        self.last_op.as_ref()
    }

    pub(crate) fn set_last_op(&mut self, op: Option<Operation<T>>) {
        self.last_op = op;
    }

    /// Listener registry for change notifications.
    pub fn events_mut(&mut self) -> &mut Events<T> {
        &mut self.events
    }

    pub(crate) fn notify_replaced(&mut self, from: usize, to: usize, old: &T, origin: &str) {
        let new = self.atoms[to].value();
        self.events.replaced(from, old, new, origin);
        if from != to {
            self.events.moved(from, to, new, origin);
        }
    }

    pub(crate) fn notify_removed(&mut self, index: usize, value: &T, origin: &str) {
        self.events.removed(index, value, origin);
        self.events.count_changed(self.atoms.len());
    }

    /// Capture the live atoms and tombstones.
    pub fn snapshot(&self) -> Snapshot<T> {
        Snapshot {
            atoms: self.atoms.clone(),
            removed: self.removed.iter().cloned().collect(),
        }
    }

    /// Clone the values into a `Vec`.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    /// Build an insert for slot `index` without applying it.
    pub(crate) fn prepare_insert(&mut self, index: usize, value: T) -> Result<Operation<T>> {
        if index > self.atoms.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.atoms.len(),
            });
        }
        Ok(self.insert_op(index, value))
    }

    /// Build a remove for slot `index` without applying it.
    pub(crate) fn prepare_remove(&mut self, index: usize) -> Option<Operation<T>> {
        let atom = self.atoms.get(index)?;
        let op = Operation::remove(
            self.replica_id.clone(),
            self.clock.now(),
            atom.id().clone(),
            atom.value().clone(),
        );
        Some(op)
    }

    fn insert_op(&mut self, index: usize, value: T) -> Operation<T> {
        let id = self.allocate(index);
        Operation::insert(self.replica_id.clone(), self.clock.now(), id, value)
    }

    /// Allocate an identifier for slot `index`: after the atom at
    /// `index - 1` and before the atom currently at `index`.
    pub(crate) fn allocate(&mut self, index: usize) -> Ident {
        self.time += 1;
        let before = index.checked_sub(1).and_then(|i| self.atoms.get(i));
        let after = self.atoms.get(index);
        self.generator.generate(
            &self.replica_id,
            self.time,
            before.map(Atom::id),
            after.map(Atom::id),
        )
    }

    pub(crate) fn wall_time(&self) -> i64 {
        self.clock.now()
    }

    /// Place an atom by bisection. `None` if an atom with the same
    /// identifier is already present.
    pub(crate) fn insert_atom(&mut self, id: Ident, value: T) -> Option<usize> {
        let pos = self.bisect_right(&id);
        if pos > 0 && self.atoms[pos - 1].id() == &id {
            return None;
        }
        self.atoms.insert(pos, Atom::new(id, value));
        Some(pos)
    }

    /// Physically remove the atom at `index` without recording a tombstone.
    pub(crate) fn remove_atom(&mut self, index: usize) -> Atom<T> {
        self.atoms.remove(index)
    }

    /// Record `id` as removed without touching the atoms.
    pub(crate) fn retire(&mut self, id: Ident) {
        self.removed.insert(id);
    }
}

impl<T> Sequence<T> {
    /// Name of this replica.
    #[must_use]
    pub fn replica_id(&self) -> &str {
        &self.replica_id
    }

    /// Number of live values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Whether there are no live values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// The value at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.atoms.get(index).map(Atom::value)
    }

    /// The atom at `index`.
    #[must_use]
    pub fn atom(&self, index: usize) -> Option<&Atom<T>> {
        self.atoms.get(index)
    }

    /// All live atoms in order.
    #[must_use]
    pub fn atoms(&self) -> &[Atom<T>] {
        &self.atoms
    }

    /// Iterate over the values in order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.atoms.iter().map(Atom::value)
    }

    /// Whether `id` has been removed.
    #[must_use]
    pub fn is_removed(&self, id: &Ident) -> bool {
        self.removed.contains(id)
    }

    /// Number of removed identifiers remembered.
    #[must_use]
    pub fn tombstone_count(&self) -> usize {
        self.removed.len()
    }

    /// Position of the atom with exactly this identifier.
    #[must_use]
    pub fn position(&self, id: &Ident) -> Option<usize> {
        let pos = self.bisect_left(id);
        (pos < self.atoms.len() && self.atoms[pos].id() == id).then_some(pos)
    }

    /// First position whose identifier is not less than `id`.
    fn bisect_left(&self, id: &Ident) -> usize {
        self.atoms.partition_point(|atom| atom.id() < id)
    }

    /// First position whose identifier is greater than `id`.
    fn bisect_right(&self, id: &Ident) -> usize {
        self.atoms.partition_point(|atom| atom.id() <= id)
    }
}

impl<T: Clone> Replicated for Sequence<T> {
    type Value = T;

    fn replica_id(&self) -> &str {
        &self.replica_id
    }

    fn apply_op(&mut self, op: Operation<T>) -> Result<Applied> {
        Ok(self.apply(op))
    }

    fn snapshot(&self) -> Snapshot<T> {
        Sequence::snapshot(self)
    }
}
