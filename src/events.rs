//! Change notifications.
//!
//! Every sequence owns an [`Events`] registry with one listener list per kind
//! of change. Listeners are plain closures; the `on_local_*` variants wrap a
//! listener in a filter that only passes changes whose originating replica is
//! this one, which is what a transport uses to decide what to re-broadcast.
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use kseq::Sequence;
//!
//! let mut list = Sequence::<char>::new("alice");
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! list.events_mut().on_added(move |event| sink.lock().unwrap().push(event.value));
//!
//! list.push('x');
//! assert_eq!(*seen.lock().unwrap(), vec!['x']);
//! ```

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// Handle returned by registration, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subscription(u64);

/// Events that know which replica caused them.
pub trait Originated {
    /// Replica whose operation caused the change.
    fn origin(&self) -> &str;
}

/// A value appeared at `index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Added<T> {
    /// Position of the new value.
    pub index: usize,
    /// The value.
    pub value: T,
    /// Replica that produced the insert.
    pub origin: String,
}

/// The value at `index` went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removed<T> {
    /// Position the value occupied.
    pub index: usize,
    /// The value.
    pub value: T,
    /// Replica that produced the remove.
    pub origin: String,
}

/// The record at `index` was replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replaced<T> {
    /// Position of the record before the replace.
    pub index: usize,
    /// Value before.
    pub old: T,
    /// Value after.
    pub new: T,
    /// Replica that produced the set.
    pub origin: String,
}

/// A replaced record changed position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Moved<T> {
    /// Old position.
    pub from: usize,
    /// New position.
    pub to: usize,
    /// The record at its new position.
    pub value: T,
    /// Replica that produced the set.
    pub origin: String,
}

macro_rules! originated {
    ($($event:ident),*) => {$(
        impl<T> Originated for $event<T> {
            fn origin(&self) -> &str {
                &self.origin
            }
        }
    )*};
}

originated!(Added, Removed, Replaced, Moved);

type Listener<E> = Box<dyn FnMut(&E) + Send>;

struct Listeners<E> {
    entries: Vec<(Subscription, Listener<E>)>,
}

impl<E> Listeners<E> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, id: Subscription, listener: Listener<E>) {
        self.entries.push((id, listener));
    }

    fn remove(&mut self, id: Subscription) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    fn emit(&mut self, event: &E) {
        for (_, listener) in &mut self.entries {
            listener(event);
        }
    }
}

fn local_only<E: Originated + 'static>(
    replica: String,
    mut listener: impl FnMut(&E) + Send + 'static,
) -> impl FnMut(&E) + Send + 'static {
    move |event: &E| {
        if event.origin() == replica {
            listener(event);
        }
    }
}

/// Listener registry for one sequence.
pub struct Events<T> {
    replica_id: String,
    next: u64,
    added: Listeners<Added<T>>,
    removed: Listeners<Removed<T>>,
    replaced: Listeners<Replaced<T>>,
    moved: Listeners<Moved<T>>,
    count: Listeners<usize>,
}

impl<T> fmt::Debug for Events<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Events")
            .field("replica_id", &self.replica_id)
            .field("added", &self.added.entries.len())
            .field("removed", &self.removed.entries.len())
            .field("replaced", &self.replaced.entries.len())
            .field("moved", &self.moved.entries.len())
            .field("count", &self.count.entries.len())
            .finish()
    }
}

impl<T> Events<T> {
    /// Empty registry for the given replica.
    pub fn new(replica_id: impl Into<String>) -> Self {
        Self {
            replica_id: replica_id.into(),
            next: 0,
            added: Listeners::new(),
            removed: Listeners::new(),
            replaced: Listeners::new(),
            moved: Listeners::new(),
            count: Listeners::new(),
        }
    }

    /// Drop a listener. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        self.added.remove(subscription)
            || self.removed.remove(subscription)
            || self.replaced.remove(subscription)
            || self.moved.remove(subscription)
            || self.count.remove(subscription)
    }
}

impl<T: 'static> Events<T> {
    fn subscription(&mut self) -> Subscription {
        self.next += 1;
        Subscription(self.next)
    }

    /// Listen for inserted values.
    pub fn on_added(&mut self, listener: impl FnMut(&Added<T>) + Send + 'static) -> Subscription {
        let id = self.subscription();
        self.added.push(id, Box::new(listener));
        id
    }

    /// Listen for values inserted by this replica.
    pub fn on_local_added(
        &mut self,
        listener: impl FnMut(&Added<T>) + Send + 'static,
    ) -> Subscription {
        let filtered = local_only(self.replica_id.clone(), listener);
        self.on_added(filtered)
    }

    /// Listen for removed values.
    pub fn on_removed(
        &mut self,
        listener: impl FnMut(&Removed<T>) + Send + 'static,
    ) -> Subscription {
        let id = self.subscription();
        self.removed.push(id, Box::new(listener));
        id
    }

    /// Listen for values removed by this replica.
    pub fn on_local_removed(
        &mut self,
        listener: impl FnMut(&Removed<T>) + Send + 'static,
    ) -> Subscription {
        let filtered = local_only(self.replica_id.clone(), listener);
        self.on_removed(filtered)
    }

    /// Listen for replaced records.
    pub fn on_replaced(
        &mut self,
        listener: impl FnMut(&Replaced<T>) + Send + 'static,
    ) -> Subscription {
        let id = self.subscription();
        self.replaced.push(id, Box::new(listener));
        id
    }

    /// Listen for records replaced by this replica.
    pub fn on_local_replaced(
        &mut self,
        listener: impl FnMut(&Replaced<T>) + Send + 'static,
    ) -> Subscription {
        let filtered = local_only(self.replica_id.clone(), listener);
        self.on_replaced(filtered)
    }

    /// Listen for records that changed position because of a replace.
    pub fn on_moved(&mut self, listener: impl FnMut(&Moved<T>) + Send + 'static) -> Subscription {
        let id = self.subscription();
        self.moved.push(id, Box::new(listener));
        id
    }

    /// Listen for moves caused by this replica's replaces.
    pub fn on_local_moved(
        &mut self,
        listener: impl FnMut(&Moved<T>) + Send + 'static,
    ) -> Subscription {
        let filtered = local_only(self.replica_id.clone(), listener);
        self.on_moved(filtered)
    }

    /// Listen for changes to the number of values.
    pub fn on_count_changed(
        &mut self,
        listener: impl FnMut(&usize) + Send + 'static,
    ) -> Subscription {
        let id = self.subscription();
        self.count.push(id, Box::new(listener));
        id
    }
}

// Emission clones values only when someone is listening.
impl<T: Clone> Events<T> {
    pub(crate) fn added(&mut self, index: usize, value: &T, origin: &str) {
        if !self.added.is_empty() {
            self.added.emit(&Added {
                index,
                value: value.clone(),
                origin: origin.into(),
            });
        }
    }

    pub(crate) fn removed(&mut self, index: usize, value: &T, origin: &str) {
        if !self.removed.is_empty() {
            self.removed.emit(&Removed {
                index,
                value: value.clone(),
                origin: origin.into(),
            });
        }
    }

    pub(crate) fn replaced(&mut self, index: usize, old: &T, new: &T, origin: &str) {
        if !self.replaced.is_empty() {
            self.replaced.emit(&Replaced {
                index,
                old: old.clone(),
                new: new.clone(),
                origin: origin.into(),
            });
        }
    }

    pub(crate) fn moved(&mut self, from: usize, to: usize, value: &T, origin: &str) {
        if !self.moved.is_empty() {
            self.moved.emit(&Moved {
                from,
                to,
                value: value.clone(),
                origin: origin.into(),
            });
        }
    }

    pub(crate) fn count_changed(&mut self, count: usize) {
        self.count.emit(&count);
    }
}
