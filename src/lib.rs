//! # kseq
//!
//! Replicated ordered sequences for real-time collaboration.
//!
//! A [`Sequence`] is an operation-based CRDT: every element lives under a
//! dense, totally ordered [`Ident`] allocated with the LSEQ strategy, and
//! removals leave tombstones. Replicas exchange [`Operation`]s over whatever
//! transport they like; operations may arrive late, out of order or twice,
//! and every replica that has seen the same operations shows the same list.
//!
//! A [`RecordCollection`] layers record identity on top. Records can be
//! replaced in place, concurrent replaces resolve to the one with the
//! smaller identifier, and a replace that overtakes its record's insert is
//! queued until the insert arrives.
//!
//! ## Quick Start
//!
//! ```
//! use kseq::prelude::*;
//!
//! let mut alice = Sequence::new("alice");
//! let mut bob = Sequence::new("bob");
//!
//! let hello = alice.push("hello");
//! let world = bob.push("world");
//!
//! alice.apply(world);
//! bob.apply(hello);
//!
//! assert_eq!(alice.to_vec(), bob.to_vec());
//! assert_eq!(alice.len(), 2);
//! ```
//!
//! ## Building blocks
//!
//! - [`Ident`] / [`Segment`] - position identifiers and their total order
//! - [`PositionGenerator`] - LSEQ allocation between two neighbours
//! - [`Sequence`] - insert, remove and apply with tombstones
//! - [`RecordCollection`] - records with ids, replace, queued sets
//! - [`Events`] - change notifications, optionally filtered to local changes
//! - [`Registry`] / [`Session`] - a host replica relaying operations to peers
//!
//! ## The `Replicated` Trait
//!
//! Both sequence types implement [`Replicated`], the surface a transport or a
//! [`Session`] needs: apply an operation, take a snapshot.
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events and never installs a subscriber.

#![warn(missing_docs)]

extern crate alloc;

mod atom;
mod collection;
mod crdt;
mod error;
mod ident;
mod op;
mod record;
mod sequence;
mod snapshot;

pub mod clock;
pub mod config;
pub mod events;
pub mod generator;
pub mod prelude;
pub mod session;

pub use atom::Atom;
pub use clock::WallClock;
pub use collection::RecordCollection;
pub use config::{Config, GeneratorConfig};
pub use crdt::Replicated;
pub use error::{Error, Result};
pub use events::{Events, Subscription};
pub use generator::{PositionGenerator, Strategy};
pub use ident::{Ident, Segment};
pub use op::{Applied, OpKind, Operation};
pub use record::{replica_prefix, IdAllocator, Record, RecordId};
pub use sequence::Sequence;
pub use session::{Registry, Relay, Session};
pub use snapshot::Snapshot;
