//! Hosted replication sessions.
//!
//! A [`Session`] owns the authoritative host replica for one shared sequence
//! and the names of the peers attached to it. The transport feeds every
//! operation a peer sends through [`Session::relay`], which applies it to the
//! host and reports who else must receive it. Peers that attach late get a
//! [`Snapshot`] from [`Session::join`].
//!
//! Sessions are kept in a [`Registry`] the server constructs and owns.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::String;
use alloc::vec::Vec;

use tracing::{debug, info};

use crate::crdt::Replicated;
use crate::error::{Error, Result};
use crate::op::{Applied, Operation};
use crate::snapshot::Snapshot;

/// An operation accepted by the host and the peers it must be forwarded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relay<T> {
    /// The operation as received.
    pub op: Operation<T>,
    /// What applying it did to the host replica.
    pub applied: Applied,
    /// Every member except the sender.
    pub recipients: Vec<String>,
}

/// One shared sequence and its members.
#[derive(Debug)]
pub struct Session<R> {
    id: String,
    host: R,
    members: BTreeSet<String>,
}

impl<R: Replicated> Session<R> {
    /// Host `host` under the given session id with no members.
    pub fn new(id: impl Into<String>, host: R) -> Self {
        Self {
            id: id.into(),
            host,
            members: BTreeSet::new(),
        }
    }

    /// Session id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The authoritative replica.
    #[must_use]
    pub fn host(&self) -> &R {
        &self.host
    }

    /// Mutable access to the host replica, for edits made by the server itself.
    pub fn host_mut(&mut self) -> &mut R {
        &mut self.host
    }

    /// Attached peers, in name order.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(String::as_str)
    }

    /// Whether `peer` is attached.
    #[must_use]
    pub fn is_member(&self, peer: &str) -> bool {
        self.members.contains(peer)
    }

    /// Attach `peer` and hand it the host's current state.
    pub fn join(&mut self, peer: impl Into<String>) -> Snapshot<R::Value> {
        let peer = peer.into();
        info!(session = %self.id, %peer, "peer joined");
        self.members.insert(peer);
        self.host.snapshot()
    }

    /// Detach `peer`. Returns `false` if it was not attached.
    pub fn leave(&mut self, peer: &str) -> bool {
        let left = self.members.remove(peer);
        if left {
            info!(session = %self.id, %peer, "peer left");
        }
        left
    }

    /// Apply an operation sent by `from` to the host and compute its fan-out.
    pub fn relay(&mut self, from: &str, op: Operation<R::Value>) -> Result<Relay<R::Value>> {
        let applied = self.host.apply_op(op.clone())?;
        let recipients: Vec<String> = self
            .members
            .iter()
            .filter(|member| member.as_str() != from)
            .cloned()
            .collect();
        debug!(
            session = %self.id,
            %from,
            ?applied,
            recipients = recipients.len(),
            "relayed operation"
        );
        Ok(Relay {
            op,
            applied,
            recipients,
        })
    }
}

/// All live sessions of one server.
#[derive(Debug)]
pub struct Registry<R> {
    sessions: BTreeMap<String, Session<R>>,
}

impl<R> Default for Registry<R> {
    fn default() -> Self {
        Self {
            sessions: BTreeMap::new(),
        }
    }
}

impl<R: Replicated> Registry<R> {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session hosted by `host`.
    pub fn open(&mut self, id: impl Into<String>, host: R) -> Result<&mut Session<R>> {
        let id = id.into();
        if self.sessions.contains_key(&id) {
            return Err(Error::SessionExists { id });
        }
        info!(session = %id, host = %host.replica_id(), "session opened");
        Ok(self
            .sessions
            .entry(id.clone())
            .or_insert_with(|| Session::new(id, host)))
    }

    /// Look up a session.
    pub fn get(&self, id: &str) -> Result<&Session<R>> {
        self.sessions
            .get(id)
            .ok_or_else(|| Error::UnknownSession { id: id.into() })
    }

    /// Look up a session for modification.
    pub fn get_mut(&mut self, id: &str) -> Result<&mut Session<R>> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| Error::UnknownSession { id: id.into() })
    }

    /// End a session, returning it so the caller can take its final state.
    pub fn close(&mut self, id: &str) -> Result<Session<R>> {
        let session = self
            .sessions
            .remove(id)
            .ok_or_else(|| Error::UnknownSession { id: id.into() })?;
        info!(session = %id, members = session.members.len(), "session closed");
        Ok(session)
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Ids of the live sessions.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::sequence::Sequence;

    fn host() -> Sequence<&'static str> {
        Sequence::with_config(Config::new("_").with_seed(5)).unwrap()
    }

    #[test]
    fn open_rejects_duplicate_ids() {
        let mut registry = Registry::new();
        registry.open("g1", host()).unwrap();
        let err = registry.open("g1", host()).unwrap_err();
        assert_eq!(err, Error::SessionExists { id: "g1".into() });
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_session_is_an_error() {
        let mut registry = Registry::<Sequence<&str>>::new();
        assert!(matches!(registry.get("nope"), Err(Error::UnknownSession { .. })));
        assert!(registry.get_mut("nope").is_err());
        assert!(registry.close("nope").is_err());
    }

    #[test]
    fn relay_fans_out_to_other_members() {
        let mut registry = Registry::new();
        let session = registry.open("g1", host()).unwrap();
        session.join("alice");
        session.join("bob");
        session.join("carol");

        let mut alice = Sequence::new("alice");
        let op = alice.push("hi");
        let relay = session.relay("alice", op).unwrap();

        assert_eq!(relay.applied, Applied::Inserted { index: 0 });
        assert_eq!(relay.recipients, vec!["bob", "carol"]);
        assert_eq!(session.host().to_vec(), vec!["hi"]);
    }

    #[test]
    fn late_joiner_gets_host_state() {
        let mut registry = Registry::new();
        let session = registry.open("g1", host()).unwrap();
        session.host_mut().push("a");
        session.host_mut().push("b");
        session.host_mut().remove_at(0);

        let snapshot = session.join("dave");
        let dave = Sequence::from_snapshot(Config::new("dave"), snapshot).unwrap();
        assert_eq!(dave.to_vec(), vec!["b"]);
        assert_eq!(dave.tombstone_count(), 1);
    }

    #[test]
    fn leave_and_close() {
        let mut registry = Registry::new();
        registry.open("g1", host()).unwrap().join("alice");
        registry.open("g2", host()).unwrap();
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["g1", "g2"]);

        let session = registry.get_mut("g1").unwrap();
        assert!(session.leave("alice"));
        assert!(!session.leave("alice"));
        assert!(!session.is_member("alice"));

        let closed = registry.close("g1").unwrap();
        assert_eq!(closed.id(), "g1");
        assert_eq!(registry.len(), 1);
    }
}
