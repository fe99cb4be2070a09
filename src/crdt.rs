use crate::error::Result;
use crate::op::{Applied, Operation};
use crate::snapshot::Snapshot;

/// Core trait for operation-based replicated sequences.
///
/// Replicas exchange [`Operation`]s rather than whole states. Delivery may be
/// out of order and may repeat; implementations guarantee that any two
/// replicas which have applied the same set of operations hold the same
/// visible sequence.
///
/// # Properties
///
/// All implementations must satisfy:
/// - **Commutativity:** applying `a` then `b` equals applying `b` then `a`
/// - **Idempotency:** applying `a` twice equals applying it once
/// - **Snapshot equivalence:** a replica built from `snapshot()` answers every
///   later operation the same way as the replica that took it
pub trait Replicated {
    /// Element type carried by operations.
    type Value: Clone;

    /// Name of the local replica.
    fn replica_id(&self) -> &str;

    /// Apply a local or remote operation.
    fn apply_op(&mut self, op: Operation<Self::Value>) -> Result<Applied>;

    /// Full state for a replica that is joining late.
    fn snapshot(&self) -> Snapshot<Self::Value>;
}
