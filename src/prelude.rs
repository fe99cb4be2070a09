//! Convenient re-exports for common usage.
//!
//! ```
//! use kseq::prelude::*;
//! ```

pub use crate::Applied;
pub use crate::Config;
pub use crate::Operation;
pub use crate::Record;
pub use crate::RecordCollection;
pub use crate::RecordId;
pub use crate::Replicated;
pub use crate::Sequence;
pub use crate::Snapshot;
