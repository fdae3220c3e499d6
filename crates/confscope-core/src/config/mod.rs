//! Scoped configuration synchronization.
//!
//! [`ConfigurationManager`] serializes cascading updates per namespace,
//! tracks per-scope snapshots of the sections it reads and attributes each
//! observed change to the scope it came from.

pub mod fingerprint;
pub mod lock;
pub mod manager;
pub mod snapshot;

pub use fingerprint::{Fingerprint, fingerprint, is_empty_value};
pub use lock::{BusyGuard, NamespaceLock};
pub use manager::{CascadeReport, ChangeSubscription, ConfigurationManager, UpdateOutcome};
pub use snapshot::{ChangeAttribution, SectionSnapshot};
