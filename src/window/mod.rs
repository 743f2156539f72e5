//! Live window: bounded, deduplicated, age-windowed record retention with
//! identity-preserving merges.

pub mod record;
pub mod store;

pub use record::{RecordRef, RowSet, StreamRecord, TxKind, TxRecord, TxStatus};
pub use store::{LiveWindowStore, Snapshot, SnapshotOptions};
