//! Persistence layer: tree snapshots on disk.

pub mod serialization;
pub mod snapshot;

pub use serialization::{NestedSnapshot, NodeRecord, SnapshotFormat, TreeSnapshot};
pub use snapshot::SnapshotStore;
