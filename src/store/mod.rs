//! Snapshot storage backends.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;

use crate::types::{RecordId, RecordRef, Snapshot, SnapshotDraft, SnapshotEvent, SnapshotId};

/// Trait for snapshot storage backends.
///
/// Snapshots returned by a store always carry their items in insertion order.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Error type for store operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Most recent snapshot whose origin is `origin`.
    ///
    /// Ordered by last-edited time descending, then by id descending.
    async fn latest_snapshot_for_origin(
        &self,
        origin: &RecordRef,
    ) -> Result<Option<Snapshot>, Self::Error>;

    /// Persist a draft as one unit of work.
    ///
    /// Creates the synthetic event when the origin is one, writes the header
    /// with a freshly computed origin hash, then every item in order. A failed
    /// commit leaves nothing behind.
    async fn commit_snapshot(&self, draft: SnapshotDraft) -> Result<Snapshot, Self::Error>;

    /// Fetch a snapshot by id.
    async fn get_snapshot(&self, id: SnapshotId) -> Result<Option<Snapshot>, Self::Error>;

    /// All snapshots about `origin`, ordered by id ascending.
    async fn snapshots_for_origin(&self, origin: &RecordRef) -> Result<Vec<Snapshot>, Self::Error>;

    /// Delete a snapshot and all of its items. Returns whether it existed.
    async fn delete_snapshot(&self, id: SnapshotId) -> Result<bool, Self::Error>;

    /// Fetch a synthetic event by id.
    async fn get_event(&self, id: RecordId) -> Result<Option<SnapshotEvent>, Self::Error>;
}

pub use memory::InMemorySnapshotStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresSnapshotStore;
