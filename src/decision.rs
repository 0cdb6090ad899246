//! Snapshot decision engine.
//!
//! Decides whether a save of a versioned record is worth a new snapshot by
//! comparing the record's current version against the version captured in
//! the most recent snapshot about that record.
//!
//! ## Algorithm
//!
//! 1. Draft identical to live → no snapshot
//! 2. No prior snapshot with this record as origin → snapshot
//! 3. Scan that snapshot's items for the record, keeping the highest version
//! 4. Record not found among the items → snapshot
//! 5. Current version newer than the captured one → snapshot
//! 6. Otherwise → no snapshot
//!
//! Records without the [`Versioned`] capability and synthetic events are not
//! handled here; callers fall back to always snapshotting them.

use std::sync::Arc;

use crate::store::SnapshotStore;
use crate::types::{RecordRef, Snapshot, Versioned};

/// Highest version captured for `record` in `snapshot`, or 0 when absent.
pub fn recorded_version(snapshot: &Snapshot, record: &RecordRef) -> u32 {
    snapshot
        .items
        .iter()
        .filter(|item| item.captures(record))
        .map(|item| item.version)
        .fold(0, u32::max)
}

/// Decides whether a change to a versioned record needs a snapshot.
///
/// Read-only: the engine only queries the store.
pub struct DecisionEngine<S: SnapshotStore> {
    store: Arc<S>,
}

impl<S: SnapshotStore> DecisionEngine<S> {
    /// Create a decision engine over a store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Whether `record` has progressed since its last recorded snapshot.
    ///
    /// Never fails. A store error is logged and treated as "snapshot needed".
    pub async fn should_snapshot(&self, record: &RecordRef, state: &dyn Versioned) -> bool {
        if !state.is_modified_on_draft() {
            tracing::debug!(record = %record, "Draft matches live, skipping snapshot");
            return false;
        }

        let latest = match self.store.latest_snapshot_for_origin(record).await {
            Ok(latest) => latest,
            Err(e) => {
                tracing::warn!(
                    record = %record,
                    error = %e,
                    "Snapshot lookup failed, recording snapshot anyway"
                );
                return true;
            }
        };

        let Some(snapshot) = latest else {
            tracing::debug!(record = %record, "No prior snapshot for record");
            return true;
        };

        let version = recorded_version(&snapshot, record);
        if version == 0 {
            tracing::debug!(
                record = %record,
                snapshot_id = snapshot.id,
                "Record not captured in latest snapshot"
            );
            return true;
        }

        let current = state.current_version();
        tracing::trace!(
            record = %record,
            snapshot_id = snapshot.id,
            recorded = version,
            current = current,
            "Comparing versions"
        );
        current > version
    }
}
