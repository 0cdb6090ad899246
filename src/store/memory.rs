//! In-memory snapshot store for testing and embedding.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::SnapshotStore;
use crate::types::{
    DraftError, ItemId, ItemSource, Origin, RecordId, RecordRef, Snapshot, SnapshotDraft,
    SnapshotEvent, SnapshotId, SnapshotItem,
};

/// Error type for in-memory store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InMemoryError {
    /// Draft rejected before anything was written.
    #[error("Validation failed: {0}")]
    Validation(#[from] DraftError),
    /// Snapshot not found.
    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(SnapshotId),
}

#[derive(Debug, Default)]
struct Inner {
    snapshots: BTreeMap<SnapshotId, Snapshot>,
    events: BTreeMap<RecordId, SnapshotEvent>,
    next_snapshot_id: SnapshotId,
    next_item_id: ItemId,
    next_event_id: RecordId,
}

impl Inner {
    fn allocate_snapshot_id(&mut self) -> SnapshotId {
        self.next_snapshot_id += 1;
        self.next_snapshot_id
    }

    fn allocate_item_id(&mut self) -> ItemId {
        self.next_item_id += 1;
        self.next_item_id
    }

    fn allocate_event_id(&mut self) -> RecordId {
        self.next_event_id += 1;
        self.next_event_id
    }
}

/// In-memory snapshot store.
///
/// Uses BTreeMap for deterministic iteration order. Each commit holds the
/// write lock for its whole duration, so a half-written snapshot is never
/// observable.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    inner: RwLock<Inner>,
}

impl InMemorySnapshotStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots.
    pub fn num_snapshots(&self) -> usize {
        self.inner.read().snapshots.len()
    }

    /// Number of stored items across all snapshots.
    pub fn num_items(&self) -> usize {
        self.inner.read().snapshots.values().map(|s| s.items.len()).sum()
    }

    /// Number of stored synthetic events.
    pub fn num_events(&self) -> usize {
        self.inner.read().events.len()
    }

    /// All snapshots, ordered by id.
    pub fn all_snapshots(&self) -> Vec<Snapshot> {
        self.inner.read().snapshots.values().cloned().collect()
    }

    /// Override a snapshot's last-edited time.
    ///
    /// Used when importing history or pinning fixtures.
    pub fn touch_snapshot(&self, id: SnapshotId, at: DateTime<Utc>) -> Result<(), InMemoryError> {
        let mut inner = self.inner.write();
        let snapshot = inner
            .snapshots
            .get_mut(&id)
            .ok_or(InMemoryError::SnapshotNotFound(id))?;
        snapshot.last_edited = at;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    type Error = InMemoryError;

    async fn latest_snapshot_for_origin(
        &self,
        origin: &RecordRef,
    ) -> Result<Option<Snapshot>, Self::Error> {
        let inner = self.inner.read();
        Ok(inner
            .snapshots
            .values()
            .filter(|s| s.origin.id == origin.id && s.origin.record_type == origin.record_type)
            .max_by(|a, b| {
                a.last_edited
                    .cmp(&b.last_edited)
                    .then_with(|| a.id.cmp(&b.id))
            })
            .cloned())
    }

    async fn commit_snapshot(&self, draft: SnapshotDraft) -> Result<Snapshot, Self::Error> {
        draft.validate()?;

        let mut inner = self.inner.write();
        let now = Utc::now();

        let (origin, event_ref) = match draft.origin {
            Origin::Record(record) => (record, None),
            Origin::SyntheticEvent { title } => {
                let event = SnapshotEvent {
                    id: inner.allocate_event_id(),
                    title,
                    created: now,
                };
                let event_ref = event.event_ref();
                inner.events.insert(event.id, event);
                (event_ref.clone(), Some(event_ref))
            }
        };

        let snapshot_id = inner.allocate_snapshot_id();
        let mut snapshot = Snapshot {
            id: snapshot_id,
            origin,
            origin_hash: String::new(),
            message: draft.message,
            author_id: draft.author_id,
            items: Vec::with_capacity(draft.items.len()),
            created: now,
            last_edited: now,
        };
        snapshot.refresh_origin_hash();

        for source in draft.items {
            let (record, version) = match source {
                ItemSource::Record { record, version } => (record, version),
                // validate() guarantees the event exists here
                ItemSource::OriginEvent => match &event_ref {
                    Some(event) => (event.clone(), SnapshotEvent::VERSION),
                    None => continue,
                },
            };
            let item_id = inner.allocate_item_id();
            snapshot
                .items
                .push(SnapshotItem::hydrate(item_id, snapshot_id, record, version));
        }

        inner.snapshots.insert(snapshot_id, snapshot.clone());
        Ok(snapshot)
    }

    async fn get_snapshot(&self, id: SnapshotId) -> Result<Option<Snapshot>, Self::Error> {
        Ok(self.inner.read().snapshots.get(&id).cloned())
    }

    async fn snapshots_for_origin(&self, origin: &RecordRef) -> Result<Vec<Snapshot>, Self::Error> {
        let hash = origin.fingerprint();
        Ok(self
            .inner
            .read()
            .snapshots
            .values()
            .filter(|s| s.origin_hash == hash)
            .cloned()
            .collect())
    }

    async fn delete_snapshot(&self, id: SnapshotId) -> Result<bool, Self::Error> {
        Ok(self.inner.write().snapshots.remove(&id).is_some())
    }

    async fn get_event(&self, id: RecordId) -> Result<Option<SnapshotEvent>, Self::Error> {
        Ok(self.inner.read().events.get(&id).cloned())
    }
}
