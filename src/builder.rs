//! Snapshot builder.
//!
//! Turns a change event (owner, optional origin, message, extra records)
//! into a [`SnapshotDraft`] and commits it through a [`SnapshotStore`].
//!
//! ## Origin Resolution
//!
//! | Situation | Origin | Leading item |
//! |-----------|--------|--------------|
//! | origin missing or deleted, message given | new synthetic event | the event |
//! | origin missing or deleted, no message | owner | none |
//! | origin is the owner | owner | none |
//! | distinct stored origin | origin | the origin |
//!
//! The owner is always the last item.

use std::sync::Arc;

use crate::store::SnapshotStore;
use crate::types::{
    AuthorId, ContentRecord, DraftError, ItemSource, Origin, RecordRef, Snapshot, SnapshotDraft,
};

/// Error type for snapshot building.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The draft violates the persisted record shape.
    #[error("Invalid snapshot: {0}")]
    Validation(#[from] DraftError),
    /// Store error.
    #[error("Store error: {0}")]
    StoreError(String),
}

impl SnapshotError {
    /// Create a store error from any error type.
    pub fn from_store<E: std::error::Error>(e: E) -> Self {
        Self::StoreError(e.to_string())
    }
}

/// Source of the acting identity.
pub trait AuthorContext: Send + Sync {
    /// The identity performing the change, `None` when anonymous.
    fn current_acting_identity(&self) -> Option<AuthorId>;
}

/// Author context with no acting identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl AuthorContext for Anonymous {
    fn current_acting_identity(&self) -> Option<AuthorId> {
        None
    }
}

/// Author context that always reports the same identity.
#[derive(Debug, Clone, Copy)]
pub struct FixedAuthor(pub AuthorId);

impl AuthorContext for FixedAuthor {
    fn current_acting_identity(&self) -> Option<AuthorId> {
        // id 0 is the anonymous member
        (self.0 != 0).then_some(self.0)
    }
}

/// Which origin-resolution rule applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// No usable origin; a synthetic event stands in for it.
    SyntheticEvent,
    /// No usable origin and no message; the owner is the origin.
    OwnerFallback,
    /// The origin is the owner itself.
    SameAsOwner,
    /// A distinct stored origin.
    Standard,
}

/// Outcome of origin resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOrigin {
    /// Rule that applied.
    pub resolution: Resolution,
    /// Origin to record.
    pub origin: Origin,
    /// Message to record, possibly suffixed with the deleted origin's type.
    pub message: String,
    /// Item placed before the extra records, if any.
    pub lead: Option<ItemSource>,
}

/// Resolve the origin of a change.
///
/// `owner` must be the stored reference of the owner record.
pub fn resolve_origin(
    owner: &RecordRef,
    origin: Option<&dyn ContentRecord>,
    message: &str,
) -> ResolvedOrigin {
    let stored_origin = origin.and_then(|o| o.record_ref().map(|r| (o, r)));

    match stored_origin {
        None if !message.is_empty() => {
            // the event keeps the bare message; only the snapshot names the deleted type
            let title = message.to_string();
            let message = match origin {
                Some(deleted) => format!("{} {}", message, deleted.singular_name()),
                None => message.to_string(),
            };
            ResolvedOrigin {
                resolution: Resolution::SyntheticEvent,
                origin: Origin::SyntheticEvent { title },
                message,
                lead: Some(ItemSource::OriginEvent),
            }
        }
        None => ResolvedOrigin {
            resolution: Resolution::OwnerFallback,
            origin: Origin::Record(owner.clone()),
            message: message.to_string(),
            lead: None,
        },
        Some((_, origin_ref)) if origin_ref.fingerprint() == owner.fingerprint() => {
            ResolvedOrigin {
                resolution: Resolution::SameAsOwner,
                origin: Origin::Record(owner.clone()),
                message: message.to_string(),
                lead: None,
            }
        }
        Some((record, origin_ref)) => ResolvedOrigin {
            resolution: Resolution::Standard,
            origin: Origin::Record(origin_ref.clone()),
            message: message.to_string(),
            lead: Some(ItemSource::Record {
                record: origin_ref,
                version: record.version(),
            }),
        },
    }
}

/// Builds and persists snapshots.
pub struct SnapshotBuilder<S: SnapshotStore> {
    store: Arc<S>,
    authors: Arc<dyn AuthorContext>,
}

impl<S: SnapshotStore> SnapshotBuilder<S> {
    /// Create a builder over a store with an author context.
    pub fn new(store: Arc<S>, authors: Arc<dyn AuthorContext>) -> Self {
        Self { store, authors }
    }

    /// Create a builder that records every snapshot anonymously.
    pub fn anonymous(store: Arc<S>) -> Self {
        Self::new(store, Arc::new(Anonymous))
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Assemble the draft for a change without writing anything.
    ///
    /// Returns `None` when the owner is not stored.
    pub fn draft(
        &self,
        owner: &dyn ContentRecord,
        origin: Option<&dyn ContentRecord>,
        message: &str,
        objects: &[&dyn ContentRecord],
    ) -> Option<SnapshotDraft> {
        let owner_ref = owner.record_ref()?;
        let resolved = resolve_origin(&owner_ref, origin, message);

        let mut items = Vec::with_capacity(objects.len() + 2);
        items.extend(resolved.lead);
        for object in objects {
            match object.record_ref() {
                Some(record) => items.push(ItemSource::Record {
                    record,
                    version: object.version(),
                }),
                None => tracing::debug!(
                    record_type = object.base_type(),
                    "Skipping unsaved record in snapshot"
                ),
            }
        }
        items.push(ItemSource::Record {
            record: owner_ref,
            version: owner.version(),
        });

        Some(SnapshotDraft {
            origin: resolved.origin,
            message: resolved.message,
            author_id: self.authors.current_acting_identity(),
            items,
        })
    }

    /// Create and persist a snapshot for a change.
    ///
    /// Returns `Ok(None)` without writing anything when the owner is not
    /// stored. Store failures are returned as-is; nothing is retried.
    pub async fn create_snapshot_from_action(
        &self,
        owner: &dyn ContentRecord,
        origin: Option<&dyn ContentRecord>,
        message: &str,
        objects: &[&dyn ContentRecord],
    ) -> Result<Option<Snapshot>, SnapshotError> {
        let Some(draft) = self.draft(owner, origin, message, objects) else {
            tracing::debug!(
                record_type = owner.base_type(),
                "Owner not persisted, no snapshot created"
            );
            return Ok(None);
        };

        draft.validate()?;

        let snapshot = self
            .store
            .commit_snapshot(draft)
            .await
            .map_err(SnapshotError::from_store)?;

        tracing::info!(
            snapshot_id = snapshot.id,
            origin = %snapshot.origin,
            items = snapshot.items.len(),
            author_id = snapshot.author_id.unwrap_or(0),
            "Snapshot created"
        );

        Ok(Some(snapshot))
    }
}
