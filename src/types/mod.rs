//! Core types for the snapshot engine.

pub mod record;
pub mod snapshot;

pub use record::{AuthorId, ContentRecord, RecordId, RecordRef, SnapshotEvent, Versioned};
pub use snapshot::{
    DraftError, ItemId, ItemSource, Origin, Snapshot, SnapshotDraft, SnapshotId, SnapshotItem,
    MESSAGE_MAX_LEN,
};
