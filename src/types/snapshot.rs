//! Snapshot and snapshot item models.
//!
//! A [`Snapshot`] records one change. It owns an ordered list of
//! [`SnapshotItem`]s, one per implicated record, in causal order:
//! origin first (or the synthetic event standing in for it), owner last.
//!
//! Snapshots are assembled as a [`SnapshotDraft`] and handed to a store,
//! which persists the header and every item as one unit of work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::{AuthorId, RecordId, RecordRef};
use crate::fingerprint::FINGERPRINT_LEN;

/// Database identifier of a snapshot.
pub type SnapshotId = u64;

/// Database identifier of a snapshot item.
pub type ItemId = u64;

/// Maximum stored message length (`VARCHAR(255)`).
pub const MESSAGE_MAX_LEN: usize = 255;

/// One record's participation in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotItem {
    /// Item id.
    pub id: ItemId,
    /// Owning snapshot.
    pub snapshot_id: SnapshotId,
    /// The captured record.
    pub object: RecordRef,
    /// Version of the record at capture time.
    pub version: u32,
    /// Fingerprint of `object`.
    pub object_hash: String,
}

impl SnapshotItem {
    /// Hydrate an item from a record reference and its current version.
    pub fn hydrate(id: ItemId, snapshot_id: SnapshotId, object: RecordRef, version: u32) -> Self {
        let object_hash = object.fingerprint();
        Self {
            id,
            snapshot_id,
            object,
            version,
            object_hash,
        }
    }

    /// Whether this item captures the given record.
    pub fn captures(&self, record: &RecordRef) -> bool {
        self.object.id == record.id && self.object.record_type == record.record_type
    }
}

/// A persisted snapshot with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot id.
    pub id: SnapshotId,
    /// The record this snapshot is about.
    pub origin: RecordRef,
    /// Fingerprint of `origin`, used for lookups.
    pub origin_hash: String,
    /// Description of the change.
    pub message: String,
    /// Acting author, `None` when anonymous.
    pub author_id: Option<AuthorId>,
    /// Items in insertion order.
    pub items: Vec<SnapshotItem>,
    /// Creation time.
    pub created: DateTime<Utc>,
    /// Last modification time.
    pub last_edited: DateTime<Utc>,
}

impl Snapshot {
    /// Recompute the origin fingerprint from the origin reference.
    ///
    /// Stores call this immediately before writing the header.
    pub fn refresh_origin_hash(&mut self) {
        self.origin_hash = self.origin.fingerprint();
    }

    /// The item that captures the origin, if any.
    pub fn origin_item(&self) -> Option<&SnapshotItem> {
        self.items.iter().find(|item| item.object_hash == self.origin_hash)
    }

    /// The last item, which is always the owner of the change.
    pub fn owner_item(&self) -> Option<&SnapshotItem> {
        self.items.last()
    }

    /// Date shown for this snapshot.
    pub fn date(&self) -> DateTime<Utc> {
        self.last_edited
    }

    /// Whether no author was recorded.
    pub fn is_anonymous(&self) -> bool {
        self.author_id.is_none()
    }
}

/// The resolved origin of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Origin {
    /// A real stored record.
    Record(RecordRef),
    /// A synthetic event, created by the store when the snapshot is committed.
    SyntheticEvent {
        /// Event title.
        title: String,
    },
}

impl Origin {
    /// Whether this origin is a synthetic event.
    pub fn is_synthetic(&self) -> bool {
        matches!(self, Self::SyntheticEvent { .. })
    }
}

/// Where an item's record comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemSource {
    /// An existing record at the given version.
    Record {
        /// Captured record.
        record: RecordRef,
        /// Version at capture time.
        version: u32,
    },
    /// The synthetic event created for this snapshot's origin.
    OriginEvent,
}

/// Validation failure of a snapshot draft.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    /// Message exceeds the stored column width.
    #[error("Message is {len} characters, maximum is {max}")]
    MessageTooLong {
        /// Actual length in characters.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },
    /// A snapshot needs at least its owner item.
    #[error("Snapshot has no items")]
    NoItems,
    /// An item refers to a synthetic event that the origin does not create.
    #[error("Item refers to an origin event but the origin is {0}")]
    DanglingOriginEvent(RecordRef),
    /// Record type name is empty.
    #[error("Record {0} has an empty type name")]
    EmptyRecordType(RecordId),
}

/// A fully resolved snapshot ready to be committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDraft {
    /// Resolved origin.
    pub origin: Origin,
    /// Description of the change.
    pub message: String,
    /// Acting author.
    pub author_id: Option<AuthorId>,
    /// Items in order.
    pub items: Vec<ItemSource>,
}

impl SnapshotDraft {
    /// Check the draft against the persisted record shape.
    pub fn validate(&self) -> Result<(), DraftError> {
        let len = self.message.chars().count();
        if len > MESSAGE_MAX_LEN {
            return Err(DraftError::MessageTooLong {
                len,
                max: MESSAGE_MAX_LEN,
            });
        }

        if self.items.is_empty() {
            return Err(DraftError::NoItems);
        }

        if let Origin::Record(origin) = &self.origin {
            if origin.record_type.is_empty() {
                return Err(DraftError::EmptyRecordType(origin.id));
            }
            if self.items.iter().any(|i| matches!(i, ItemSource::OriginEvent)) {
                return Err(DraftError::DanglingOriginEvent(origin.clone()));
            }
        }

        for item in &self.items {
            if let ItemSource::Record { record, .. } = item {
                if record.record_type.is_empty() {
                    return Err(DraftError::EmptyRecordType(record.id));
                }
            }
        }

        Ok(())
    }
}

/// Check that a stored fingerprint has the expected shape.
pub fn is_well_formed_hash(hash: &str) -> bool {
    hash.len() == FINGERPRINT_LEN && hash.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with_items(origin: RecordRef, items: Vec<(RecordRef, u32)>) -> Snapshot {
        let now = Utc::now();
        let mut snapshot = Snapshot {
            id: 1,
            origin,
            origin_hash: String::new(),
            message: "Saved".to_string(),
            author_id: None,
            items: items
                .into_iter()
                .enumerate()
                .map(|(i, (r, v))| SnapshotItem::hydrate(i as ItemId + 1, 1, r, v))
                .collect(),
            created: now,
            last_edited: now,
        };
        snapshot.refresh_origin_hash();
        snapshot
    }

    #[test]
    fn test_origin_hash_recomputed() {
        let snapshot = snapshot_with_items(RecordRef::new("Page", 5), vec![]);
        assert_eq!(snapshot.origin_hash, RecordRef::new("Page", 5).fingerprint());
        assert!(is_well_formed_hash(&snapshot.origin_hash));
    }

    #[test]
    fn test_origin_item_lookup() {
        let block = RecordRef::new("Block", 2);
        let page = RecordRef::new("Page", 1);
        let snapshot =
            snapshot_with_items(block.clone(), vec![(block.clone(), 3), (page.clone(), 7)]);

        assert_eq!(snapshot.origin_item().map(|i| &i.object), Some(&block));
        assert_eq!(snapshot.owner_item().map(|i| &i.object), Some(&page));
        assert!(snapshot.is_anonymous());
    }

    #[test]
    fn test_item_captures_requires_type_and_id() {
        let item = SnapshotItem::hydrate(1, 1, RecordRef::new("Page", 1), 2);
        assert!(item.captures(&RecordRef::new("Page", 1)));
        assert!(!item.captures(&RecordRef::new("Page", 2)));
        assert!(!item.captures(&RecordRef::new("Block", 1)));
    }

    #[test]
    fn test_draft_validation() {
        let owner = ItemSource::Record {
            record: RecordRef::new("Page", 1),
            version: 1,
        };

        let ok = SnapshotDraft {
            origin: Origin::SyntheticEvent {
                title: "Moved".into(),
            },
            message: "Moved".into(),
            author_id: None,
            items: vec![ItemSource::OriginEvent, owner.clone()],
        };
        assert_eq!(ok.validate(), Ok(()));

        let too_long = SnapshotDraft {
            message: "x".repeat(MESSAGE_MAX_LEN + 1),
            ..ok.clone()
        };
        assert!(matches!(too_long.validate(), Err(DraftError::MessageTooLong { .. })));

        let empty = SnapshotDraft {
            items: vec![],
            ..ok.clone()
        };
        assert_eq!(empty.validate(), Err(DraftError::NoItems));

        let dangling = SnapshotDraft {
            origin: Origin::Record(RecordRef::new("Page", 1)),
            ..ok
        };
        assert!(matches!(dangling.validate(), Err(DraftError::DanglingOriginEvent(_))));
    }
}
