//! Content record types.
//!
//! The snapshot engine never owns content records. It sees them through the
//! [`ContentRecord`] trait and, for records that carry draft/live versions,
//! through the [`Versioned`] capability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::fingerprint::fingerprint;

/// Database identifier of a content record.
pub type RecordId = u64;

/// Identifier of an acting author.
pub type AuthorId = u64;

/// Reference to a stored record by base type and id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    /// Base type name of the record (e.g. `"Page"`).
    pub record_type: String,
    /// Database id of the record.
    pub id: RecordId,
}

impl RecordRef {
    /// Create a new record reference.
    pub fn new(record_type: impl Into<String>, id: RecordId) -> Self {
        Self {
            record_type: record_type.into(),
            id,
        }
    }

    /// Identity fingerprint of this reference.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.record_type, self.id)
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.record_type, self.id)
    }
}

/// Draft/live versioning capability.
///
/// Callers check for this capability with [`ContentRecord::versioning`]
/// before asking the decision engine anything.
pub trait Versioned: Send + Sync {
    /// Whether the draft stage differs from the published stage.
    fn is_modified_on_draft(&self) -> bool;

    /// Current version number of the record.
    fn current_version(&self) -> u32;
}

/// A record that can take part in a snapshot.
pub trait ContentRecord: Send + Sync {
    /// Base type name used for origin and item references.
    fn base_type(&self) -> &str;

    /// Database id, or `None` when the record is not (or no longer) stored.
    fn record_id(&self) -> Option<RecordId>;

    /// Human readable type name.
    fn singular_name(&self) -> String {
        self.base_type().to_string()
    }

    /// Version captured into snapshot items. Unversioned records report 0.
    fn version(&self) -> u32 {
        self.versioning().map(|v| v.current_version()).unwrap_or(0)
    }

    /// Versioning capability, if the record has one.
    fn versioning(&self) -> Option<&dyn Versioned> {
        None
    }

    /// Whether this record is a synthetic snapshot event.
    fn is_snapshot_event(&self) -> bool {
        false
    }

    /// Whether the record is stored.
    fn is_persisted(&self) -> bool {
        self.record_id().is_some()
    }

    /// Reference to the stored record.
    fn record_ref(&self) -> Option<RecordRef> {
        self.record_id().map(|id| RecordRef::new(self.base_type(), id))
    }
}

/// Surrogate record used as a snapshot origin when no real origin is usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEvent {
    /// Database id.
    pub id: RecordId,
    /// Title, taken from the change message.
    pub title: String,
    /// Creation time.
    pub created: DateTime<Utc>,
}

impl SnapshotEvent {
    /// Base type name of snapshot events.
    pub const RECORD_TYPE: &'static str = "SnapshotEvent";

    /// Version carried by event items. Events are written exactly once.
    pub const VERSION: u32 = 1;

    /// Reference to this event.
    pub fn event_ref(&self) -> RecordRef {
        RecordRef::new(Self::RECORD_TYPE, self.id)
    }
}

impl ContentRecord for SnapshotEvent {
    fn base_type(&self) -> &str {
        Self::RECORD_TYPE
    }

    fn record_id(&self) -> Option<RecordId> {
        Some(self.id)
    }

    fn singular_name(&self) -> String {
        "Snapshot Event".to_string()
    }

    fn version(&self) -> u32 {
        Self::VERSION
    }

    fn is_snapshot_event(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain {
        id: Option<RecordId>,
    }

    impl ContentRecord for Plain {
        fn base_type(&self) -> &str {
            "File"
        }

        fn record_id(&self) -> Option<RecordId> {
            self.id
        }
    }

    #[test]
    fn test_record_ref_display() {
        assert_eq!(RecordRef::new("Page", 3).to_string(), "Page#3");
    }

    #[test]
    fn test_unversioned_defaults() {
        let stored = Plain { id: Some(9) };
        assert_eq!(stored.version(), 0);
        assert!(stored.versioning().is_none());
        assert!(!stored.is_snapshot_event());
        assert_eq!(stored.record_ref(), Some(RecordRef::new("File", 9)));

        let unsaved = Plain { id: None };
        assert!(!unsaved.is_persisted());
        assert!(unsaved.record_ref().is_none());
    }

    #[test]
    fn test_event_is_snapshot_event() {
        let event = SnapshotEvent {
            id: 4,
            title: "Reordered pages".to_string(),
            created: Utc::now(),
        };
        assert!(event.is_snapshot_event());
        assert_eq!(event.version(), SnapshotEvent::VERSION);
        assert_eq!(event.record_ref(), Some(RecordRef::new("SnapshotEvent", 4)));
    }
}
