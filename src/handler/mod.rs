//! Event adapters.
//!
//! Each handler turns a channel-specific event into an owner, an optional
//! origin, a message and extra records, then hands them to the
//! [`SnapshotBuilder`](crate::builder::SnapshotBuilder).
//!
//! - Action-style handlers ([`form::ActionHandler`], [`graphql::MutationHandler`])
//!   build unconditionally; the action itself is the signal.
//! - Save-style handlers ([`form::SaveHandler`], [`model::ModelWriteHandler`])
//!   ask the [`DecisionEngine`](crate::decision::DecisionEngine) first.

pub mod dispatch;
pub mod form;
pub mod graphql;
pub mod model;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::builder::SnapshotError;
use crate::types::{ContentRecord, Snapshot};

/// Channel a change event arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    /// CMS form submission.
    Form,
    /// GraphQL mutation.
    GraphQl,
    /// Direct model write.
    ModelWrite,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Form => write!(f, "form"),
            Self::GraphQl => write!(f, "graphql"),
            Self::ModelWrite => write!(f, "model_write"),
        }
    }
}

/// A change event as seen by handlers.
#[derive(Clone)]
pub struct ListenerContext {
    /// Action key (e.g. `"publish"`, `"save"`, `"create"`).
    pub action: String,
    /// Channel the event arrived on.
    pub channel: Channel,
    /// Record the action was performed on.
    pub record: Option<Arc<dyn ContentRecord>>,
    /// Page the editor was on when the action happened.
    pub current_page: Option<Arc<dyn ContentRecord>>,
    /// Further records implicated by the change.
    pub extra_objects: Vec<Arc<dyn ContentRecord>>,
}

impl ListenerContext {
    /// Create a context for an action on a channel.
    pub fn new(channel: Channel, action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            channel,
            record: None,
            current_page: None,
            extra_objects: Vec::new(),
        }
    }

    /// Set the record acted on.
    pub fn with_record(mut self, record: Arc<dyn ContentRecord>) -> Self {
        self.record = Some(record);
        self
    }

    /// Set the current page.
    pub fn with_current_page(mut self, page: Arc<dyn ContentRecord>) -> Self {
        self.current_page = Some(page);
        self
    }

    /// Add an implicated record.
    pub fn with_extra_object(mut self, record: Arc<dyn ContentRecord>) -> Self {
        self.extra_objects.push(record);
        self
    }

    /// Extra records as trait object references.
    pub fn extra_refs(&self) -> Vec<&dyn ContentRecord> {
        self.extra_objects.iter().map(|r| r.as_ref()).collect()
    }
}

impl fmt::Debug for ListenerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerContext")
            .field("action", &self.action)
            .field("channel", &self.channel)
            .field("record", &self.record.as_ref().and_then(|r| r.record_ref()))
            .field("current_page", &self.current_page.as_ref().and_then(|r| r.record_ref()))
            .field("extra_objects", &self.extra_objects.len())
            .finish()
    }
}

/// A snapshot-creating event handler.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle an event, returning the snapshot if one was created.
    async fn fire(&self, context: &ListenerContext) -> Result<Option<Snapshot>, SnapshotError>;
}

pub use dispatch::SnapshotDispatcher;
pub use form::{ActionHandler, SaveHandler};
pub use graphql::MutationHandler;
pub use model::ModelWriteHandler;

#[cfg(test)]
pub(crate) mod fixtures {
    //! Records shared by handler tests.

    use crate::types::{ContentRecord, RecordId, Versioned};

    pub struct TestRecord {
        pub record_type: &'static str,
        pub id: Option<RecordId>,
        pub version: u32,
        pub modified: bool,
        pub versioned: bool,
    }

    impl TestRecord {
        pub fn versioned(
            record_type: &'static str,
            id: RecordId,
            version: u32,
            modified: bool,
        ) -> Self {
            Self {
                record_type,
                id: Some(id),
                version,
                modified,
                versioned: true,
            }
        }

        pub fn plain(record_type: &'static str, id: RecordId) -> Self {
            Self {
                record_type,
                id: Some(id),
                version: 0,
                modified: false,
                versioned: false,
            }
        }
    }

    impl Versioned for TestRecord {
        fn is_modified_on_draft(&self) -> bool {
            self.modified
        }

        fn current_version(&self) -> u32 {
            self.version
        }
    }

    impl ContentRecord for TestRecord {
        fn base_type(&self) -> &str {
            self.record_type
        }

        fn record_id(&self) -> Option<RecordId> {
            self.id
        }

        fn versioning(&self) -> Option<&dyn Versioned> {
            self.versioned.then_some(self as &dyn Versioned)
        }
    }
}
