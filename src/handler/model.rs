//! Model write handler for model-triggered mode.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Handler, ListenerContext};
use crate::builder::{SnapshotBuilder, SnapshotError};
use crate::config::SnapshotConfig;
use crate::decision::DecisionEngine;
use crate::store::SnapshotStore;
use crate::types::Snapshot;

/// Records a snapshot when a record is written.
///
/// Versioned records only produce a snapshot when the decision engine sees a
/// new version; everything else is always recorded.
pub struct ModelWriteHandler<S: SnapshotStore> {
    builder: Arc<SnapshotBuilder<S>>,
    decision: DecisionEngine<S>,
    config: Arc<SnapshotConfig>,
}

impl<S: SnapshotStore> ModelWriteHandler<S> {
    /// Namespace used for localized messages.
    pub const NAMESPACE: &'static str = "Model";

    /// Create a model write handler.
    pub fn new(builder: Arc<SnapshotBuilder<S>>, config: Arc<SnapshotConfig>) -> Self {
        let decision = DecisionEngine::new(builder.store().clone());
        Self { builder, decision, config }
    }
}

#[async_trait]
impl<S: SnapshotStore + 'static> Handler for ModelWriteHandler<S> {
    async fn fire(&self, context: &ListenerContext) -> Result<Option<Snapshot>, SnapshotError> {
        let Some(record) = context.record.as_deref() else {
            return Ok(None);
        };

        if !record.is_snapshot_event() {
            if let (Some(state), Some(record_ref)) = (record.versioning(), record.record_ref()) {
                if !self.decision.should_snapshot(&record_ref, state).await {
                    tracing::debug!(record = %record_ref, "Write produced no new version");
                    return Ok(None);
                }
            }
        }

        let message = self.config.message_for(Self::NAMESPACE, &context.action);
        self.builder
            .create_snapshot_from_action(record, Some(record), &message, &context.extra_refs())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::fixtures::TestRecord;
    use crate::handler::Channel;
    use crate::store::InMemorySnapshotStore;
    use crate::types::RecordRef;

    #[tokio::test]
    async fn test_model_write_gated_by_version() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let builder = Arc::new(SnapshotBuilder::anonymous(store.clone()));
        let handler = ModelWriteHandler::new(builder, Arc::new(SnapshotConfig::default()));

        let v3 = ListenerContext::new(Channel::ModelWrite, "write")
            .with_record(Arc::new(TestRecord::versioned("Page", 1, 3, true)));

        let snapshot = handler.fire(&v3).await.unwrap().unwrap();
        assert_eq!(snapshot.origin, RecordRef::new("Page", 1));
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.message, "write");

        assert!(handler.fire(&v3).await.unwrap().is_none());
        assert_eq!(store.num_snapshots(), 1);
    }

    #[tokio::test]
    async fn test_model_write_without_record() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let builder = Arc::new(SnapshotBuilder::anonymous(store));
        let handler = ModelWriteHandler::new(builder, Arc::new(SnapshotConfig::default()));

        let context = ListenerContext::new(Channel::ModelWrite, "write");
        assert!(handler.fire(&context).await.unwrap().is_none());
    }
}
