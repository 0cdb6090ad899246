//! Form submission handlers.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Handler, ListenerContext};
use crate::builder::{SnapshotBuilder, SnapshotError};
use crate::config::SnapshotConfig;
use crate::decision::DecisionEngine;
use crate::store::SnapshotStore;
use crate::types::Snapshot;

/// Records a snapshot for every handled form action.
///
/// The owner is the page being edited, or the form's record when there is
/// no page; the form's record is the origin.
pub struct ActionHandler<S: SnapshotStore> {
    builder: Arc<SnapshotBuilder<S>>,
    config: Arc<SnapshotConfig>,
}

impl<S: SnapshotStore> ActionHandler<S> {
    /// Namespace used for localized messages.
    pub const NAMESPACE: &'static str = "Form";

    /// Create a form action handler.
    pub fn new(builder: Arc<SnapshotBuilder<S>>, config: Arc<SnapshotConfig>) -> Self {
        Self { builder, config }
    }

    /// Build the snapshot for a form action without any dedup check.
    pub async fn create_snapshot(
        &self,
        context: &ListenerContext,
    ) -> Result<Option<Snapshot>, SnapshotError> {
        let record = context.record.as_deref();
        let Some(owner) = context.current_page.as_deref().or(record) else {
            tracing::debug!(action = %context.action, "Form action without record or page");
            return Ok(None);
        };

        let message = self.config.message_for(Self::NAMESPACE, &context.action);
        self.builder
            .create_snapshot_from_action(owner, record, &message, &context.extra_refs())
            .await
    }
}

#[async_trait]
impl<S: SnapshotStore + 'static> Handler for ActionHandler<S> {
    async fn fire(&self, context: &ListenerContext) -> Result<Option<Snapshot>, SnapshotError> {
        self.create_snapshot(context).await
    }
}

/// Records a snapshot for a form save only when the save produced a new version.
///
/// The check compares draft against live state, so a save on top of an
/// already unpublished change is still recorded.
pub struct SaveHandler<S: SnapshotStore> {
    action: ActionHandler<S>,
    decision: DecisionEngine<S>,
}

impl<S: SnapshotStore> SaveHandler<S> {
    /// Create a form save handler.
    pub fn new(builder: Arc<SnapshotBuilder<S>>, config: Arc<SnapshotConfig>) -> Self {
        let decision = DecisionEngine::new(builder.store().clone());
        Self {
            action: ActionHandler::new(builder, config),
            decision,
        }
    }
}

#[async_trait]
impl<S: SnapshotStore + 'static> Handler for SaveHandler<S> {
    async fn fire(&self, context: &ListenerContext) -> Result<Option<Snapshot>, SnapshotError> {
        let Some(record) = context.record.as_deref() else {
            return self.action.create_snapshot(context).await;
        };

        let (Some(state), Some(record_ref)) = (record.versioning(), record.record_ref()) else {
            return self.action.create_snapshot(context).await;
        };

        if record.is_snapshot_event() {
            return self.action.create_snapshot(context).await;
        }

        if self.decision.should_snapshot(&record_ref, state).await {
            return self.action.create_snapshot(context).await;
        }

        tracing::debug!(record = %record_ref, "Save produced no new version");
        Ok(None)
    }
}
