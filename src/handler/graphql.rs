//! GraphQL mutation handler.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Handler, ListenerContext};
use crate::builder::{SnapshotBuilder, SnapshotError};
use crate::config::SnapshotConfig;
use crate::store::SnapshotStore;
use crate::types::Snapshot;

/// Records a snapshot against the current page for a GraphQL CRUD mutation.
///
/// Mutations carry no origin record, so the snapshot origin is a synthetic
/// event titled with the mutation message (or the page when there is none).
pub struct MutationHandler<S: SnapshotStore> {
    builder: Arc<SnapshotBuilder<S>>,
    config: Arc<SnapshotConfig>,
}

impl<S: SnapshotStore> MutationHandler<S> {
    /// Prefix applied to the mutation type to form the message key.
    pub const ACTION_PREFIX: &'static str = "graphql_crud_";

    /// Namespace used for localized messages.
    pub const NAMESPACE: &'static str = "GraphQL";

    /// Create a mutation handler.
    pub fn new(builder: Arc<SnapshotBuilder<S>>, config: Arc<SnapshotConfig>) -> Self {
        Self { builder, config }
    }

    /// Message key for a mutation type.
    pub fn action_key(mutation_type: &str) -> String {
        format!("{}{}", Self::ACTION_PREFIX, mutation_type)
    }
}

#[async_trait]
impl<S: SnapshotStore + 'static> Handler for MutationHandler<S> {
    async fn fire(&self, context: &ListenerContext) -> Result<Option<Snapshot>, SnapshotError> {
        let Some(page) = context.current_page.as_deref() else {
            tracing::debug!(mutation = %context.action, "Mutation outside of a page, no snapshot");
            return Ok(None);
        };

        let action = Self::action_key(&context.action);
        let message = self.config.message_for(Self::NAMESPACE, &action);
        self.builder
            .create_snapshot_from_action(page, None, &message, &context.extra_refs())
            .await
    }
}
