//! Routing of change events to handlers according to the trigger mode.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::{Channel, Handler, ListenerContext};
use crate::builder::SnapshotError;
use crate::config::SnapshotConfig;
use crate::types::Snapshot;

/// Routes events to registered handlers.
///
/// In action mode only whitelisted actions on form and GraphQL channels are
/// handled. In model mode only model writes are handled, minus excluded
/// record types.
pub struct SnapshotDispatcher {
    config: Arc<SnapshotConfig>,
    actions: BTreeMap<(Channel, String), Arc<dyn Handler>>,
    channels: HashMap<Channel, Arc<dyn Handler>>,
}

impl SnapshotDispatcher {
    /// Create a dispatcher with no handlers.
    pub fn new(config: Arc<SnapshotConfig>) -> Self {
        Self {
            config,
            actions: BTreeMap::new(),
            channels: HashMap::new(),
        }
    }

    /// Register a handler for one action on a channel.
    pub fn on_action(
        mut self,
        channel: Channel,
        action: impl Into<String>,
        handler: Arc<dyn Handler>,
    ) -> Self {
        self.actions.insert((channel, action.into()), handler);
        self
    }

    /// Register the fallback handler for a channel.
    pub fn on_channel(mut self, channel: Channel, handler: Arc<dyn Handler>) -> Self {
        self.channels.insert(channel, handler);
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Whether the trigger mode lets this event create a snapshot.
    pub fn permits(&self, context: &ListenerContext) -> bool {
        if self.config.is_model_trigger_active() {
            return context.channel == Channel::ModelWrite
                && context
                    .record
                    .as_ref()
                    .map(|r| !self.config.is_type_excluded(r.base_type()))
                    .unwrap_or(false);
        }

        context.channel != Channel::ModelWrite && self.config.is_action_enabled(&context.action)
    }

    fn handler_for(&self, context: &ListenerContext) -> Option<&Arc<dyn Handler>> {
        self.actions
            .get(&(context.channel, context.action.clone()))
            .or_else(|| self.channels.get(&context.channel))
    }

    /// Dispatch an event.
    ///
    /// Returns `Ok(None)` when the event is filtered out or no handler is
    /// registered. Snapshot failures are propagated to the caller.
    pub async fn dispatch(
        &self,
        context: &ListenerContext,
    ) -> Result<Option<Snapshot>, SnapshotError> {
        if !self.permits(context) {
            tracing::trace!(
                channel = %context.channel,
                action = %context.action,
                trigger = %self.config.trigger,
                "Event not configured for snapshots"
            );
            return Ok(None);
        }

        let Some(handler) = self.handler_for(context) else {
            tracing::debug!(
                channel = %context.channel,
                action = %context.action,
                "No snapshot handler registered"
            );
            return Ok(None);
        };

        handler.fire(context).await.map_err(|e| {
            tracing::warn!(
                channel = %context.channel,
                action = %context.action,
                error = %e,
                "Snapshot creation failed"
            );
            e
        })
    }
}
