//! Snapshot trigger configuration.
//!
//! ## Configuration
//!
//! Environment variables read by [`SnapshotConfig::from_env`]:
//! - `SNAPSHOT_TRIGGER`: `"action"` or `"model"` (default: action)
//! - `SNAPSHOT_ACTIONS`: comma separated action whitelist
//! - `SNAPSHOT_EXCLUDED_TYPES`: comma separated record types ignored in model mode
//!
//! Messages and translations are loaded from JSON with
//! [`SnapshotConfig::from_json_str`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Unknown trigger mode.
    #[error("Unknown trigger mode: {0} (expected \"action\" or \"model\")")]
    UnknownTrigger(String),
    /// Malformed JSON configuration.
    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// How snapshot creation is triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    /// Snapshots come from whitelisted CMS actions (opt-in).
    #[default]
    Action,
    /// Snapshots come from model writes (opt-out).
    Model,
}

impl FromStr for TriggerMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "action" => Ok(Self::Action),
            "model" => Ok(Self::Model),
            other => Err(ConfigError::UnknownTrigger(other.to_string())),
        }
    }
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action => write!(f, "action"),
            Self::Model => write!(f, "model"),
        }
    }
}

/// Snapshot configuration, passed explicitly to handlers and dispatchers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Trigger mode.
    pub trigger: TriggerMode,
    /// Actions that create snapshots in action mode.
    pub actions: BTreeSet<String>,
    /// Record types that never create snapshots in model mode.
    pub excluded_types: BTreeSet<String>,
    /// Message per action key.
    pub messages: BTreeMap<String, String>,
    /// Localized strings keyed by `"{namespace}.HANDLER_{action}"`.
    pub translations: BTreeMap<String, String>,
}

impl SnapshotConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let trigger = match std::env::var("SNAPSHOT_TRIGGER") {
            Ok(value) => value.parse()?,
            Err(_) => TriggerMode::default(),
        };

        Ok(Self {
            trigger,
            actions: env_list("SNAPSHOT_ACTIONS"),
            excluded_types: env_list("SNAPSHOT_EXCLUDED_TYPES"),
            ..Self::default()
        })
    }

    /// Parse configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the trigger mode.
    pub fn with_trigger(mut self, trigger: TriggerMode) -> Self {
        self.trigger = trigger;
        self
    }

    /// Whitelist an action.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.actions.insert(action.into());
        self
    }

    /// Exclude a record type from model-triggered snapshots.
    pub fn with_excluded_type(mut self, record_type: impl Into<String>) -> Self {
        self.excluded_types.insert(record_type.into());
        self
    }

    /// Configure the message for an action.
    pub fn with_message(mut self, action: impl Into<String>, message: impl Into<String>) -> Self {
        self.messages.insert(action.into(), message.into());
        self
    }

    /// Whether snapshots are triggered by CMS actions.
    pub fn is_action_trigger_active(&self) -> bool {
        self.trigger == TriggerMode::Action
    }

    /// Whether snapshots are triggered by model writes.
    pub fn is_model_trigger_active(&self) -> bool {
        self.trigger == TriggerMode::Model
    }

    /// Whether `action` is whitelisted.
    pub fn is_action_enabled(&self, action: &str) -> bool {
        self.actions.contains(action)
    }

    /// Whether writes to `record_type` are excluded in model mode.
    pub fn is_type_excluded(&self, record_type: &str) -> bool {
        self.excluded_types.contains(record_type)
    }

    /// Message for an action.
    ///
    /// Falls back to the localized `"{namespace}.HANDLER_{action}"` entry and
    /// finally to the action key itself.
    pub fn message_for(&self, namespace: &str, action: &str) -> String {
        if let Some(message) = self.messages.get(action) {
            return message.clone();
        }

        let key = format!("{}.HANDLER_{}", namespace, action);
        self.translations
            .get(&key)
            .cloned()
            .unwrap_or_else(|| action.to_string())
    }
}

fn env_list(name: &str) -> BTreeSet<String> {
    std::env::var(name)
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
