//! # versioned-snapshots
//!
//! Point-in-time audit snapshots for graphs of versioned content records.
//!
//! A snapshot answers one question:
//!
//! > Which records did this change touch, at which versions, and who made it?
//!
//! ## Core Contract
//!
//! 1. Decide whether a change is significant enough to record
//! 2. Resolve the record the change is "about" (its origin), even when that
//!    record is gone
//! 3. Persist the ordered set of implicated records as one snapshot
//!
//! ## Architecture
//!
//! ```text
//! Channel event → Handler → DecisionEngine? → SnapshotBuilder → SnapshotDraft
//!                                  ↓                                  ↓
//!                            SnapshotStore (Postgres or Memory) ← commit
//! ```
//!
//! ## Ordering Guarantees
//!
//! - Items are stored in causal order: origin (or synthetic event) first
//! - The owner of the change is always the last item
//! - Fingerprints are stable across restarts and record deletion

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod config;
pub mod decision;
pub mod fingerprint;
pub mod handler;
pub mod logging;
pub mod store;
pub mod types;

// Re-exports
pub use builder::{
    resolve_origin, Anonymous, AuthorContext, FixedAuthor, Resolution, ResolvedOrigin,
    SnapshotBuilder, SnapshotError,
};
pub use config::{ConfigError, SnapshotConfig, TriggerMode};
pub use decision::{recorded_version, DecisionEngine};
pub use fingerprint::{fingerprint, fingerprints_match};
pub use handler::{
    ActionHandler, Channel, Handler, ListenerContext, ModelWriteHandler, MutationHandler,
    SaveHandler, SnapshotDispatcher,
};
pub use logging::{init_tracing, LogFormat};
pub use store::{InMemorySnapshotStore, SnapshotStore};
#[cfg(feature = "postgres")]
pub use store::PostgresSnapshotStore;
pub use types::{
    AuthorId, ContentRecord, DraftError, ItemSource, Origin, RecordId, RecordRef, Snapshot,
    SnapshotDraft, SnapshotEvent, SnapshotId, SnapshotItem, Versioned,
};

