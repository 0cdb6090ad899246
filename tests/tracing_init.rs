//! Global subscriber installation.
//!
//! Lives in its own test binary because installing a subscriber is
//! process-wide.

use versioned_snapshots::{init_tracing, LogFormat};

#[test]
fn test_subscriber_installs_once() {
    assert!(init_tracing(LogFormat::Json).is_ok());
    assert!(init_tracing(LogFormat::Pretty).is_err());

    tracing::info!(check = "installed", "Subscriber accepts events");
}
