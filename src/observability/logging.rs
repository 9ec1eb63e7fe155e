//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for hosts and test binaries
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Log level configurable via `RUST_LOG`
//! - Initialization is fallible so many tests can race to call it

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "mock_upstream=info,tower_http=info";

/// Install the global subscriber. Fails if one is already installed.
pub fn try_init_logging() -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init()
}

/// Install the global subscriber, ignoring an existing one.
pub fn init_logging() {
    if try_init_logging().is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
