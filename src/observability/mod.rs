//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch and lifecycle code produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms via the metrics facade)
//!
//! Per-request spans come from tower-http's TraceLayer, and every request
//! carries an x-request-id that also lands in its CallRecord.
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, try_init_logging};
