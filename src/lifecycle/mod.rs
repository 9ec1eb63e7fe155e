//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! MockServer::start:
//!     Validate config → Bind listener → Load TLS → Spawn accept loop
//!
//! MockServer::close (shutdown.rs):
//!     Trigger signal → Stop accepting → Drain connections → Return
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is returned from `start`
//! - Listener binds before the accept loop is spawned
//! - Shutdown has timeout: connections still busy after it are abandoned

pub mod shutdown;

pub use shutdown::{Shutdown, ShutdownSignal};
