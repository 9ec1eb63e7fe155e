//! Request capture subsystem.
//!
//! # Data Flow
//! ```text
//! Routed request (parts, buffered body, bound params)
//!     → snapshot.rs (owned CallRecord)
//!     → ledger.rs (count + append, keyed by RouteKey)
//!     → inspected by tests via MockServer
//! ```

pub mod ledger;
pub mod snapshot;

pub use ledger::CallLedger;
pub use snapshot::{CallRecord, QueryValues};
