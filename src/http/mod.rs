//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (hyper-util auto builder, Axum fallback dispatcher)
//!     → routing registry resolves (method, path)
//!     → recording ledger counts and snapshots the request
//!     → handler.rs (test-supplied handler on the blocking pool)
//!         reads request.rs, writes response.rs
//!     → Send to client
//! ```

pub mod handler;
pub mod request;
pub mod response;
pub mod server;

pub use handler::Handler;
pub use request::{Params, Request, X_REQUEST_ID};
pub use response::{ResponseError, ResponseWriter};
pub use server::{MockServer, ServerError};
