//! Programmable in-process HTTP test double.
//!
//! A `MockServer` listens on a real socket. Tests register handlers per
//! (method, path template) at runtime, point the code under test at the
//! server, then assert on how many calls each route received and what those
//! requests contained.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────────┐
//!                    │                    MOCK SERVER                     │
//!   Client Request   │  ┌─────────┐   ┌──────────┐   ┌───────────────┐   │
//!   ─────────────────┼─▶│   net   │──▶│   http   │──▶│    routing    │   │
//!                    │  │listener │   │ dispatch │   │ registry +    │   │
//!                    │  │  + tls  │   │          │   │ matcher       │   │
//!                    │  └─────────┘   └────┬─────┘   └───────┬───────┘   │
//!                    │                     │    no match → 404 (unrecorded)
//!                    │                     ▼                 │           │
//!                    │              ┌─────────────┐          │           │
//!                    │              │  recording  │◀─────────┘           │
//!                    │              │ ledger +    │   count + snapshot   │
//!                    │              │ snapshots   │                      │
//!                    │              └──────┬──────┘                      │
//!   Client Response  │                     ▼                             │
//!   ◀────────────────┼──────────── test handler (ResponseWriter)         │
//!                    └───────────────────────────────────────────────────┘
//! ```

pub mod client;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod recording;
pub mod routing;

pub use axum::http::{HeaderMap, Method, StatusCode};
pub use config::ServerConfig;
pub use http::{Handler, MockServer, Params, Request, ResponseError, ResponseWriter, ServerError};
pub use recording::CallRecord;
pub use routing::{RouteKey, TemplateError};
