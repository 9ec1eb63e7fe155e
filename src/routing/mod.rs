//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (snapshot of the live route table)
//!     → matcher.rs (match templates, bind parameters)
//!     → Return: handler + params, or NoMatch
//!
//! Registration (at runtime, from tests):
//!     (method, template, handler)
//!     → matcher.rs parses the template
//!     → router.rs copies the table, inserts or replaces, publishes it
//! ```
//!
//! # Design Decisions
//! - Readers never block writers and never see a half-built table
//! - Deterministic: same input always matches same route
//! - Most specific template wins; registration order breaks ties

pub mod matcher;
pub mod router;

pub use matcher::{PathParams, PathTemplate, TemplateError};
pub use router::{ResolvedRoute, RouteKey, RouteRegistry};
