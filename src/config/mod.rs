//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! TOML text or ServerConfig built in code
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → consumed once by MockServer::start
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - `start` validates again so code-built configs get the same checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{ServerConfig, TlsConfig};
pub use validation::ValidationError;
