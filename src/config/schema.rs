//! Configuration schema definitions.
//!
//! All types derive Serde traits so a server can be configured from TOML as
//! well as from code.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for a mock server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Serve HTTP/2 (prior knowledge, or ALPN under TLS) next to HTTP/1.1.
    pub http2: bool,

    /// Terminate TLS with the given certificate. Plain HTTP when absent.
    pub tls: Option<TlsConfig>,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Largest request body accepted for a routed request.
    pub max_body_bytes: usize,

    /// How long `close` waits for in-flight requests.
    pub shutdown_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http2: false,
            tls: None,
            max_connections: 1024,
            max_body_bytes: 2 * 1024 * 1024,
            shutdown_timeout_ms: 5_000,
        }
    }
}

impl ServerConfig {
    pub fn with_http2(mut self, enabled: bool) -> Self {
        self.http2 = enabled;
        self
    }

    pub fn with_tls(mut self, cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        self.tls = Some(TlsConfig {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        });
        self
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// URL scheme clients should use.
    pub fn scheme(&self) -> &'static str {
        if self.tls.is_some() {
            "https"
        } else {
            "http"
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: PathBuf,

    /// Path to private key file (PEM).
    pub key_path: PathBuf,
}
