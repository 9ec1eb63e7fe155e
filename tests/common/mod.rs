//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use mock_upstream::client::HttpClient;
use mock_upstream::observability::logging::try_init_logging;
use mock_upstream::{MockServer, ServerConfig};

/// Timeout used by test clients. Handlers that sleep longer simulate a hung upstream.
pub const CLIENT_TIMEOUT: Duration = Duration::from_millis(500);

/// Start a server on an ephemeral loopback port with default settings.
pub async fn start_server() -> MockServer {
    start_server_with(ServerConfig::default()).await
}

pub async fn start_server_with(config: ServerConfig) -> MockServer {
    let _ = try_init_logging();
    MockServer::start("127.0.0.1:0", config).await.unwrap()
}

/// A non-pooled reqwest client so every test sees fresh connections.
pub fn reqwest_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .timeout(CLIENT_TIMEOUT)
        .build()
        .unwrap()
}

pub fn client_for(server: &MockServer) -> HttpClient {
    HttpClient::new(&server.base_url(), reqwest_client()).unwrap()
}

/// PEM fixtures signed by `tests/fixtures/tls/ca.pem`, valid for
/// `localhost` and `127.0.0.1`.
pub fn tls_fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/tls")
        .join(name)
}

pub fn tls_config(http2: bool) -> ServerConfig {
    ServerConfig::default()
        .with_http2(http2)
        .with_tls(tls_fixture("server.pem"), tls_fixture("server.key"))
}

/// A reqwest client that trusts only the fixture CA.
pub fn tls_client() -> reqwest::Client {
    let ca = std::fs::read(tls_fixture("ca.pem")).unwrap();
    reqwest::Client::builder()
        .use_rustls_tls()
        .tls_built_in_root_certs(false)
        .add_root_certificate(reqwest::Certificate::from_pem(&ca).unwrap())
        .no_proxy()
        .pool_max_idle_per_host(0)
        .timeout(CLIENT_TIMEOUT)
        .build()
        .unwrap()
}
