//! TLS configuration and certificate loading.

use std::path::PathBuf;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;
use tokio_rustls::TlsAcceptor;

use crate::config::TlsConfig;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("Certificate file not found: {0:?}")]
    MissingCertificate(PathBuf),

    #[error("Private key file not found: {0:?}")]
    MissingKey(PathBuf),

    #[error("Failed to load TLS material: {0}")]
    Load(#[from] std::io::Error),
}

/// Build a TLS acceptor from PEM certificate and key files.
///
/// ALPN advertises `h2` only when HTTP/2 is enabled.
pub async fn load_tls_acceptor(config: &TlsConfig, http2: bool) -> Result<TlsAcceptor, TlsError> {
    if !config.cert_path.exists() {
        return Err(TlsError::MissingCertificate(config.cert_path.clone()));
    }
    if !config.key_path.exists() {
        return Err(TlsError::MissingKey(config.key_path.clone()));
    }

    // RustlsConfig builds on the process default provider, which is unset
    // when more than one rustls backend is linked.
    let _ = tokio_rustls::rustls::crypto::aws_lc_rs::default_provider().install_default();

    let rustls = RustlsConfig::from_pem_file(&config.cert_path, &config.key_path).await?;
    let mut server_config = (*rustls.get_inner()).clone();
    server_config.alpn_protocols = if http2 {
        vec![b"h2".to_vec(), b"http/1.1".to_vec()]
    } else {
        vec![b"http/1.1".to_vec()]
    };

    tracing::debug!(cert = ?config.cert_path, http2, "TLS material loaded");
    Ok(TlsAcceptor::from(Arc::new(server_config)))
}
