//! TLS server configuration from PEM files

use crate::error::WebhookError;
use rustls::ServerConfig;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// Builds a TLS acceptor from a PEM certificate chain and private key.
///
/// The files are read once; rotating the certificate requires a restart.
pub fn load_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, WebhookError> {
    let certs = parse_certificates(&read_pem(cert_path)?, cert_path)?;
    let key = parse_private_key(&read_pem(key_path)?, key_path)?;

    let mut config = ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn read_pem(path: &Path) -> Result<Vec<u8>, WebhookError> {
    std::fs::read(path).map_err(|source| WebhookError::ReadPem {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_certificates(pem: &[u8], path: &Path) -> Result<Vec<CertificateDer<'static>>, WebhookError> {
    let certs = CertificateDer::pem_slice_iter(pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| WebhookError::InvalidPem {
            path: path.to_path_buf(),
            reason: format!("failed to parse certificates: {e}"),
        })?;
    if certs.is_empty() {
        return Err(WebhookError::InvalidPem {
            path: path.to_path_buf(),
            reason: "no certificates found".to_string(),
        });
    }
    Ok(certs)
}

fn parse_private_key(pem: &[u8], path: &Path) -> Result<PrivateKeyDer<'static>, WebhookError> {
    PrivateKeyDer::from_pem_slice(pem).map_err(|e| WebhookError::InvalidPem {
        path: path.to_path_buf(),
        reason: format!("failed to parse private key: {e}"),
    })
}
