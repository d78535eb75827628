//! TLS configuration
//!
//! Loads a PEM certificate chain and private key into a rustls server config.

use super::error::ServerError;
use std::path::Path;
use std::sync::Arc;

fn read_pem(path: &Path) -> Result<Vec<u8>, ServerError> {
    std::fs::read(path).map_err(|source| ServerError::TlsFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Build a rustls server config from certificate and key files
pub fn load_server_config(
    cert_path: &Path,
    key_path: &Path,
) -> Result<Arc<rustls::ServerConfig>, ServerError> {
    let cert_pem = read_pem(cert_path)?;
    let key_pem = read_pem(key_path)?;

    let cert_chain = rustls_pemfile::certs(&mut cert_pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| ServerError::TlsFile {
            path: cert_path.to_path_buf(),
            source,
        })?;
    if cert_chain.is_empty() {
        return Err(ServerError::NoCertificate(cert_path.to_path_buf()));
    }

    let key = rustls_pemfile::private_key(&mut key_pem.as_slice())
        .map_err(|source| ServerError::TlsFile {
            path: key_path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| ServerError::NoPrivateKey(key_path.to_path_buf()))?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)?;

    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    tracing::debug!(
        cert = %cert_path.display(),
        key = %key_path.display(),
        "Loaded TLS certificate"
    );

    Ok(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_files() {
        let dir = tempdir().unwrap();
        let err = load_server_config(&dir.path().join("cert.pem"), &dir.path().join("key.pem"))
            .unwrap_err();
        assert!(matches!(err, ServerError::TlsFile { .. }));
    }

    #[test]
    fn test_empty_certificate() {
        let dir = tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        std::fs::write(&cert, "not a certificate").unwrap();
        std::fs::write(&key, "not a key").unwrap();

        let err = load_server_config(&cert, &key).unwrap_err();
        assert!(matches!(err, ServerError::NoCertificate(_)));
    }

    #[test]
    fn test_self_signed() {
        let dir = tempdir().unwrap();
        let key_pair = rcgen::KeyPair::generate_for(&rcgen::PKCS_ED25519).unwrap();
        let cert = rcgen::CertificateParams::new(vec!["localhost".to_string()])
            .unwrap()
            .self_signed(&key_pair)
            .unwrap();

        let cert_path = dir.path().join("cert.pem");
        let key_path = dir.path().join("key.pem");
        std::fs::write(&cert_path, cert.pem()).unwrap();
        std::fs::write(&key_path, key_pair.serialize_pem()).unwrap();

        let config = load_server_config(&cert_path, &key_path).unwrap();
        assert_eq!(config.alpn_protocols, vec![b"http/1.1".to_vec()]);

        // A certificate is not a key
        let err = load_server_config(&cert_path, &cert_path).unwrap_err();
        assert!(matches!(err, ServerError::NoPrivateKey(_)));
    }
}
