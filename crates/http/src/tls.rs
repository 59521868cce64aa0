//! Building `rustls` configurations from PEM material.
//!
//! Server configs carry one certificate chain and its key; client configs trust an
//! explicit set of root certificates. The `ring` provider is used for both.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::crypto::ring::default_provider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("can't read pem file {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("invalid pem data: {source}")]
    Pem {
        #[from]
        source: io::Error,
    },

    #[error("no certificate found")]
    NoCertificate,

    #[error("no private key found")]
    NoPrivateKey,

    #[error("invalid tls config: {source}")]
    Rustls {
        #[from]
        source: rustls::Error,
    },
}

/// Reads every certificate of a PEM stream.
pub fn read_certs(reader: &mut dyn BufRead) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let certs = rustls_pemfile::certs(reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificate);
    }
    Ok(certs)
}

/// Reads the first private key of a PEM stream (PKCS#1, PKCS#8 or SEC1).
pub fn read_private_key(reader: &mut dyn BufRead) -> Result<PrivateKeyDer<'static>, TlsError> {
    rustls_pemfile::private_key(reader)?.ok_or(TlsError::NoPrivateKey)
}

/// Builds a server config from a certificate chain and its key.
pub fn server_config(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<Arc<ServerConfig>, TlsError> {
    let config = ServerConfig::builder_with_provider(Arc::new(default_provider()))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(Arc::new(config))
}

/// Builds a server config from PEM encoded certificate chain and key.
pub fn server_config_from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Arc<ServerConfig>, TlsError> {
    let certs = read_certs(&mut &cert_pem[..])?;
    let key = read_private_key(&mut &key_pem[..])?;
    server_config(certs, key)
}

/// Builds a server config from PEM files.
pub fn server_config_from_files(cert_path: &Path, key_path: &Path) -> Result<Arc<ServerConfig>, TlsError> {
    let certs = read_certs(&mut open(cert_path)?)?;
    let key = read_private_key(&mut open(key_path)?)?;
    debug!(cert = %cert_path.display(), chain = certs.len(), "loaded server certificate");
    server_config(certs, key)
}

/// Builds a client config trusting exactly `roots`.
pub fn client_config(roots: Vec<CertificateDer<'static>>) -> Result<Arc<ClientConfig>, TlsError> {
    let mut store = RootCertStore::empty();
    for root in roots {
        store.add(root)?;
    }

    let config = ClientConfig::builder_with_provider(Arc::new(default_provider()))
        .with_safe_default_protocol_versions()?
        .with_root_certificates(store)
        .with_no_client_auth();
    Ok(Arc::new(config))
}

/// Builds a client config trusting the certificates of a PEM stream.
pub fn client_config_from_pem(ca_pem: &[u8]) -> Result<Arc<ClientConfig>, TlsError> {
    client_config(read_certs(&mut &ca_pem[..])?)
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path).map(BufReader::new).map_err(|source| TlsError::Io { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_configs_from_generated_certificate() {
        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_owned()]).unwrap();
        let cert_pem = certified.cert.pem();
        let key_pem = certified.key_pair.serialize_pem();

        server_config_from_pem(cert_pem.as_bytes(), key_pem.as_bytes()).unwrap();
        client_config_from_pem(cert_pem.as_bytes()).unwrap();
    }

    #[test]
    fn reject_missing_material() {
        assert!(matches!(read_certs(&mut &b""[..]), Err(TlsError::NoCertificate)));
        assert!(matches!(read_private_key(&mut &b""[..]), Err(TlsError::NoPrivateKey)));
        assert!(matches!(
            server_config_from_files(Path::new("/nonexistent/cert.pem"), Path::new("/nonexistent/key.pem")),
            Err(TlsError::Io { .. })
        ));
    }
}
