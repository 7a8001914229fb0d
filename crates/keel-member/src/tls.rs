//! mTLS client material.
//!
//! Loads the storage CA and the API server's storage client certificate
//! from the cert dir and builds a rustls client config from them.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use keel_core::constants::{APISERVER_STORAGE_CLIENT_CERT, APISERVER_STORAGE_CLIENT_KEY, STORAGE_CA_CERT};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};
use tracing::debug;

/// Paths of the three PEM files a client needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub ca_cert: PathBuf,
    pub client_cert: PathBuf,
    pub client_key: PathBuf,
}

impl TlsFiles {
    /// The standard layout under a node's cert dir.
    pub fn in_cert_dir(cert_dir: &Path) -> Self {
        Self {
            ca_cert: cert_dir.join(STORAGE_CA_CERT),
            client_cert: cert_dir.join(APISERVER_STORAGE_CLIENT_CERT),
            client_key: cert_dir.join(APISERVER_STORAGE_CLIENT_KEY),
        }
    }
}

/// Build a client config that trusts only the storage CA and presents
/// the client certificate.
///
/// The error is a human-readable reason naming the offending file.
pub fn load_client_config(files: &TlsFiles) -> Result<Arc<ClientConfig>, String> {
    let mut roots = RootCertStore::empty();
    for ca in read_certs(&files.ca_cert)? {
        roots
            .add(ca)
            .map_err(|e| format!("invalid CA certificate in {}: {e}", files.ca_cert.display()))?;
    }

    let chain = read_certs(&files.client_cert)?;
    let key = read_key(&files.client_key)?;

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| format!("tls protocol setup: {e}"))?
        .with_root_certificates(roots)
        .with_client_auth_cert(chain, key)
        .map_err(|e| format!("client certificate {}: {e}", files.client_cert.display()))?;

    debug!(ca = ?files.ca_cert, cert = ?files.client_cert, "loaded storage client TLS material");
    Ok(Arc::new(config))
}

fn open(path: &Path) -> Result<BufReader<File>, String> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))
}

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, String> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid PEM in {}: {e}", path.display()))?;
    if certs.is_empty() {
        return Err(format!("no certificate found in {}", path.display()));
    }
    Ok(certs)
}

fn read_key(path: &Path) -> Result<PrivateKeyDer<'static>, String> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| format!("invalid PEM in {}: {e}", path.display()))?
        .ok_or_else(|| format!("no private key found in {}", path.display()))
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::path::Path;

    use rcgen::{BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair};

    use super::TlsFiles;

    /// Write a throwaway CA and a client pair signed by it in the
    /// standard cert dir layout.
    pub fn write_test_pki(cert_dir: &Path) -> TlsFiles {
        let ca_key = KeyPair::generate().unwrap();
        let mut ca_params = CertificateParams::default();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, "storage-ca");
        ca_params.distinguished_name = dn;
        let ca_cert = ca_params.self_signed(&ca_key).unwrap();

        let client_key = KeyPair::generate().unwrap();
        let mut client_params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, "apiserver-storage-client");
        client_params.distinguished_name = dn;
        let client_cert = client_params.signed_by(&client_key, &ca_cert, &ca_key).unwrap();

        let files = TlsFiles::in_cert_dir(cert_dir);
        std::fs::create_dir_all(files.ca_cert.parent().unwrap()).unwrap();
        std::fs::write(&files.ca_cert, ca_cert.pem()).unwrap();
        std::fs::write(&files.client_cert, client_cert.pem()).unwrap();
        std::fs::write(&files.client_key, client_key.serialize_pem()).unwrap();
        files
    }
}
