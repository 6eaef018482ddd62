//! Lazily-populated TLS certificate cache.
//!
//! # Responsibilities
//! - Load certificate/key pairs from the paths configured per domain
//! - Memoize loaded certificates for the process lifetime (no eviction;
//!   rotation requires a restart)
//! - Deduplicate concurrent first loads of the same name via the keyed lock
//!
//! # Design Decisions
//! - Double-checked populate: optimistic read, then lock + re-check + load.
//!   The re-check is mandatory, not an optimization: a waiter reaching the
//!   lock late must observe the winner's insert instead of loading again.
//! - Load failures are returned to the handshake and never cached, so a
//!   later handshake retries after an operator fixes the files on disk.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use rustls::crypto::aws_lc_rs::sign::any_supported_type;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;

use crate::routing::DomainRegistry;
use crate::sync::KeyedLock;

/// Error type for certificate loading.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("domain {0} has no certificate configured")]
    NoCertificate(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificate found in {0}")]
    EmptyCertificate(String),

    #[error("no private key found in {0}")]
    MissingKey(String),

    #[error("unusable private key in {path}: {source}")]
    BadKey {
        path: String,
        #[source]
        source: rustls::Error,
    },
}

/// Process-wide cache of certificate material, keyed by domain name.
pub struct CertStore {
    registry: Arc<DomainRegistry>,
    certs: DashMap<String, Arc<CertifiedKey>>,
    locks: Arc<KeyedLock>,
    disk_loads: AtomicUsize,
}

impl CertStore {
    pub fn new(registry: Arc<DomainRegistry>, locks: Arc<KeyedLock>) -> Self {
        Self {
            registry,
            certs: DashMap::new(),
            locks,
            disk_loads: AtomicUsize::new(0),
        }
    }

    /// Certificate for `server_name`, loading and caching it on first use.
    ///
    /// Unconfigured names resolve to the default domain's certificate.
    pub fn certified_key(&self, server_name: &str) -> Result<Arc<CertifiedKey>, TlsError> {
        let name = server_name.to_lowercase();

        // Fast path, no locking.
        if let Some(cached) = self.certs.get(&name) {
            return Ok(cached.clone());
        }

        let _guard = self.locks.acquire(&name);
        // Another handshake may have populated the entry while we waited.
        if let Some(cached) = self.certs.get(&name) {
            return Ok(cached.clone());
        }

        let domain = self.registry.domain_or_default(&name);
        let (cert_file, key_file) = match (&domain.cert_file, &domain.key_file) {
            (Some(cert), Some(key)) => (cert, key),
            _ => return Err(TlsError::NoCertificate(domain.host.clone())),
        };

        let key = load_certified_key(cert_file, key_file)?;
        self.disk_loads.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            domain = %domain.host,
            server_name = %name,
            cert_file = %cert_file.display(),
            "Certificate loaded"
        );

        let key = Arc::new(key);
        self.certs.insert(name, key.clone());
        Ok(key)
    }

    /// Number of certificate loads that actually hit the disk.
    pub fn disk_loads(&self) -> usize {
        self.disk_loads.load(Ordering::Relaxed)
    }
}

/// Read a PEM certificate chain and private key into a [`CertifiedKey`].
fn load_certified_key(cert_path: &Path, key_path: &Path) -> Result<CertifiedKey, TlsError> {
    let chain = read_cert_chain(cert_path)?;
    if chain.is_empty() {
        return Err(TlsError::EmptyCertificate(cert_path.display().to_string()));
    }
    let key_der = read_private_key(key_path)?;
    let signing_key = any_supported_type(&key_der).map_err(|source| TlsError::BadKey {
        path: key_path.display().to_string(),
        source,
    })?;
    Ok(CertifiedKey::new(chain, signing_key))
}

fn read_cert_chain(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let file = File::open(path).map_err(|source| TlsError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Io {
            path: path.display().to_string(),
            source,
        })
}

fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let file = File::open(path).map_err(|source| TlsError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Io {
            path: path.display().to_string(),
            source,
        })?
        .ok_or_else(|| TlsError::MissingKey(path.display().to_string()))
}
