//! SNI certificate selection.
//!
//! Bridges the certificate store into rustls: every TLS handshake asks the
//! resolver for the certificate matching the client-supplied server name.

use std::fmt;
use std::sync::Arc;

use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::ServerConfig;

use crate::config::DEFAULT_DOMAIN;
use crate::tls::store::CertStore;

/// Per-handshake certificate selection callback backed by [`CertStore`].
pub struct SniResolver {
    store: Arc<CertStore>,
}

impl SniResolver {
    pub fn new(store: Arc<CertStore>) -> Self {
        Self { store }
    }
}

impl fmt::Debug for SniResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SniResolver").finish_non_exhaustive()
    }
}

impl ResolvesServerCert for SniResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        // Clients that send no SNI get the default domain's certificate.
        let name = client_hello.server_name().unwrap_or(DEFAULT_DOMAIN);
        match self.store.certified_key(name) {
            Ok(key) => Some(key),
            Err(error) => {
                // Fails only this handshake; the next one retries the load.
                tracing::warn!(server_name = %name, %error, "Certificate resolution failed");
                None
            }
        }
    }
}

/// Build the rustls server configuration used by every TLS listener.
pub fn server_config(store: Arc<CertStore>) -> ServerConfig {
    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_cert_resolver(Arc::new(SniResolver::new(store)));
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    config
}
