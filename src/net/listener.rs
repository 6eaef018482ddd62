//! Port/listener management.
//!
//! # Responsibilities
//! - Start one listener per distinct port declared across all domains
//! - Wire TLS ports to the certificate cache via the SNI callback
//! - Run every listener concurrently; surface the first fatal error
//!
//! # Design Decisions
//! - Ports are deduplicated by the config layer; a port shared by several
//!   domains is bound once and disambiguated per request by the resolver
//! - Bind/serve errors are fatal and propagate to the caller, not retried

use std::net::SocketAddr;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use crate::auth::{Authenticator, ExtensionRegistry};
use crate::config::{Config, PortBinding};
use crate::http::{build_router, AppState};
use crate::routing::DomainRegistry;
use crate::sync::KeyedLock;
use crate::tls::{self, CertStore};

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("listener on port {port} failed: {source}")]
    Serve {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("listener task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// The assembled server: shared state plus one listener per port.
pub struct Server {
    config: Arc<Config>,
    registry: Arc<DomainRegistry>,
    locks: Arc<KeyedLock>,
    authenticator: Arc<Authenticator>,
    extensions: Arc<ExtensionRegistry>,
    cert_store: Arc<CertStore>,
}

impl Server {
    /// Wire the shared state up from a validated configuration.
    pub fn new(config: Config, extensions: ExtensionRegistry) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(DomainRegistry::from_config(&config));
        let locks = Arc::new(KeyedLock::new());
        let extensions = Arc::new(extensions);
        let authenticator = Arc::new(Authenticator::new(extensions.clone()));
        let cert_store = Arc::new(CertStore::new(registry.clone(), locks.clone()));
        Self {
            config,
            registry,
            locks,
            authenticator,
            extensions,
            cert_store,
        }
    }

    /// The certificate cache, exposed for diagnostics.
    pub fn cert_store(&self) -> Arc<CertStore> {
        self.cert_store.clone()
    }

    /// Run all listeners. Blocks until every listener terminates; the first
    /// fatal bind/serve error propagates to the caller.
    pub async fn run(self) -> Result<(), ServeError> {
        let bindings = self.config.port_bindings();
        let mut tasks: JoinSet<Result<(), ServeError>> = JoinSet::new();

        for binding in bindings {
            let state = AppState {
                registry: self.registry.clone(),
                locks: self.locks.clone(),
                authenticator: self.authenticator.clone(),
                extensions: self.extensions.clone(),
                port: binding.port,
                tls: binding.use_tls,
            };
            let listen_host = self.config.listen_host.clone();
            let cert_store = self.cert_store.clone();
            tasks.spawn(async move {
                serve_binding(listen_host, binding, state, cert_store).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            joined??;
        }
        Ok(())
    }
}

async fn serve_binding(
    listen_host: String,
    binding: PortBinding,
    state: AppState,
    cert_store: Arc<CertStore>,
) -> Result<(), ServeError> {
    let addr: SocketAddr = format!("{}:{}", listen_host, binding.port)
        .parse()
        .map_err(|e| ServeError::Bind {
            port: binding.port,
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
        })?;
    let app = build_router(state);

    tracing::info!(
        address = %addr,
        tls = binding.use_tls,
        "Listener starting"
    );

    if binding.use_tls {
        let tls_config = RustlsConfig::from_config(Arc::new(tls::server_config(cert_store)));
        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service())
            .await
            .map_err(|source| ServeError::Serve {
                port: binding.port,
                source,
            })
    } else {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServeError::Bind {
                port: binding.port,
                source,
            })?;
        axum::serve(listener, app)
            .await
            .map_err(|source| ServeError::Serve {
                port: binding.port,
                source,
            })
    }
}
