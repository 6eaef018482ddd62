//! Extension capabilities.
//!
//! Domains may delegate authentication, or their entire request handling,
//! to extension code. Extensions are registered programmatically at startup
//! under a name that domain configurations refer to; there is no dynamic
//! library loading.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::request::Parts;
use axum::http::Request;
use axum::response::Response;

use crate::config::DomainConfig;

/// Replaces the built-in basic authentication for a domain.
///
/// Returns whether the request is authenticated, plus the HTTP status to
/// answer with when it is not.
#[async_trait]
pub trait AuthExtension: Send + Sync {
    async fn authenticate(&self, request: &Parts, domain: &DomainConfig) -> (bool, u16);
}

/// Replaces the built-in file serving/upload behavior for a domain.
#[async_trait]
pub trait ServeExtension: Send + Sync {
    async fn serve(&self, request: Request<Body>, domain: &DomainConfig) -> Response;
}

/// Named extensions available to domain configurations.
///
/// Built once at startup, immutable afterwards.
#[derive(Default)]
pub struct ExtensionRegistry {
    auth: HashMap<String, Arc<dyn AuthExtension>>,
    serve: HashMap<String, Arc<dyn ServeExtension>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_auth(&mut self, name: impl Into<String>, extension: Arc<dyn AuthExtension>) {
        self.auth.insert(name.into(), extension);
    }

    pub fn register_serve(&mut self, name: impl Into<String>, extension: Arc<dyn ServeExtension>) {
        self.serve.insert(name.into(), extension);
    }

    pub fn auth(&self, name: &str) -> Option<Arc<dyn AuthExtension>> {
        self.auth.get(name).cloned()
    }

    pub fn serve(&self, name: &str) -> Option<Arc<dyn ServeExtension>> {
        self.serve.get(name).cloned()
    }
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("auth", &self.auth.keys().collect::<Vec<_>>())
            .field("serve", &self.serve.keys().collect::<Vec<_>>())
            .finish()
    }
}
