//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! request (method requires auth for the resolved domain)
//!     → extension named by the domain, if registered
//!     → otherwise htpasswd.rs (Basic challenge against the domain's file)
//!     → allowed, or an HTTP status for the rejection
//! ```

pub mod extensions;
pub mod htpasswd;

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::config::DomainConfig;

pub use extensions::{AuthExtension, ExtensionRegistry, ServeExtension};
pub use htpasswd::{decode_basic_auth, AuthError, HtpasswdStore};

/// Outcome of an authentication check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthOutcome {
    pub allowed: bool,
    /// Status to answer with when not allowed.
    pub status: u16,
}

impl AuthOutcome {
    pub const ALLOWED: Self = Self {
        allowed: true,
        status: 200,
    };

    pub fn denied(status: u16) -> Self {
        Self {
            allowed: false,
            status,
        }
    }
}

/// Decides whether a request may proceed for a given domain.
#[derive(Debug)]
pub struct Authenticator {
    htpasswd: HtpasswdStore,
    extensions: Arc<ExtensionRegistry>,
}

impl Authenticator {
    pub fn new(extensions: Arc<ExtensionRegistry>) -> Self {
        Self {
            htpasswd: HtpasswdStore::new(),
            extensions,
        }
    }

    /// Authenticate a request against a domain's policy.
    ///
    /// A domain naming an auth extension delegates entirely; a missing
    /// extension denies the request rather than silently allowing it.
    /// Otherwise basic auth runs against the domain's htpasswd file, and a
    /// domain with no htpasswd file denies every guarded request.
    pub async fn authenticate(&self, request: &Parts, domain: &DomainConfig) -> AuthOutcome {
        if let Some(name) = &domain.auth_extension {
            let Some(extension) = self.extensions.auth(name) else {
                tracing::error!(
                    domain = %domain.host,
                    extension = %name,
                    "Auth extension not registered; denying request"
                );
                return AuthOutcome::denied(500);
            };
            let (allowed, status) = extension.authenticate(request, domain).await;
            return if allowed {
                AuthOutcome::ALLOWED
            } else {
                AuthOutcome::denied(status)
            };
        }

        let Some(htpasswd_file) = &domain.htpasswd_file else {
            return AuthOutcome::denied(401);
        };

        let credentials = request
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(decode_basic_auth);
        let Some((user, password)) = credentials else {
            return AuthOutcome::denied(401);
        };

        match self.htpasswd.verify(htpasswd_file, &user, &password) {
            Ok(true) => AuthOutcome::ALLOWED,
            Ok(false) => AuthOutcome::denied(401),
            Err(error) => {
                tracing::error!(
                    domain = %domain.host,
                    %error,
                    "Failed to read credentials file"
                );
                AuthOutcome::denied(500)
            }
        }
    }
}
