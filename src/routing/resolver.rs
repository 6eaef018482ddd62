//! Virtual host resolution.
//!
//! # Responsibilities
//! - Store the resolved configuration of every domain
//! - Select the domain that applies to an inbound request from its `Host`
//!   header and the port the connection arrived on
//! - Fall back to the `"default"` domain when nothing matches
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) host lookup via HashMap
//! - Resolution is total: a miss is a defined fallback, never an error

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{Config, DomainConfig, DEFAULT_DOMAIN};

/// Immutable map of host name to domain configuration.
#[derive(Debug)]
pub struct DomainRegistry {
    domains: HashMap<String, Arc<DomainConfig>>,
    default: Arc<DomainConfig>,
    listen_host: String,
}

impl DomainRegistry {
    /// Build a registry from a validated configuration.
    pub fn from_config(config: &Config) -> Self {
        let domains: HashMap<String, Arc<DomainConfig>> = config
            .domains
            .iter()
            .map(|(name, domain)| (name.to_lowercase(), Arc::new(domain.clone())))
            .collect();
        let default = domains
            .get(DEFAULT_DOMAIN)
            .cloned()
            .unwrap_or_else(|| Arc::new(DomainConfig::default()));
        Self {
            domains,
            default,
            listen_host: config.listen_host.clone(),
        }
    }

    /// Select the domain serving a request.
    ///
    /// The port is taken from the `Host` header when it carries a parseable
    /// one, else from the local listening port, else inferred from the
    /// connection's TLS state. A known host that does not declare the
    /// resolved port still falls back to the default domain.
    pub fn resolve(&self, host_header: Option<&str>, local_port: Option<u16>, tls: bool) -> Arc<DomainConfig> {
        let (name, header_port) = split_host_header(host_header.unwrap_or(""));
        let port = header_port
            .or(local_port)
            .unwrap_or(if tls { 443 } else { 80 });

        if let Some(domain) = self.domains.get(&name) {
            if domain.listens_on(port) {
                return domain.clone();
            }
        }
        self.default.clone()
    }

    /// Look a domain up by exact name, falling back to the default domain.
    /// Used by the certificate store, where the name comes from SNI.
    pub fn domain_or_default(&self, name: &str) -> Arc<DomainConfig> {
        self.domains
            .get(&name.to_lowercase())
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    /// The configured default domain.
    pub fn default_domain(&self) -> Arc<DomainConfig> {
        self.default.clone()
    }

    /// The address listeners bind on.
    pub fn listen_host(&self) -> &str {
        &self.listen_host
    }

    /// All registered domains.
    pub fn domains(&self) -> impl Iterator<Item = &Arc<DomainConfig>> {
        self.domains.values()
    }
}

/// Split a `Host` header into a lower-cased name and an optional port.
/// A trailing `:port` that does not parse is treated as absent.
fn split_host_header(header: &str) -> (String, Option<u16>) {
    // Bracketed IPv6 literal, with or without a port. The name is the
    // unbracketed address.
    if let Some(rest) = header.strip_prefix('[') {
        if let Some((name, tail)) = rest.split_once(']') {
            let port = tail.strip_prefix(':').and_then(|p| p.parse().ok());
            return (name.to_lowercase(), port);
        }
    }
    match header.rsplit_once(':') {
        Some((name, port)) => (name.to_lowercase(), port.parse::<u16>().ok()),
        None => (header.to_lowercase(), None),
    }
}
