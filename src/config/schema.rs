//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Name of the fallback domain every configuration must contain.
pub const DEFAULT_DOMAIN: &str = "default";

/// Root configuration: one process, many virtual domains.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Address to bind listeners on (port comes from each domain).
    pub listen_host: String,

    /// Virtual domain definitions, keyed by host name.
    ///
    /// The loader guarantees a `"default"` entry exists; requests that match
    /// no configured domain fall back to it.
    pub domains: HashMap<String, DomainConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let mut domains = HashMap::new();
        domains.insert(DEFAULT_DOMAIN.to_string(), DomainConfig::default());
        Self {
            listen_host: "0.0.0.0".to_string(),
            domains,
        }
    }
}

/// Configuration for a single virtual domain.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DomainConfig {
    /// Host name this domain answers to. Filled from the map key on load.
    #[serde(skip)]
    pub host: String,

    /// Primary listening port. Serves TLS when cert/key paths are set.
    pub port: u16,

    /// Additional ports, each with its own TLS flag.
    pub alt_ports: Vec<AltPort>,

    /// Directory files are served from and uploads land under.
    pub root_dir: PathBuf,

    /// URL path that accepts file uploads.
    pub upload_path: String,

    /// URL path that accepts archive uploads for in-place extraction.
    pub extract_path: String,

    /// Maximum accepted upload body size in bytes.
    pub max_upload_size: u64,

    /// Read/write timeout for requests, in seconds.
    pub timeout_secs: u64,

    /// Serve `index.html` for directory requests instead of a listing.
    pub default_to_index: bool,

    /// Path to the TLS certificate file (PEM). Requires `key_file`.
    pub cert_file: Option<PathBuf>,

    /// Path to the TLS private key file (PEM). Requires `cert_file`.
    pub key_file: Option<PathBuf>,

    /// Refuse uploads/extractions that would replace an existing file.
    pub prevent_overwrite: bool,

    /// HTTP methods that require authentication.
    pub auth_methods: Vec<String>,

    /// htpasswd file used by the built-in basic authentication.
    pub htpasswd_file: Option<PathBuf>,

    /// Name of a registered authentication extension, replacing basic auth.
    pub auth_extension: Option<String>,

    /// Opaque configuration handed to the authentication extension.
    pub auth_extension_conf: Option<toml::Value>,

    /// Name of a registered serve extension, replacing all request handling.
    pub serve_extension: Option<String>,

    /// Opaque configuration handed to the serve extension.
    pub serve_extension_conf: Option<toml::Value>,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 8080,
            alt_ports: Vec::new(),
            root_dir: PathBuf::from("."),
            upload_path: "/u/".to_string(),
            extract_path: "/e/".to_string(),
            max_upload_size: 10 << 20,
            timeout_secs: 240,
            default_to_index: false,
            cert_file: None,
            key_file: None,
            prevent_overwrite: false,
            auth_methods: vec!["POST".to_string()],
            htpasswd_file: None,
            auth_extension: None,
            auth_extension_conf: None,
            serve_extension: None,
            serve_extension_conf: None,
        }
    }
}

/// A secondary port binding for a domain.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct AltPort {
    pub port: u16,

    /// Serve TLS on this port.
    #[serde(default)]
    pub use_tls: bool,
}

impl DomainConfig {
    /// Whether this domain serves TLS on its primary port.
    pub fn has_tls(&self) -> bool {
        self.cert_file.is_some() && self.key_file.is_some()
    }

    /// Every port this domain listens on, with its TLS flag.
    pub fn port_bindings(&self) -> Vec<PortBinding> {
        let mut bindings = vec![PortBinding {
            port: self.port,
            use_tls: self.has_tls(),
        }];
        for alt in &self.alt_ports {
            bindings.push(PortBinding {
                port: alt.port,
                use_tls: alt.use_tls,
            });
        }
        bindings
    }

    /// Whether this domain declares `port` among its bindings.
    pub fn listens_on(&self, port: u16) -> bool {
        self.port == port || self.alt_ports.iter().any(|a| a.port == port)
    }

    /// Whether requests with this method must authenticate first.
    pub fn requires_auth(&self, method: &str) -> bool {
        self.auth_methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }
}

/// One listening socket: a port number plus its TLS mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortBinding {
    pub port: u16,
    pub use_tls: bool,
}

impl Config {
    /// Deduplicated port bindings across every configured domain.
    ///
    /// Validation guarantees a port never appears with two different TLS
    /// flags, so deduplication by port number is unambiguous.
    pub fn port_bindings(&self) -> Vec<PortBinding> {
        let mut seen = std::collections::HashSet::new();
        let mut bindings = Vec::new();
        for domain in self.domains.values() {
            for binding in domain.port_bindings() {
                if seen.insert(binding.port) {
                    bindings.push(binding);
                }
            }
        }
        bindings.sort_by_key(|b| b.port);
        bindings
    }
}
