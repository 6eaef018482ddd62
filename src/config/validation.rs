//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check TLS material pairing (cert and key together or not at all)
//! - Detect duplicate ports within a domain
//! - Detect a port claimed with conflicting TLS modes across domains
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: Config → Result<(), Vec<ValidationError>>
//! - Runs before the config is accepted into the system

use std::collections::HashMap;

use crate::config::schema::Config;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("domain {domain}: certificate and key files must be set together")]
    UnpairedTlsMaterial { domain: String },

    #[error("domain {domain}: port {port} declared more than once")]
    DuplicatePort { domain: String, port: u16 },

    #[error("port {port} is declared both with and without TLS")]
    ConflictingTlsMode { port: u16 },
}

/// Validate a configuration, collecting every violation.
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // port number -> TLS flag of the first domain that claimed it
    let mut port_modes: HashMap<u16, bool> = HashMap::new();
    let mut conflicting: Vec<u16> = Vec::new();

    let mut names: Vec<&String> = config.domains.keys().collect();
    names.sort();

    for name in names {
        let domain = &config.domains[name];

        if domain.cert_file.is_some() != domain.key_file.is_some() {
            errors.push(ValidationError::UnpairedTlsMaterial {
                domain: name.clone(),
            });
        }

        let mut own_ports = std::collections::HashSet::new();
        for binding in domain.port_bindings() {
            if !own_ports.insert(binding.port) {
                errors.push(ValidationError::DuplicatePort {
                    domain: name.clone(),
                    port: binding.port,
                });
            }
            match port_modes.get(&binding.port) {
                Some(mode) if *mode != binding.use_tls => {
                    if !conflicting.contains(&binding.port) {
                        conflicting.push(binding.port);
                    }
                }
                Some(_) => {}
                None => {
                    port_modes.insert(binding.port, binding.use_tls);
                }
            }
        }
    }

    for port in conflicting {
        errors.push(ValidationError::ConflictingTlsMode { port });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
