//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! command line flags (default domain)
//!     + config file (TOML, any number of domains)
//!     → loader.rs (parse, merge; file wins)
//!     → validation.rs (semantic checks, all errors collected)
//!     → Config (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{AltPort, Config, DomainConfig, PortBinding, DEFAULT_DOMAIN};
pub use validation::ValidationError;
