//! Virtual host resolution subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → Host header + listener port
//!     → resolver.rs (registry lookup, port check)
//!     → Arc<DomainConfig> (or the "default" domain)
//! ```

pub mod resolver;

pub use resolver::DomainRegistry;
