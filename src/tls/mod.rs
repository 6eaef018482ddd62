//! TLS subsystem: certificate cache and SNI selection.
//!
//! # Data Flow
//! ```text
//! TLS handshake (client hello, SNI name)
//!     → sni.rs (ResolvesServerCert callback)
//!     → store.rs (cache hit, or keyed-lock + disk load)
//!     → Arc<CertifiedKey> handed back to rustls
//! ```

pub mod sni;
pub mod store;

pub use sni::{server_config, SniResolver};
pub use store::{CertStore, TlsError};
