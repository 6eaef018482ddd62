//! Secure archive extraction subsystem.
//!
//! # Data Flow
//! ```text
//! uploaded tar.gz bytes
//!     → extract.rs (gzip decode, entry iteration)
//!     → paths.rs (lexical confinement of names and link targets)
//!     → keyed lock per target path
//!     → files/dirs/symlinks under the domain root
//! ```

pub mod extract;
pub mod paths;

pub use extract::{extract, ExtractError};
