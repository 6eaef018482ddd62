//! HTTP layer.
//!
//! # Data Flow
//! ```text
//! listener (plain or TLS)
//!     → server.rs dispatch (domain resolve, auth gate)
//!     → upload / extract / static file handlers
//!     → error.rs (status mapping for failures)
//! ```

pub mod error;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{build_router, AppState};
