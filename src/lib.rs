//! Multi-tenant HTTP file server library.

pub mod archive;
pub mod auth;
pub mod config;
pub mod http;
pub mod net;
pub mod observability;
pub mod routing;
pub mod sync;
pub mod tls;
pub mod upload;

pub use auth::{AuthExtension, ExtensionRegistry, ServeExtension};
pub use config::{Config, DomainConfig};
pub use net::Server;
