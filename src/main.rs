//! Multi-tenant HTTP file server.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────┐
//!                    │                  MULTIHOST                    │
//!                    │                                               │
//!   Client Request   │  ┌─────────┐   ┌──────────┐   ┌───────────┐  │
//!   ─────────────────┼─▶│   net   │──▶│   http   │──▶│  routing  │  │
//!                    │  │listener │   │ dispatch │   │  resolver │  │
//!                    │  └────┬────┘   └────┬─────┘   └───────────┘  │
//!                    │       │             │                        │
//!                    │       ▼             ▼                        │
//!                    │  ┌─────────┐   ┌──────────┬─────────┐        │
//!                    │  │   tls   │   │  upload  │ archive │        │
//!                    │  │SNI cache│   │processor │extractor│        │
//!                    │  └─────────┘   └────┬─────┴────┬────┘        │
//!                    │       │             │          │             │
//!                    │       └──────┬──────┴──────────┘             │
//!                    │              ▼                               │
//!                    │        ┌───────────┐                         │
//!                    │        │keyed lock │  (per-path / per-name   │
//!                    │        └───────────┘   mutual exclusion)     │
//!                    └───────────────────────────────────────────────┘
//! ```
//!
//! Several virtual domains share the process; each carries its own root
//! directory, TLS material, authentication policy and extension hooks.

use multihost::auth::ExtensionRegistry;
use multihost::net::Server;
use multihost::{config, observability};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::logging::init();

    // Configuration errors are fatal: the process refuses to start.
    let config = config::load_config()?;

    tracing::info!(
        listen_host = %config.listen_host,
        domains = config.domains.len(),
        ports = ?config
            .port_bindings()
            .iter()
            .map(|b| b.port)
            .collect::<Vec<_>>(),
        "Configuration loaded"
    );

    // Extensions are registered programmatically; none ship by default.
    let extensions = ExtensionRegistry::new();

    let server = Server::new(config, extensions);
    server.run().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
