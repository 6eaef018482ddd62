//! Observability subsystem.
//!
//! # Design Decisions
//! - Structured logging via tracing; request IDs flow through all handlers
//! - No metrics endpoint: out of scope for this server

pub mod logging;
