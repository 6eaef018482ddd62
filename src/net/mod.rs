//! Network layer: listener setup and lifecycle.

pub mod listener;

pub use listener::{Server, ServeError};
