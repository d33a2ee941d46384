//! askrelay Core Library
//!
//! Shared functionality for the askrelay service:
//! - Immutable relay configuration and request limits
//! - Tracing/logging initialization
//! - Common error types

pub mod config;
pub mod error;
pub mod tracing_init;

pub use config::RelayConfig;
pub use error::{Error, Result};
