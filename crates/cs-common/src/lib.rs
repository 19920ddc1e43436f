//! csctl common types, identity, errors, and configuration.
//!
//! This crate provides foundational types shared across cs-core modules:
//! - Service identity types with prefix guarantees
//! - Common error types with the batch/abort propagation split
//! - Output format specification
//! - Configuration loading and validation

pub mod config;
pub mod error;
pub mod id;
pub mod output;

pub use config::{Config, ConfigResolution, ConfigResolver};
pub use error::{Error, Result};
pub use id::{ProcessId, ServiceName};
pub use output::OutputFormat;
