//! procview common types and errors.
//!
//! This crate provides foundational types shared across pv-core modules:
//! - Common error types with stable codes
//! - Output format selection

pub mod error;
pub mod output;

pub use error::{format_error_human, Error, ErrorCategory, Result, StructuredError, SuggestedAction};
pub use output::OutputFormat;

/// Version of the JSON output schema emitted by the CLI.
pub const SCHEMA_VERSION: &str = "1.0.0";
