//! Error types for procview.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//!
//! # Human-Facing Output
//!
//! Errors can be formatted for human consumption with headline, reason, and fix:
//! ```text
//! ✗ Invalid Selector
//!   Reason: invalid selector: "tpc"
//!   Fix: Valid selectors: all, inet, inet4, inet6, tcp, tcp4, tcp6, udp, udp4, udp6
//! ```
//!
//! # Machine-Facing Output
//!
//! Errors serialize to structured JSON:
//! ```json
//! {
//!   "code": 21,
//!   "category": "decode",
//!   "message": "unknown connection state code: 1F",
//!   "recoverable": false,
//!   "suggested_action": "abort",
//!   "context": { "state_code": "1F" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for procview operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Caller supplied an unsupported table selector.
    Selector,
    /// Kernel table content failed structural decoding.
    Decode,
    /// Per-process table access errors.
    Process,
    /// Block device and mount table errors.
    Disk,
    /// File I/O and serialization errors.
    Io,
    /// Platform compatibility errors.
    Platform,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Selector => write!(f, "selector"),
            ErrorCategory::Decode => write!(f, "decode"),
            ErrorCategory::Process => write!(f, "process"),
            ErrorCategory::Disk => write!(f, "disk"),
            ErrorCategory::Io => write!(f, "io"),
            ErrorCategory::Platform => write!(f, "platform"),
        }
    }
}

/// Suggested actions for automation in response to errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Retry the operation (possibly with backoff).
    Retry,
    /// Re-run the enclosing scan to get a fresh snapshot.
    Rescan,
    /// Request elevated privileges.
    Elevate,
    /// Skip this item and continue.
    Skip,
    /// Abort the operation.
    Abort,
    /// Manual intervention required.
    ManualIntervention,
    /// No action needed (informational).
    None,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::Rescan => write!(f, "rescan"),
            SuggestedAction::Elevate => write!(f, "elevate"),
            SuggestedAction::Skip => write!(f, "skip"),
            SuggestedAction::Abort => write!(f, "abort"),
            SuggestedAction::ManualIntervention => write!(f, "manual_intervention"),
            SuggestedAction::None => write!(f, "none"),
        }
    }
}

/// Unified error type for procview.
#[derive(Error, Debug)]
pub enum Error {
    // Selector errors (10-19)
    #[error("invalid selector: {0:?}")]
    Selector(String),

    // Decode errors (20-29)
    #[error("malformed address token: {0:?}")]
    AddressDecode(String),

    #[error("unknown connection state code: {0}")]
    UnknownState(String),

    #[error("unknown timer code: {0}")]
    UnknownTimer(u8),

    #[error("malformed {field} field: {value:?}")]
    FieldDecode { field: String, value: String },

    // Process errors (30-39)
    #[error("process {pid} not found")]
    ProcessVanished { pid: u32 },

    #[error("permission denied accessing process {pid}")]
    ProcessDenied { pid: u32 },

    #[error("parse error for process {pid}: {message}")]
    ProcessParse { pid: u32, message: String },

    // Disk errors (40-49)
    #[error("block device not found: {0}")]
    DeviceNotFound(String),

    #[error("malformed device attribute {attr}: {value:?}")]
    DeviceAttr { attr: String, value: String },

    #[error("statvfs failed for {path}")]
    Statvfs { path: String },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Platform errors (70-79)
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Selector errors
    /// - 20-29: Decode errors
    /// - 30-39: Process errors
    /// - 40-49: Disk errors
    /// - 60-69: I/O errors
    /// - 70-79: Platform errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Selector(_) => 10,
            Error::AddressDecode(_) => 20,
            Error::UnknownState(_) => 21,
            Error::UnknownTimer(_) => 22,
            Error::FieldDecode { .. } => 23,
            Error::ProcessVanished { .. } => 30,
            Error::ProcessDenied { .. } => 31,
            Error::ProcessParse { .. } => 32,
            Error::DeviceNotFound(_) => 40,
            Error::DeviceAttr { .. } => 41,
            Error::Statvfs { .. } => 42,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::UnsupportedPlatform(_) => 70,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Selector(_) => ErrorCategory::Selector,

            Error::AddressDecode(_)
            | Error::UnknownState(_)
            | Error::UnknownTimer(_)
            | Error::FieldDecode { .. } => ErrorCategory::Decode,

            Error::ProcessVanished { .. }
            | Error::ProcessDenied { .. }
            | Error::ProcessParse { .. } => ErrorCategory::Process,

            Error::DeviceNotFound(_) | Error::DeviceAttr { .. } | Error::Statvfs { .. } => {
                ErrorCategory::Disk
            }

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,

            Error::UnsupportedPlatform(_) => ErrorCategory::Platform,
        }
    }

    /// Returns whether this error is potentially recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Caller can correct the selector and retry
            Error::Selector(_) => true,

            // Decode failures imply an unsupported kernel table format
            Error::AddressDecode(_) => false,
            Error::UnknownState(_) => false,
            Error::UnknownTimer(_) => false,
            Error::FieldDecode { .. } => false,

            Error::ProcessVanished { .. } => false, // Process is gone
            Error::ProcessDenied { .. } => true,    // Can elevate
            Error::ProcessParse { .. } => false,

            Error::DeviceNotFound(_) => false,
            Error::DeviceAttr { .. } => false,
            Error::Statvfs { .. } => true,

            // I/O: often transient
            Error::Io(_) => true,
            Error::Json(_) => true,

            Error::UnsupportedPlatform(_) => false,
        }
    }

    /// Returns the suggested action for automation.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::Selector(_) => SuggestedAction::ManualIntervention,

            Error::AddressDecode(_) => SuggestedAction::Abort,
            Error::UnknownState(_) => SuggestedAction::Abort,
            Error::UnknownTimer(_) => SuggestedAction::Abort,
            Error::FieldDecode { .. } => SuggestedAction::Abort,

            Error::ProcessVanished { .. } => SuggestedAction::Skip,
            Error::ProcessDenied { .. } => SuggestedAction::Elevate,
            Error::ProcessParse { .. } => SuggestedAction::Skip,

            Error::DeviceNotFound(_) => SuggestedAction::Rescan,
            Error::DeviceAttr { .. } => SuggestedAction::Skip,
            Error::Statvfs { .. } => SuggestedAction::Retry,

            Error::Io(_) => SuggestedAction::Retry,
            Error::Json(_) => SuggestedAction::ManualIntervention,

            Error::UnsupportedPlatform(_) => SuggestedAction::Abort,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Selector(_) => {
                "Valid selectors: all, inet, inet4, inet6, tcp, tcp4, tcp6, udp, udp4, udp6."
            }

            Error::AddressDecode(_) => {
                "A kernel table emitted an address token this build cannot decode. Report it with the raw table line."
            }
            Error::UnknownState(_) => {
                "The kernel reported a connection state outside the supported set. This usually means a newer kernel table format."
            }
            Error::UnknownTimer(_) => {
                "The kernel reported a timer code outside the supported set. This usually means a newer kernel table format."
            }
            Error::FieldDecode { .. } => {
                "A kernel table field failed to parse. Report it with the raw table line."
            }

            Error::ProcessVanished { .. } => {
                "The process exited during the scan. This is normal for short-lived processes."
            }
            Error::ProcessDenied { .. } => {
                "Run with elevated privileges: 'sudo procview'."
            }
            Error::ProcessParse { .. } => {
                "The process status files did not parse. Re-run the scan; report if persistent."
            }

            Error::DeviceNotFound(_) => {
                "List available block devices with 'procview disks'."
            }
            Error::DeviceAttr { .. } => {
                "A sysfs attribute did not parse. The device may be mid-hotplug; retry the query."
            }
            Error::Statvfs { .. } => {
                "Check that the path is a mounted, readable filesystem."
            }

            Error::Io(_) => {
                "Check permissions on /proc and /sys, then retry the operation."
            }
            Error::Json(_) => {
                "Output serialization failed. Report this as a bug with the command line used."
            }

            Error::UnsupportedPlatform(_) => {
                "procview reads Linux kernel tables; other platforms are not supported."
            }
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Selector(_) => "Invalid Selector",

            Error::AddressDecode(_) => "Address Decode Failed",
            Error::UnknownState(_) => "Unknown Connection State",
            Error::UnknownTimer(_) => "Unknown Timer Code",
            Error::FieldDecode { .. } => "Malformed Table Field",

            Error::ProcessVanished { .. } => "Process Not Found",
            Error::ProcessDenied { .. } => "Permission Denied",
            Error::ProcessParse { .. } => "Process Parse Error",

            Error::DeviceNotFound(_) => "Block Device Not Found",
            Error::DeviceAttr { .. } => "Malformed Device Attribute",
            Error::Statvfs { .. } => "Filesystem Stat Failed",

            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Serialization Error",

            Error::UnsupportedPlatform(_) => "Unsupported Platform",
        }
    }
}

/// Structured error response for JSON output.
///
/// Used by machine consumers for parseable error reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Suggested action for automation.
    pub suggested_action: SuggestedAction,

    /// Additional structured context (e.g. pid, token).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::Selector(selector) => {
                context.insert("selector".to_string(), serde_json::json!(selector));
            }
            Error::AddressDecode(token) => {
                context.insert("token".to_string(), serde_json::json!(token));
            }
            Error::UnknownState(code) => {
                context.insert("state_code".to_string(), serde_json::json!(code));
            }
            Error::UnknownTimer(code) => {
                context.insert("timer_code".to_string(), serde_json::json!(code));
            }
            Error::FieldDecode { field, value } => {
                context.insert("field".to_string(), serde_json::json!(field));
                context.insert("value".to_string(), serde_json::json!(value));
            }
            Error::ProcessVanished { pid }
            | Error::ProcessDenied { pid }
            | Error::ProcessParse { pid, .. } => {
                context.insert("pid".to_string(), serde_json::json!(pid));
            }
            Error::DeviceNotFound(name) => {
                context.insert("device".to_string(), serde_json::json!(name));
            }
            Error::DeviceAttr { attr, .. } => {
                context.insert("attr".to_string(), serde_json::json!(attr));
            }
            Error::Statvfs { path } => {
                context.insert("path".to_string(), serde_json::json!(path));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }

    /// Serialize to pretty JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.to_json())
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}
