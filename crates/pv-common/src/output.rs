//! Output format selection shared by the CLI and library consumers.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Supported output formats for record sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Aligned plain-text table for interactive use.
    #[default]
    Table,
    /// JSON envelope for scripting and machine parsing.
    Json,
}

impl OutputFormat {
    /// Returns true when the format is meant for machine consumption.
    pub fn is_machine(&self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
