//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

/// Scan command arguments.
#[derive(Debug, Args)]
pub struct ScanCommand {
    /// HTML snapshot to scan
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Hostname the snapshot was served from (selects structural selectors)
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Disable a built-in category (repeatable)
    #[arg(long = "disable", value_enum, value_name = "CATEGORY")]
    pub disabled: Vec<CategoryArg>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Check command arguments.
#[derive(Debug, Args)]
pub struct CheckCommand {
    /// Text fragment to classify
    pub text: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Selectors command arguments.
#[derive(Debug, Args)]
pub struct SelectorsCommand {
    /// Hostname to look up; lists every known surface when omitted
    pub host: Option<String>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Built-in category argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CategoryArg {
    /// Email addresses
    Email,
    /// Card numbers
    CreditCard,
    /// API keys and secret tokens
    ApiKey,
    /// Account numbers
    AccountNumber,
    /// Monetary amounts
    Revenue,
    /// Phone numbers and SSN-shaped identifiers
    Pii,
}

impl From<CategoryArg> for crate::category::Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Email => Self::Email,
            CategoryArg::CreditCard => Self::CreditCard,
            CategoryArg::ApiKey => Self::ApiKey,
            CategoryArg::AccountNumber => Self::AccountNumber,
            CategoryArg::Revenue => Self::Revenue,
            CategoryArg::Pii => Self::Pii,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}
