//! Command-line interface for shareguard.
//!
//! This module provides the CLI structure for the `shareguard` binary.

mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    CategoryArg, CheckCommand, ConfigCommand, OutputFormat, ScanCommand, SelectorsCommand,
};

/// shareguard - Keep sensitive page content off shared screens
///
/// Classifies text, inspects the structural selectors known for a site, and
/// runs one capture-active redaction scan over an HTML snapshot.
#[derive(Debug, Parser)]
#[command(name = "shareguard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Mask sensitive elements in an HTML snapshot and report them
    Scan(ScanCommand),

    /// Classify a text fragment
    Check(CheckCommand),

    /// Show the structural selectors for a host
    Selectors(SelectorsCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
