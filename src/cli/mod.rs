//! CLI module - Command-line interface for Anicat
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// Anicat - Anime catalog aggregator
/// Serves catalog data from several anime websites behind one API
#[derive(Parser)]
#[command(name = "anicat")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the API server, job workers and refresh scheduler (default)
    #[command(alias = "daemon", alias = "-d")]
    Serve,

    /// Refresh the main listing pages of a source now
    Refresh {
        /// Source id, e.g. "animevost"
        source: String,
    },

    /// Show configured sources and their refresh state
    #[command(alias = "ls")]
    Sources,

    /// Create a default config.toml in the current directory
    #[command(alias = "--init")]
    Init,
}

pub use commands::*;
