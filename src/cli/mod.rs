//! Command-line interface for onessa.

mod commands;

use clap::{Parser, Subcommand};

/// onessa - directory-backed license and inventory registry
#[derive(Parser)]
#[command(name = "onessa")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server and the directory sync scheduler (default)
    Serve,

    /// Run one directory sync pass for users and computers, then exit
    Sync,

    /// Create default config file
    #[command(alias = "--init")]
    Init,
}

pub use commands::*;
