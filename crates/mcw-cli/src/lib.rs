//! Mailchimp Writer CLI Library
//!
//! Command-line entry point that wires the data directory layout to the
//! writer library.
//!
//! - **Run**: validate every input table, then submit them to Mailchimp (`mcwriter run`)
//! - **Validate**: clean every input table without network access (`mcwriter validate`)
//!
//! Input tables are read from `<data_dir>/in/tables`, reports are written to
//! `<data_dir>/out/tables`.

pub mod commands;
pub mod config;

pub use config::Config;

use clap::{Parser, Subcommand};
use mcw_writer::SubmissionMode;
use std::path::PathBuf;

/// mcwriter - load lists, members and merge fields into Mailchimp
#[derive(Parser, Debug)]
#[command(name = "mcwriter")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Data directory holding config.json, in/tables and out/tables
    #[arg(long, env = "MCW_DATA_DIR", default_value = config::DEFAULT_DATA_DIR, global = true)]
    pub data_dir: PathBuf,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate all input tables and submit them to Mailchimp
    Run {
        /// Submission mode (auto, serial, batch); overrides config.json
        #[arg(short, long)]
        mode: Option<SubmissionMode>,
    },

    /// Validate all input tables without contacting Mailchimp
    Validate,
}
