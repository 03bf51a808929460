//! Command-line interface for provider-match.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **scan**: Stream a coverage file and report which providers it covers
//! - **rank**: Rank candidate providers for a patient against a coverage file
//! - **serve**: Start the JSON ranking API
//!
//! ## Usage
//!
//! ```text
//! # Which of these providers does the plan cover?
//! provider-match scan in-network-rates.json.gz --npi 1234567893 --npi 1245319599
//!
//! # Rank candidates from a directory export for a patient
//! provider-match rank --coverage in-network-rates.json.gz \
//!     --candidates candidates.json --sex F --postal-code 10001
//!
//! # JSON output for scripting
//! provider-match rank ... --format json
//!
//! # Start the API
//! provider-match serve --coverage in-network-rates.json.gz --port 8080
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod rank;
pub mod scan;

#[derive(Parser)]
#[command(name = "provider-match")]
#[command(version)]
#[command(about = "Rank in-network healthcare providers for a patient")]
#[command(
    long_about = "provider-match streams a payer's coverage file to find which candidate providers are in network, without loading the file into memory.\n\nIn-network candidates are then ranked for a patient by:\n- Sex agreement\n- Postal-code proximity\n- Network membership (out-of-network providers are never ranked)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find provider identifiers in a coverage file
    Scan(scan::ScanArgs),

    /// Rank candidate providers for a patient
    Rank(rank::RankArgs),

    /// Start the web server
    Serve(ServeArgs),
}

#[derive(clap::Args)]
pub struct ServeArgs {
    /// Coverage file every ranking request is matched against
    #[arg(long)]
    pub coverage: PathBuf,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Address to bind to
    #[arg(short, long, default_value = "127.0.0.1")]
    pub address: String,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}
