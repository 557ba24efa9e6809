//! # Tessera CLI Module
//!
//! This module implements the CLI interface for Tessera.
//!
//! Every command loads a JSON dataset into a fresh session, lets the rule
//! engine reach fixpoint, then reports on the result.
//!
//! ## Available Commands
//!
//! - `stats` - Count quads, graphs and rules
//! - `infer` - Print the quads present after inference
//! - `query` - Run a snapshot query from a JSON file
//! - `explain` - Show the derivation of one quad
//! - `status` - Show the live match state of one rule

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tessera::config::AppConfig;
use tessera_core::TesseraError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Tessera - RDF quad store with incremental rules
///
/// Loads quads and rules from JSON, maintains the consequences, and answers
/// queries over the result.
#[derive(Parser, Debug)]
#[command(name = "tessera")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file (default: ./tessera.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Suppress the load summary
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Count quads, graphs and rules after inference
    Stats {
        /// Dataset file (JSON)
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Print the quads present after inference
    Infer {
        /// Dataset file (JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Only print quads of this graph IRI
        #[arg(short, long)]
        graph: Option<String>,
    },

    /// Run a snapshot query
    Query {
        /// Dataset file (JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Query file (JSON with "positive" and "negative" patterns)
        #[arg(short = 'Q', long)]
        query: PathBuf,
    },

    /// Explain how a quad was produced
    Explain {
        /// Dataset file (JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// The quad, as JSON (same shape as a dataset quad)
        #[arg(long)]
        quad: String,
    },

    /// Show the live match state of a rule
    Status {
        /// Dataset file (JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Rule IRI
        #[arg(short, long)]
        rule: String,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli, config: &AppConfig) -> Result<(), TesseraError> {
    let output = Output {
        json: cli.json,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Stats { data } => cmd_stats(config, output, &data),
        Commands::Infer { data, graph } => cmd_infer(config, output, &data, graph.as_deref()),
        Commands::Query { data, query } => cmd_query(config, output, &data, &query),
        Commands::Explain { data, quad } => cmd_explain(config, output, &data, &quad),
        Commands::Status { data, rule } => cmd_status(config, output, &data, &rule),
    }
}
