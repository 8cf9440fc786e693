//! # Dagwright CLI Module
//!
//! This module implements the CLI interface for Dagwright.
//!
//! ## Available Commands
//!
//! - `validate` - List structural violations of a graph
//! - `repair` - Run the full deterministic pipeline and emit the `v3` response
//! - `extract` - Extract (and optionally resolve) constraints from a brief
//! - `sentinel` - Compare two graph snapshots for silent data loss
//! - `rules` - Print the violation catalog and the sweep rules

mod commands;

use crate::config::{DEFAULT_CONFIG_FILE, load_config};
use clap::{Parser, Subcommand};
use dagwright_core::{DagwrightError, Pipeline};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Dagwright - deterministic repair for generated decision graphs
///
/// Validates, repairs and reconciles causal decision graphs drafted by a
/// language model, and tells you when the model has to try again.
#[derive(Parser, Debug)]
#[command(name = "dagwright")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the TOML configuration (defaults apply when it does not exist)
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a graph and list its violations
    Validate {
        /// Path to the graph JSON
        #[arg(short, long)]
        graph: PathBuf,
    },

    /// Run the full pipeline and write the external response
    Repair {
        /// Path to the graph JSON
        #[arg(short, long)]
        graph: PathBuf,

        /// Path to the decision brief (plain text)
        #[arg(short, long)]
        brief: Option<PathBuf>,

        /// Goal node that deadline constraints bind to
        #[arg(long)]
        goal_id: Option<String>,

        /// Write the response here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract numeric constraints from a brief
    Extract {
        /// Path to the decision brief (plain text)
        #[arg(short, long)]
        brief: PathBuf,

        /// Resolve targets against this graph
        #[arg(short, long)]
        graph: Option<PathBuf>,

        /// Goal node that deadline constraints bind to
        #[arg(long)]
        goal_id: Option<String>,
    },

    /// Compare a raw graph against a later pipeline snapshot
    Sentinel {
        /// Snapshot before the pipeline (generator output)
        #[arg(long)]
        raw: PathBuf,

        /// Snapshot after the pipeline (graph or full response)
        #[arg(long)]
        output: PathBuf,
    },

    /// Print the violation catalog and sweep rules
    Rules,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), DagwrightError> {
    let json_mode = cli.json_mode;
    let pipeline = Pipeline::new(load_config(&cli.config)?)?;

    match cli.command {
        Commands::Validate { graph } => cmd_validate(&pipeline, json_mode, &graph),
        Commands::Repair {
            graph,
            brief,
            goal_id,
            output,
        } => cmd_repair(
            &pipeline,
            json_mode,
            &graph,
            brief.as_deref(),
            goal_id,
            output.as_deref(),
        ),
        Commands::Extract {
            brief,
            graph,
            goal_id,
        } => cmd_extract(json_mode, &brief, graph.as_deref(), goal_id.as_deref()),
        Commands::Sentinel { raw, output } => cmd_sentinel(&pipeline, json_mode, &raw, &output),
        Commands::Rules => cmd_rules(&pipeline, json_mode),
    }
}
