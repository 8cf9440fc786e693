//! # Dagwright - Deterministic Graph Repair
//!
//! The binary front end for dagwright-core.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                apps/dagwright (THE BINARY)            │
//! │                                                       │
//! │  ┌─────────────┐    ┌──────────────┐                  │
//! │  │   CLI       │    │  TOML config │                  │
//! │  │  (clap)     │    │   (toml)     │                  │
//! │  └──────┬──────┘    └──────┬───────┘                  │
//! │         └─────────┬────────┘                          │
//! │                   ▼                                   │
//! │           ┌────────────────┐                          │
//! │           │ dagwright-core │                          │
//! │           │  (THE LOGIC)   │                          │
//! │           └────────────────┘                          │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! dagwright validate -g draft.json
//! dagwright repair -g draft.json -b brief.txt --goal-id goal_profit -o response.json
//! dagwright extract -b brief.txt
//! dagwright sentinel --raw draft.json --output response.json
//! dagwright rules --json-mode
//! ```

use clap::Parser;
use dagwright::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // DAGWRIGHT_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("DAGWRIGHT_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let cli = cli::Cli::parse();

    let default_filter = if cli.verbose {
        "dagwright=debug,dagwright_core=debug"
    } else {
        "dagwright=info,dagwright_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    // stdout carries command output, logs go to stderr.
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
