//! # Dagwright
//!
//! Library half of the `dagwright` binary: command-line parsing, command
//! implementations and TOML configuration loading. All graph logic lives in
//! `dagwright-core`; this crate only moves bytes between files and it.

pub mod cli;
pub mod config;
