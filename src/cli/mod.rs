//! Command-line interface for gaia-harness.
//!
//! Provides commands to run the benchmark, score results, fetch the dataset
//! and ask the society a one-off question.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli, Commands};
