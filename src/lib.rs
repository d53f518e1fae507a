//! gaia-harness: run LLM agent societies against the GAIA benchmark.
//!
//! This library loads GAIA tasks, turns them into queries with an answer-file
//! contract, runs each one on an isolated agent society with bounded retry,
//! checkpoints answers to a JSONL result file and scores them.

pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod llm;
pub mod query;
pub mod runner;
pub mod scorer;
pub mod society;
pub mod store;

#[cfg(test)]
mod test_http;

// Re-export commonly used error types
pub use error::{ConfigError, DatasetError, HarnessError, LlmError, SocietyError, StoreError};
