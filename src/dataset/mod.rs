//! GAIA task source.
//!
//! Tasks come from a local snapshot of the hub dataset (JSONL or parquet
//! metadata plus attachment files), optionally downloaded with
//! [`download_split`].

pub mod hub;
pub mod loader;
pub mod parquet_reader;
pub mod types;

pub use hub::{download_split, DownloadSummary, DEFAULT_GAIA_REPO, DEFAULT_HF_ENDPOINT};
pub use loader::{split_dir, GaiaLoader};
pub use types::{GaiaTask, Level, Split};

use crate::error::DatasetError;

/// Yields benchmark tasks grouped by difficulty level.
pub trait TaskSource: Send + Sync {
    /// Tasks of one level of a split, in dataset order.
    fn tasks(&self, split: Split, level: Level) -> Result<Vec<GaiaTask>, DatasetError>;
}

/// In-memory task source, mostly useful for tests and one-off runs.
#[derive(Debug, Clone, Default)]
pub struct StaticTaskSource {
    tasks: Vec<GaiaTask>,
}

impl StaticTaskSource {
    pub fn new(tasks: Vec<GaiaTask>) -> Self {
        Self { tasks }
    }
}

impl TaskSource for StaticTaskSource {
    fn tasks(&self, _split: Split, level: Level) -> Result<Vec<GaiaTask>, DatasetError> {
        Ok(self
            .tasks
            .iter()
            .filter(|t| t.level == level)
            .cloned()
            .collect())
    }
}
