//! Local GAIA snapshot loader.
//!
//! Reads a dataset laid out the way the hub repository is:
//!
//! ```text
//! <root>/2023/validation/metadata.jsonl   (or metadata.parquet)
//! <root>/2023/validation/<attachment files>
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::parquet_reader::read_metadata_parquet;
use super::types::{GaiaTask, Level, Split};
use super::TaskSource;
use crate::error::DatasetError;

/// Dataset release year used by the hub layout.
pub const GAIA_RELEASE: &str = "2023";

const METADATA_JSONL: &str = "metadata.jsonl";
const METADATA_PARQUET: &str = "metadata.parquet";

/// Directory of a split inside a snapshot root.
pub fn split_dir(root: &Path, split: Split) -> PathBuf {
    root.join(GAIA_RELEASE).join(split.as_str())
}

/// Loads GAIA tasks from a local snapshot.
#[derive(Debug, Clone)]
pub struct GaiaLoader {
    root: PathBuf,
}

impl GaiaLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Loads every task of a split, across all levels, in dataset order.
    pub fn load_split(&self, split: Split) -> Result<Vec<GaiaTask>, DatasetError> {
        let dir = split_dir(&self.root, split);
        if !dir.is_dir() {
            return Err(DatasetError::SplitNotFound(dir.display().to_string()));
        }

        let jsonl = dir.join(METADATA_JSONL);
        let parquet = dir.join(METADATA_PARQUET);
        let mut tasks = if jsonl.is_file() {
            read_metadata_jsonl(&jsonl)?
        } else if parquet.is_file() {
            read_metadata_parquet(&parquet)?
        } else {
            return Err(DatasetError::MissingMetadata(dir.display().to_string()));
        };

        let abs_dir = absolute(&dir)?;
        for task in &mut tasks {
            if task.has_attachment() && task.file_path.is_none() {
                task.file_path = Some(abs_dir.join(&task.file_name));
            }
        }

        info!(
            split = %split,
            tasks = tasks.len(),
            path = %dir.display(),
            "Loaded GAIA metadata"
        );
        Ok(tasks)
    }
}

impl TaskSource for GaiaLoader {
    fn tasks(&self, split: Split, level: Level) -> Result<Vec<GaiaTask>, DatasetError> {
        let tasks: Vec<GaiaTask> = self
            .load_split(split)?
            .into_iter()
            .filter(|t| t.level == level)
            .collect();
        debug!(split = %split, level = %level, count = tasks.len(), "Selected tasks for level");
        Ok(tasks)
    }
}

/// Reads a `metadata.jsonl` file. Blank lines are ignored; anything else
/// that fails to parse or has an empty task id is an error.
pub fn read_metadata_jsonl(path: &Path) -> Result<Vec<GaiaTask>, DatasetError> {
    let content = fs::read_to_string(path)?;
    let mut tasks = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let task: GaiaTask =
            serde_json::from_str(line).map_err(|e| DatasetError::MalformedLine {
                path: path.display().to_string(),
                line: idx + 1,
                message: e.to_string(),
            })?;
        if task.task_id.trim().is_empty() {
            return Err(DatasetError::MalformedLine {
                path: path.display().to_string(),
                line: idx + 1,
                message: "empty task_id".to_string(),
            });
        }
        tasks.push(task);
    }
    Ok(tasks)
}

fn absolute(path: &Path) -> Result<PathBuf, DatasetError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
