//! Append-only result store.
//!
//! Results are written as one JSON object per line and flushed after every
//! task, so an interrupted batch can resume: on open, existing lines are
//! replayed and their task ids are treated as already processed.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dataset::Level;
use crate::error::StoreError;

/// One persisted task result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub task_id: String,
    /// Extracted answer; empty when every attempt failed.
    pub model_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u64>,
}

impl ResultRecord {
    pub fn new(task_id: impl Into<String>, model_answer: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            model_answer: model_answer.into(),
            level: None,
            attempts: None,
            duration_secs: None,
            token_count: None,
        }
    }

    pub fn has_answer(&self) -> bool {
        !self.model_answer.is_empty()
    }
}

/// JSONL result file opened for appending.
pub struct ResultStore {
    path: PathBuf,
    file: File,
    processed: HashSet<String>,
    records: Vec<ResultRecord>,
}

impl ResultStore {
    /// Open (or create) the result file and replay what it already holds.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let records = if path.exists() {
            replay(&path)?
        } else {
            Vec::new()
        };
        let processed = records.iter().map(|r| r.task_id.clone()).collect();

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(
            path = %path.display(),
            records = records.len(),
            "Opened result store"
        );

        Ok(Self {
            path,
            file,
            processed,
            records,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a result for `task_id` exists.
    pub fn contains(&self, task_id: &str) -> bool {
        self.processed.contains(task_id)
    }

    /// Number of distinct processed tasks.
    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    /// Append one record and flush it to disk.
    pub fn append(&mut self, record: ResultRecord) -> Result<(), StoreError> {
        if self.processed.contains(&record.task_id) {
            return Err(StoreError::Duplicate(record.task_id));
        }

        let line = serde_json::to_string(&record)?;
        writeln!(self.file, "{}", line)?;
        self.file.flush()?;

        self.processed.insert(record.task_id.clone());
        self.records.push(record);
        Ok(())
    }
}

/// Read every well-formed record of a result file.
fn replay(path: &Path) -> Result<Vec<ResultRecord>, StoreError> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ResultRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => warn!(
                path = %path.display(),
                line = idx + 1,
                error = %e,
                "Skipping malformed result line"
            ),
        }
    }
    Ok(records)
}

/// Load a result file keyed by task id. Later records override earlier ones.
/// A missing file yields an empty map.
pub fn load_records(path: &Path) -> Result<HashMap<String, ResultRecord>, StoreError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    Ok(replay(path)?
        .into_iter()
        .map(|r| (r.task_id.clone(), r))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_then_reopen_resumes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out/gaia_validation.jsonl");

        {
            let mut store = ResultStore::open(&path).unwrap();
            assert!(store.is_empty());
            store.append(ResultRecord::new("a", "42")).unwrap();
            store.append(ResultRecord::new("b", "")).unwrap();
        }

        let store = ResultStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.contains("a"));
        assert!(store.contains("b"));
        assert!(!store.contains("c"));
        assert!(!store.records()[1].has_answer());
    }

    #[test]
    fn test_duplicate_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("r.jsonl");
        let mut store = ResultStore::open(&path).unwrap();
        store.append(ResultRecord::new("a", "1")).unwrap();

        let err = store.append(ResultRecord::new("a", "2")).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(id) if id == "a"));
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("r.jsonl");
        fs::write(
            &path,
            "{\"task_id\":\"a\",\"model_answer\":\"x\"}\n{truncated\n\n{\"task_id\":\"b\",\"model_answer\":\"y\",\"attempts\":2}\n",
        )
        .unwrap();

        let store = ResultStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.records()[1].attempts, Some(2));
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let json = serde_json::to_string(&ResultRecord::new("a", "x")).unwrap();
        assert_eq!(json, r#"{"task_id":"a","model_answer":"x"}"#);

        let mut record = ResultRecord::new("b", "y");
        record.level = Some(Level::Level2);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""level":"level2""#));
    }

    #[test]
    fn test_load_records_last_wins_and_missing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("r.jsonl");
        assert!(load_records(&path).unwrap().is_empty());

        fs::write(
            &path,
            "{\"task_id\":\"a\",\"model_answer\":\"\"}\n{\"task_id\":\"a\",\"model_answer\":\"late\"}\n",
        )
        .unwrap();
        let records = load_records(&path).unwrap();
        assert_eq!(records["a"].model_answer, "late");
    }
}
