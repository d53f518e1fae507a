//! Core task types for the GAIA benchmark.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::DatasetError;

/// Dataset split. Only `validation` publishes ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Validation,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Validation => "validation",
            Split::Test => "test",
        }
    }

    /// Whether the split ships ground-truth answers that can be scored.
    pub fn is_scorable(&self) -> bool {
        matches!(self, Split::Validation)
    }
}

impl Default for Split {
    fn default() -> Self {
        Self::Validation
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "validation" | "val" | "dev" => Ok(Split::Validation),
            "test" => Ok(Split::Test),
            other => Err(DatasetError::InvalidSplit(other.to_string())),
        }
    }
}

/// GAIA difficulty level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Level1,
    Level2,
    Level3,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Level1, Level::Level2, Level::Level3];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Level1 => "level1",
            Level::Level2 => "level2",
            Level::Level3 => "level3",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let digits = normalized
            .strip_prefix("level")
            .unwrap_or(&normalized)
            .trim_start_matches(['_', '-', ' ']);
        match digits {
            "1" => Ok(Level::Level1),
            "2" => Ok(Level::Level2),
            "3" => Ok(Level::Level3),
            _ => Err(DatasetError::InvalidLevel(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Hub metadata stores the level as "1" in some snapshots and 1 in others.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u64),
            Text(String),
        }

        let text = match Raw::deserialize(deserializer)? {
            Raw::Int(n) => n.to_string(),
            Raw::Text(s) => s,
        };
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A single GAIA task as it appears in the dataset metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaiaTask {
    pub task_id: String,
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(rename = "Level")]
    pub level: Level,
    /// Ground truth. The test split publishes `?` here.
    #[serde(rename = "Final answer", default)]
    pub final_answer: String,
    #[serde(default)]
    pub file_name: String,
    /// Absolute attachment path, resolved by the loader.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    #[serde(
        rename = "Annotator Metadata",
        default,
        skip_serializing_if = "serde_json::Value::is_null"
    )]
    pub annotator_metadata: serde_json::Value,
}

impl GaiaTask {
    pub fn new(task_id: impl Into<String>, question: impl Into<String>, level: Level) -> Self {
        Self {
            task_id: task_id.into(),
            question: question.into(),
            level,
            final_answer: String::new(),
            file_name: String::new(),
            file_path: None,
            annotator_metadata: serde_json::Value::Null,
        }
    }

    pub fn with_final_answer(mut self, answer: impl Into<String>) -> Self {
        self.final_answer = answer.into();
        self
    }

    pub fn with_attachment(mut self, file_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.file_name = file_name.into();
        self.file_path = Some(path.into());
        self
    }

    pub fn has_attachment(&self) -> bool {
        !self.file_name.is_empty()
    }
}
