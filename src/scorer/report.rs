//! Scoring a result file against ground truth.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::compare::question_scorer;
use crate::config::HarnessConfig;
use crate::dataset::TaskSource;
use crate::error::HarnessError;
use crate::query::read_final_answer;
use crate::store::load_records;

/// Per-task scoring detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTask {
    pub task_question: String,
    pub file_name: String,
    pub ground_truth: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct: Option<bool>,
}

/// Counts for a level or the whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreStat {
    pub total: usize,
    pub correct: usize,
    /// `correct / total` rounded to 4 decimals; 0 for an empty level.
    pub score: f64,
}

impl ScoreStat {
    pub fn new(total: usize, correct: usize) -> Self {
        let score = if total == 0 {
            0.0
        } else {
            ((correct as f64 / total as f64) * 10_000.0).round() / 10_000.0
        };
        Self {
            total,
            correct,
            score,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelReport {
    /// Per-task detail in dataset order, written as a JSON object.
    #[serde(with = "ordered_entries")]
    pub raw: Vec<(String, ScoredTask)>,
    pub stat: ScoreStat,
}

/// A `Vec` of key/value pairs (de)serialized as a map, keeping order.
mod ordered_entries {
    use std::fmt;
    use std::marker::PhantomData;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<V, S>(entries: &[(String, V)], serializer: S) -> Result<S::Ok, S::Error>
    where
        V: Serialize,
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, V, D>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
    where
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        struct EntriesVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
            type Value = Vec<(String, V)>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of task ids")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry()? {
                    entries.push(entry);
                }
                Ok(entries)
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

/// Scores keyed by level name (`level1`, ...), plus the aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    #[serde(flatten)]
    pub levels: BTreeMap<String, LevelReport>,
    pub all_stat: ScoreStat,
}

impl ScoreReport {
    /// Write the report as pretty JSON.
    pub fn write(&self, path: &Path) -> Result<(), HarnessError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// `gaia_validation.jsonl` → `gaia_validation_scored.json`, next to the input.
pub fn scored_path(result_path: &Path) -> PathBuf {
    let stem = result_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "results".to_string());
    result_path.with_file_name(format!("{}_scored.json", stem))
}

/// Normalize an answer file name into a task id.
pub fn relax_key(file_name: &str) -> String {
    let name = file_name.strip_suffix(".txt").unwrap_or(file_name);
    name.replace(' ', "").replace("_-_", "-")
}

/// Collect answers from the `*.txt` answer files of a level directory.
/// A file with the marker but nothing after it yields an empty answer. A
/// missing directory yields no answers.
pub fn collect_relax_answers(dir: &Path) -> Result<HashMap<String, String>, HarnessError> {
    let mut answers = HashMap::new();
    if !dir.is_dir() {
        return Ok(answers);
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("txt") {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match read_final_answer(&path) {
            Ok(Some(answer)) => {
                answers.insert(relax_key(file_name), answer);
            }
            Ok(_) => debug!(path = %path.display(), "No final answer in file"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to read answer file"),
        }
    }

    Ok(answers)
}

/// Score the configured result file.
pub fn score(config: &HarnessConfig, source: &dyn TaskSource) -> Result<ScoreReport, HarnessError> {
    if !config.split.is_scorable() {
        return Err(HarnessError::UnscorableSplit(config.split.to_string()));
    }

    let result_path = config.result_path();
    let records = load_records(&result_path)?;
    info!(path = %result_path.display(), records = records.len(), "Scoring results");

    let mut report = ScoreReport::default();
    let mut all_total = 0;
    let mut all_correct = 0;

    for &level in &config.levels {
        let tasks = source.tasks(config.split, level)?;
        let relax_answers = if config.relax_mode {
            collect_relax_answers(&config.level_log_dir(level))?
        } else {
            HashMap::new()
        };

        let mut level_report = LevelReport::default();
        let mut correct = 0;
        for task in &tasks {
            let model_answer = records
                .get(&task.task_id)
                .map(|r| r.model_answer.clone())
                .filter(|a| !a.is_empty())
                .or_else(|| relax_answers.get(&task.task_id).cloned());

            let is_correct = model_answer
                .as_deref()
                .map(|answer| question_scorer(answer, &task.final_answer));
            if is_correct == Some(true) {
                correct += 1;
            }
            if model_answer.is_none() {
                debug!(task_id = %task.task_id, "No answer found");
            }

            level_report.raw.push((
                task.task_id.clone(),
                ScoredTask {
                    task_question: task.question.clone(),
                    file_name: task.file_name.clone(),
                    ground_truth: task.final_answer.clone(),
                    model_answer,
                    correct: is_correct,
                },
            ));
        }

        level_report.stat = ScoreStat::new(tasks.len(), correct);
        info!(
            level = %level,
            total = level_report.stat.total,
            correct = level_report.stat.correct,
            score = level_report.stat.score,
            "Level scored"
        );
        all_total += tasks.len();
        all_correct += correct;
        report.levels.insert(level.to_string(), level_report);
    }

    report.all_stat = ScoreStat::new(all_total, all_correct);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{GaiaTask, Level, Split, StaticTaskSource};
    use crate::store::{ResultRecord, ResultStore};
    use tempfile::TempDir;

    fn source() -> StaticTaskSource {
        StaticTaskSource::new(vec![
            GaiaTask::new("a", "2+2?", Level::Level1).with_final_answer("4"),
            GaiaTask::new("b", "Capital of France?", Level::Level1).with_final_answer("Paris"),
            GaiaTask::new("c", "Colors?", Level::Level1).with_final_answer("red, blue"),
            GaiaTask::new("d", "Hard one", Level::Level2).with_final_answer("x"),
        ])
    }

    fn entry<'a>(level: &'a LevelReport, task_id: &str) -> &'a ScoredTask {
        level
            .raw
            .iter()
            .find(|(id, _)| id == task_id)
            .map(|(_, task)| task)
            .unwrap()
    }

    fn config(tmp: &TempDir) -> HarnessConfig {
        HarnessConfig::default()
            .with_logs_dir(tmp.path().join("logs"))
            .with_result_file(tmp.path().join("gaia_validation.jsonl"))
            .with_levels(vec![Level::Level1, Level::Level2, Level::Level3])
    }

    #[test]
    fn test_score_with_relax_fallback() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp);
        {
            let mut store = ResultStore::open(config.result_path()).unwrap();
            store.append(ResultRecord::new("a", "4.0")).unwrap();
            store.append(ResultRecord::new("b", "")).unwrap();
            store.append(ResultRecord::new("d", "y")).unwrap();
        }
        let dir = config.level_log_dir(Level::Level1);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("b.txt"), "FINAL ANSWER: paris").unwrap();
        fs::write(dir.join("b.log"), "FINAL ANSWER: ignored").unwrap();

        let report = score(&config, &source()).unwrap();
        let level1 = &report.levels["level1"];
        assert_eq!(level1.stat, ScoreStat::new(3, 2));
        assert_eq!(level1.stat.score, 0.6667);
        assert_eq!(entry(level1, "b").model_answer.as_deref(), Some("paris"));
        assert_eq!(entry(level1, "c").correct, None);

        let level3 = &report.levels["level3"];
        assert_eq!(level3.stat.total, 0);
        assert_eq!(level3.stat.score, 0.0);

        assert_eq!(report.all_stat.total, 4);
        assert_eq!(report.all_stat.correct, 2);
        assert_eq!(report.all_stat.score, 0.5);
    }

    #[test]
    fn test_empty_answer_file_scores_as_incorrect() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp).with_levels(vec![Level::Level1]);
        let dir = config.level_log_dir(Level::Level1);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("a.txt"), "FINAL ANSWER: ").unwrap();

        let report = score(&config, &source()).unwrap();
        let level1 = &report.levels["level1"];
        assert_eq!(entry(level1, "a").model_answer.as_deref(), Some(""));
        assert_eq!(entry(level1, "a").correct, Some(false));
        assert_eq!(entry(level1, "b").correct, None);
        assert_eq!(level1.stat, ScoreStat::new(3, 0));
    }

    #[test]
    fn test_raw_keeps_dataset_order() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp).with_levels(vec![Level::Level1]);
        let source = StaticTaskSource::new(vec![
            GaiaTask::new("zeta", "q", Level::Level1).with_final_answer("1"),
            GaiaTask::new("alpha", "q", Level::Level1).with_final_answer("2"),
            GaiaTask::new("mid", "q", Level::Level1).with_final_answer("3"),
        ]);

        let report = score(&config, &source).unwrap();
        let json = serde_json::to_string(&report).unwrap();
        let zeta = json.find("\"zeta\"").unwrap();
        let alpha = json.find("\"alpha\"").unwrap();
        let mid = json.find("\"mid\"").unwrap();
        assert!(zeta < alpha && alpha < mid);

        let parsed: ScoreReport = serde_json::from_str(&json).unwrap();
        let ids: Vec<&str> = parsed.levels["level1"]
            .raw
            .iter()
            .map(|(id, _)| id.as_str())
            .collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_strict_mode_ignores_answer_files() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp).with_relax_mode(false);
        let dir = config.level_log_dir(Level::Level1);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("a.txt"), "FINAL ANSWER: 4").unwrap();

        let report = score(&config, &source()).unwrap();
        assert_eq!(report.levels["level1"].stat.correct, 0);
    }

    #[test]
    fn test_test_split_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp).with_split(Split::Test);
        assert!(matches!(
            score(&config, &source()),
            Err(HarnessError::UnscorableSplit(_))
        ));
    }

    #[test]
    fn test_report_json_shape() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp).with_levels(vec![Level::Level2]);
        let report = score(&config, &source()).unwrap();

        let path = scored_path(&config.result_path());
        assert!(path.ends_with("gaia_validation_scored.json"));
        report.write(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["level2"]["raw"]["d"]["ground_truth"], "x");
        assert!(json["level2"]["raw"]["d"].get("model_answer").is_none());
        assert_eq!(json["all_stat"]["total"], 1);
    }

    #[test]
    fn test_relax_key_normalization() {
        assert_eq!(relax_key("abc_-_def.txt"), "abc-def");
        assert_eq!(relax_key("abc def.txt"), "abcdef");
        assert_eq!(relax_key("plain"), "plain");
    }
}
