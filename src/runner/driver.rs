//! Batch driver: walks the selected levels of a split, one task at a time.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use super::isolated::TaskLog;
use super::retry::{run_with_retry, RetryPolicy, TaskRunOutcome};
use crate::config::HarnessConfig;
use crate::dataset::{GaiaTask, Level, TaskSource};
use crate::error::HarnessError;
use crate::query::task_to_query;
use crate::society::SharedFactory;
use crate::store::{ResultRecord, ResultStore};

/// Counters for one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Tasks run in this invocation.
    pub processed: usize,
    /// Tasks already present in the result file.
    pub skipped: usize,
    pub answered: usize,
    /// Tasks recorded with an empty answer.
    pub failed: usize,
}

/// Runs every selected task through the society and records the results.
pub struct Driver {
    config: HarnessConfig,
    source: Box<dyn TaskSource>,
    factory: SharedFactory,
}

impl Driver {
    pub fn new(config: HarnessConfig, source: Box<dyn TaskSource>, factory: SharedFactory) -> Self {
        Self {
            config,
            source,
            factory,
        }
    }

    /// Run the batch, resuming from the result file.
    pub async fn run(&self) -> Result<RunSummary, HarnessError> {
        let mut store = ResultStore::open(self.config.result_path())?;
        let mut summary = RunSummary::default();
        let policy = RetryPolicy {
            retry_limit: self.config.retry_limit,
            relax_mode: self.config.relax_mode,
        };

        info!(
            split = %self.config.split,
            levels = ?self.config.levels,
            society = self.factory.name(),
            already_recorded = store.len(),
            "Starting batch run"
        );

        for &level in &self.config.levels {
            let tasks = self.select_tasks(level)?;
            let log_dir = self.config.level_log_dir(level);
            fs::create_dir_all(&log_dir)?;
            let total = tasks.len();

            for (idx, task) in tasks.iter().enumerate() {
                if store.contains(&task.task_id) {
                    println!("({}/{}) Skipping {}", idx + 1, total, task.task_id);
                    summary.skipped += 1;
                    continue;
                }
                println!("({}/{}) Processing {}", idx + 1, total, task.task_id);

                let outcome = self.run_task(task, &log_dir, policy).await;
                write_history(&log_dir, &task.task_id, &outcome);

                let record = ResultRecord {
                    task_id: task.task_id.clone(),
                    model_answer: outcome.answer.clone(),
                    level: Some(level),
                    attempts: Some(outcome.attempts),
                    duration_secs: Some(outcome.duration.as_secs_f64()),
                    token_count: outcome.token_count,
                };
                store.append(record)?;

                summary.processed += 1;
                if outcome.answered() {
                    summary.answered += 1;
                } else {
                    summary.failed += 1;
                    warn!(task_id = %task.task_id, attempts = outcome.attempts, "No answer after all attempts");
                }
            }
        }

        info!(
            processed = summary.processed,
            skipped = summary.skipped,
            answered = summary.answered,
            failed = summary.failed,
            "Batch run finished"
        );
        Ok(summary)
    }

    fn select_tasks(&self, level: Level) -> Result<Vec<GaiaTask>, HarnessError> {
        let mut tasks = self.source.tasks(self.config.split, level)?;
        if !self.config.task_ids.is_empty() {
            tasks.retain(|t| self.config.task_ids.contains(&t.task_id));
        }
        if let Some(max) = self.config.max_tasks {
            tasks.truncate(max);
        }
        Ok(tasks)
    }

    async fn run_task(&self, task: &GaiaTask, log_dir: &Path, policy: RetryPolicy) -> TaskRunOutcome {
        let output_file = log_dir.join(format!("{}.txt", task.task_id));
        let log = TaskLog::new(
            log_dir.join(format!("{}.log", task.task_id)),
            &self.config.log_level,
        );
        let query = task_to_query(task, &output_file);
        run_with_retry(&self.factory, &query, &output_file, Some(log), policy).await
    }
}

fn write_history(log_dir: &Path, task_id: &str, outcome: &TaskRunOutcome) {
    if outcome.chat_history.is_empty() {
        return;
    }
    let path = log_dir.join(format!("{}.history.json", task_id));
    let written = serde_json::to_string_pretty(&outcome.chat_history)
        .map_err(std::io::Error::from)
        .and_then(|json| fs::write(&path, json));
    if let Err(e) = written {
        warn!(path = %path.display(), error = %e, "Failed to write chat history");
    }
}
