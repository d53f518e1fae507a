//! Bounded retry around one task.
//!
//! An attempt only counts as answered when the answer file exists and holds
//! a non-empty answer after the marker. Answer files are not removed between
//! attempts, so an answer written by an earlier attempt is picked up by a
//! later one.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::isolated::{run_isolated, TaskLog};
use crate::error::SocietyError;
use crate::query::read_final_answer;
use crate::society::{ChatTurn, SharedFactory};

/// Retry settings for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retry_limit: u32,
    pub relax_mode: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_limit: 3,
            relax_mode: true,
        }
    }
}

/// How a single attempt ended.
#[derive(Debug)]
pub enum AttemptOutcome {
    AgentFailed(SocietyError),
    MissingOutput,
    MissingAnswer,
    Answered(String),
}

impl AttemptOutcome {
    pub fn is_answered(&self) -> bool {
        matches!(self, AttemptOutcome::Answered(_))
    }
}

/// Result of all attempts for one task.
#[derive(Debug, Default)]
pub struct TaskRunOutcome {
    /// Empty when no attempt produced an answer.
    pub answer: String,
    pub attempts: u32,
    pub duration: Duration,
    /// Token count of the last attempt whose society finished.
    pub token_count: Option<u64>,
    pub chat_history: Vec<ChatTurn>,
}

impl TaskRunOutcome {
    pub fn answered(&self) -> bool {
        !self.answer.is_empty()
    }
}

/// Inspect an answer file.
pub fn inspect_output(output_file: &Path) -> AttemptOutcome {
    if !output_file.exists() {
        return AttemptOutcome::MissingOutput;
    }
    match read_final_answer(output_file) {
        Ok(Some(answer)) if !answer.is_empty() => AttemptOutcome::Answered(answer),
        Ok(_) => AttemptOutcome::MissingAnswer,
        Err(e) => {
            warn!(path = %output_file.display(), error = %e, "Failed to read answer file");
            AttemptOutcome::MissingAnswer
        }
    }
}

/// Run the society on `query` until an answer lands in `output_file` or the
/// retry limit is reached.
pub async fn run_with_retry(
    factory: &SharedFactory,
    query: &str,
    output_file: &Path,
    log: Option<TaskLog>,
    policy: RetryPolicy,
) -> TaskRunOutcome {
    let start = Instant::now();
    let mut outcome = TaskRunOutcome::default();

    for attempt in 1..=policy.retry_limit {
        outcome.attempts = attempt;

        let result = run_isolated(factory.clone(), query.to_string(), log.clone()).await;
        let attempt_outcome = match result {
            Ok(society_outcome) => {
                outcome.token_count = Some(society_outcome.token_count);
                outcome.chat_history = society_outcome.chat_history;
                inspect_output(output_file)
            }
            Err(err) => {
                warn!(attempt, error = %err, "Society attempt failed");
                if policy.relax_mode {
                    match inspect_output(output_file) {
                        AttemptOutcome::Answered(answer) => {
                            info!(attempt, "Recovered answer written before the failure");
                            AttemptOutcome::Answered(answer)
                        }
                        _ => AttemptOutcome::AgentFailed(err),
                    }
                } else {
                    AttemptOutcome::AgentFailed(err)
                }
            }
        };

        match attempt_outcome {
            AttemptOutcome::Answered(answer) => {
                info!(attempt, answer = %answer, "Task answered");
                outcome.answer = answer;
                break;
            }
            AttemptOutcome::MissingOutput => {
                warn!(attempt, path = %output_file.display(), "Answer file was not created");
            }
            AttemptOutcome::MissingAnswer => {
                warn!(attempt, path = %output_file.display(), "Answer file has no final answer");
            }
            AttemptOutcome::AgentFailed(_) => {}
        }
    }

    outcome.duration = start.elapsed();
    outcome
}
