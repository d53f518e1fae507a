//! Benchmark scoring.
//!
//! [`question_scorer`] implements the official GAIA comparison. [`score`]
//! applies it to a result file, falling back to the answer files under the
//! logs directory for tasks recorded without an answer when relax mode is
//! on.

pub mod compare;
pub mod report;

pub use compare::{normalize_number_str, normalize_str, question_scorer};
pub use report::{
    collect_relax_answers, relax_key, score, scored_path, LevelReport, ScoreReport, ScoreStat,
    ScoredTask,
};
