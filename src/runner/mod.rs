//! Task runner for GAIA evaluation.
//!
//! # Architecture
//!
//! ```text
//! GaiaTask → query → run_with_retry → run_isolated (own thread + runtime) → Society
//!                          ↓
//!                 <logs>/<split>-<level>/<task_id>.txt → FINAL ANSWER → ResultStore
//! ```
//!
//! The [`Driver`] walks the selected levels one task at a time, skipping
//! tasks already present in the result file, and appends one record per task
//! as soon as it finishes.
//!
//! # Example
//!
//! ```ignore
//! use gaia_harness::config::HarnessConfig;
//! use gaia_harness::dataset::GaiaLoader;
//! use gaia_harness::runner::Driver;
//!
//! let config = HarnessConfig::load(None)?;
//! let factory = config.society.build_factory();
//! let loader = GaiaLoader::new(&config.data_dir);
//! let summary = Driver::new(config, Box::new(loader), factory).run().await?;
//! println!("answered {} of {}", summary.answered, summary.processed);
//! ```

pub mod driver;
pub mod isolated;
pub mod retry;

pub use driver::{Driver, RunSummary};
pub use isolated::{run_isolated, task_log_filter, TaskLog};
pub use retry::{inspect_output, run_with_retry, AttemptOutcome, RetryPolicy, TaskRunOutcome};
