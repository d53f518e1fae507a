//! Thread-isolated society execution.
//!
//! Each run gets its own OS thread with a dedicated current-thread tokio
//! runtime. Agent frameworks that drive browsers or subprocesses keep their
//! event loop state on that thread, never on the driver's runtime. Tracing
//! events emitted on the thread go to the task's log file only.

use std::fs::{self, File, OpenOptions};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;

use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::error::SocietyError;
use crate::society::{SharedFactory, SocietyFactory, SocietyOutcome};

/// HTTP client internals are capped at `warn` in task logs.
const QUIET_TARGETS: &str = "hyper=warn,hyper_util=warn,reqwest=warn,h2=warn,rustls=warn";

/// Log file of one run and the filter applied to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLog {
    pub path: PathBuf,
    pub filter: String,
}

impl TaskLog {
    /// `level` is a level name or `EnvFilter` directives, as given to
    /// `--log-level` or `RUST_LOG`.
    pub fn new(path: impl Into<PathBuf>, level: &str) -> Self {
        Self {
            path: path.into(),
            filter: task_log_filter(level),
        }
    }
}

/// Build the task log filter for `level`. Directives given in `level` take
/// precedence over the HTTP client caps.
pub fn task_log_filter(level: &str) -> String {
    let level = level.trim();
    let level = if level.is_empty() { "info" } else { level };
    format!("{},{}", QUIET_TARGETS, level)
}

/// Construct a society for `query` and run it on a dedicated thread.
///
/// When `log` is given, its file is opened in append mode and receives every
/// tracing event emitted on the worker thread that passes its filter.
pub async fn run_isolated(
    factory: SharedFactory,
    query: String,
    log: Option<TaskLog>,
) -> Result<SocietyOutcome, SocietyError> {
    let log_sink = match log {
        Some(log) => Some((open_log(&log.path)?, log.filter)),
        None => None,
    };

    let (tx, rx) = oneshot::channel();
    let thread_name = format!("society-{}", factory.name());
    let handle = thread::Builder::new()
        .name(thread_name)
        .spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                run_on_thread(factory.as_ref(), &query, log_sink)
            }))
            .unwrap_or_else(|payload| Err(SocietyError::Panicked(panic_message(payload))));
            // The receiver only goes away if the driver was cancelled.
            let _ = tx.send(result);
        })?;

    let result = match rx.await {
        Ok(result) => result,
        Err(_) => Err(SocietyError::Panicked(
            "worker thread exited without reporting".to_string(),
        )),
    };

    match tokio::task::spawn_blocking(move || handle.join()).await {
        Ok(Ok(())) => {}
        Ok(Err(payload)) => {
            error!(panic = %panic_message(payload), "Society thread panicked after reporting")
        }
        Err(e) => error!(error = %e, "Failed to join society thread"),
    }

    if let Err(e) = &result {
        debug!(error = %e, "Isolated society run failed");
    }
    result
}

fn run_on_thread(
    factory: &dyn SocietyFactory,
    query: &str,
    log_sink: Option<(File, String)>,
) -> Result<SocietyOutcome, SocietyError> {
    let work = || -> Result<SocietyOutcome, SocietyError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        info!(society = factory.name(), "Constructing society");
        let society = factory.construct(query)?;
        let outcome = runtime.block_on(society.run());
        match &outcome {
            Ok(o) => info!(tokens = o.token_count, rounds = o.chat_history.len(), "Society finished"),
            Err(e) => error!(error = %e, "Society failed"),
        }
        outcome
    };

    match log_sink {
        Some((file, filter)) => {
            let filter = EnvFilter::try_new(&filter).unwrap_or_else(|e| {
                warn!(filter = %filter, error = %e, "Invalid task log filter, using info");
                EnvFilter::new(task_log_filter("info"))
            });
            let subscriber = Registry::default()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false)
                        .with_thread_names(true),
                );
            tracing::subscriber::with_default(subscriber, work)
        }
        None => work(),
    }
}

fn open_log(path: &Path) -> Result<File, SocietyError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
