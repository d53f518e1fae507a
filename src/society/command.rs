//! External agent program backend.
//!
//! Runs any command-line agent (typically a Python OWL/CAMEL runner) with
//! the query on stdin or as an argument. If the last line of stdout is a JSON
//! object with `answer`, `chat_history` and `token_count`, it is used as the
//! outcome; otherwise all of stdout becomes the answer. Each stderr line is
//! re-emitted as an `info` event under the `external_agent` target, so it
//! lands in the task log.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{info, warn};

use super::{Society, SocietyFactory, SocietyOutcome};
use crate::error::SocietyError;

/// How to launch the external agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSocietyConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Pass the query on stdin (true) or as `--query <query>` (false).
    #[serde(default = "default_use_stdin")]
    pub use_stdin: bool,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_use_stdin() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    3600
}

impl CommandSocietyConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            use_stdin: true,
            working_dir: None,
            env: BTreeMap::new(),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_stdin(mut self, use_stdin: bool) -> Self {
        self.use_stdin = use_stdin;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }
}

/// Builds [`CommandSociety`] instances from a shared configuration.
#[derive(Debug, Clone)]
pub struct CommandSocietyFactory {
    config: CommandSocietyConfig,
}

impl CommandSocietyFactory {
    pub fn new(config: CommandSocietyConfig) -> Self {
        Self { config }
    }
}

impl SocietyFactory for CommandSocietyFactory {
    fn construct(&self, query: &str) -> Result<Box<dyn Society>, SocietyError> {
        if self.config.program.trim().is_empty() {
            return Err(SocietyError::Construction(
                "agent program is empty".to_string(),
            ));
        }
        Ok(Box::new(CommandSociety {
            config: self.config.clone(),
            query: query.to_string(),
        }))
    }

    fn name(&self) -> &str {
        &self.config.program
    }
}

/// One run of an external agent program on one query.
#[derive(Debug, Clone)]
pub struct CommandSociety {
    config: CommandSocietyConfig,
    query: String,
}

#[async_trait]
impl Society for CommandSociety {
    async fn run(&self) -> Result<SocietyOutcome, SocietyError> {
        let start = Instant::now();
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args);
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }

        if self.config.use_stdin {
            cmd.stdin(Stdio::piped());
        } else {
            cmd.stdin(Stdio::null());
            cmd.arg("--query").arg(&self.query);
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        info!(program = %self.config.program, "Starting external agent");

        let mut child = cmd.spawn().map_err(|e| {
            SocietyError::ExecutionFailed(format!("Failed to spawn {}: {}", self.config.program, e))
        })?;

        if self.config.use_stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(self.query.as_bytes()).await?;
                stdin.shutdown().await.ok();
            }
        }

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(SocietyError::Timeout {
                    seconds: self.config.timeout_secs,
                })
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
            info!(target: "external_agent", "{}", line);
        }

        if !output.status.success() {
            return Err(SocietyError::NonZeroExit {
                code: output.status.code().unwrap_or(-1),
                stderr: tail(&stderr, 2000),
            });
        }

        info!(
            duration_secs = start.elapsed().as_secs_f64(),
            "External agent finished"
        );
        Ok(parse_agent_stdout(&stdout))
    }
}

/// Interpret the stdout of an agent program.
pub fn parse_agent_stdout(stdout: &str) -> SocietyOutcome {
    let last_line = stdout.lines().rev().find(|l| !l.trim().is_empty());
    if let Some(line) = last_line {
        let line = line.trim();
        if line.starts_with('{') {
            match serde_json::from_str::<SocietyOutcome>(line) {
                Ok(outcome) => return outcome,
                Err(e) => warn!(error = %e, "Last stdout line looked like JSON but did not parse"),
            }
        }
    }

    SocietyOutcome {
        answer: stdout.trim().to_string(),
        ..Default::default()
    }
}

fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        text.to_string()
    } else {
        text.chars().skip(count - max_chars).collect()
    }
}
