//! CLI command definitions for gaia-harness.
//!
//! Every command resolves a [`HarnessConfig`] the same way: defaults, the
//! optional `--config` YAML file, `GAIA_*` environment variables, then the
//! flags given here.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::config::{parse_levels, HarnessConfig, SocietyConfig};
use crate::dataset::{download_split, GaiaLoader, Split, DEFAULT_GAIA_REPO, DEFAULT_HF_ENDPOINT};
use crate::runner::{run_isolated, Driver, TaskLog};
use crate::scorer::{score, scored_path};
use crate::society::CommandSocietyConfig;

/// Default log file of the `ask` command.
const DEFAULT_ASK_LOG: &str = "logs/ask.log";

/// GAIA benchmark harness for LLM agent societies.
#[derive(Parser)]
#[command(name = "gaia-harness")]
#[command(about = "Run and score LLM agent societies on the GAIA benchmark")]
#[command(version)]
#[command(
    long_about = "gaia-harness feeds GAIA tasks to an agent society one at a time, records answers to a resumable JSONL file and scores them against ground truth.\n\nExample usage:\n  gaia-harness fetch --split validation\n  gaia-harness run --levels 1 --max-tasks 5\n  gaia-harness score"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

impl Cli {
    /// Effective log filter: `RUST_LOG` when set, else `--log-level`.
    pub fn log_filter(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.log_level.clone())
    }
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the society on every selected task, resuming from the result file.
    Run(RunArgs),

    /// Score a result file against the validation ground truth.
    Score(ScoreArgs),

    /// Download a split of the GAIA dataset from the HuggingFace hub.
    Fetch(FetchArgs),

    /// Ask the society a single free-form question.
    Ask(AskArgs),
}

/// Options shared by every command that reads the dataset or results.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct HarnessArgs {
    /// YAML configuration file.
    #[arg(short = 'c', long, env = "GAIA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Dataset split (validation or test).
    #[arg(short = 's', long)]
    pub split: Option<String>,

    /// Comma-separated levels (e.g. "1,2").
    #[arg(long)]
    pub levels: Option<String>,

    /// Root of the local dataset snapshot.
    #[arg(short = 'd', long)]
    pub data_dir: Option<PathBuf>,

    /// JSONL result file (default: gaia_<split>.jsonl).
    #[arg(short = 'r', long)]
    pub result_file: Option<PathBuf>,

    /// Directory for answer files and per-task logs.
    #[arg(long)]
    pub logs_dir: Option<PathBuf>,

    /// Disable partial-result recovery and answer-file fallback.
    #[arg(long)]
    pub no_relax: bool,
}

impl HarnessArgs {
    /// Resolve the layered configuration, with these flags on top.
    pub fn resolve(&self) -> anyhow::Result<HarnessConfig> {
        let mut config = HarnessConfig::load(self.config.as_deref())
            .context("Failed to load configuration")?;

        if let Some(split) = &self.split {
            config.split = split.parse()?;
        }
        if let Some(levels) = &self.levels {
            config.levels = parse_levels(levels).map_err(|e| anyhow::anyhow!(e))?;
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(path) = &self.result_file {
            config.result_file = Some(path.clone());
        }
        if let Some(dir) = &self.logs_dir {
            config.logs_dir = dir.clone();
        }
        if self.no_relax {
            config.relax_mode = false;
        }
        Ok(config)
    }
}

/// Options selecting and tuning the agent society.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct SocietyArgs {
    /// External agent program; switches to the command society.
    #[arg(short = 'a', long)]
    pub agent: Option<String>,

    /// Argument passed to the agent program (repeatable).
    #[arg(long = "agent-arg", allow_hyphen_values = true)]
    pub agent_args: Vec<String>,

    /// Model of the role-playing society.
    #[arg(short = 'm', long)]
    pub model: Option<String>,
}

impl SocietyArgs {
    fn apply(&self, config: &mut HarnessConfig) {
        if let Some(program) = &self.agent {
            let mut command = match &config.society {
                SocietyConfig::Command(existing) => existing.clone(),
                SocietyConfig::RolePlaying(_) => CommandSocietyConfig::new(program.clone()),
            };
            command.program = program.clone();
            config.society = SocietyConfig::Command(command);
        }
        if !self.agent_args.is_empty() {
            if let SocietyConfig::Command(command) = &mut config.society {
                command.args = self.agent_args.clone();
            }
        }
        if let Some(model) = &self.model {
            if let SocietyConfig::RolePlaying(rp) = &mut config.society {
                rp.model = model.clone();
            }
        }
    }
}

/// Arguments for `gaia-harness run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub harness: HarnessArgs,

    #[command(flatten)]
    pub society: SocietyArgs,

    /// Attempts per task.
    #[arg(long)]
    pub retry_limit: Option<u32>,

    /// Cap on tasks per level.
    #[arg(short = 'n', long)]
    pub max_tasks: Option<usize>,

    /// Only run these task ids (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub task_ids: Vec<String>,
}

/// Arguments for `gaia-harness score`.
#[derive(Parser, Debug)]
pub struct ScoreArgs {
    #[command(flatten)]
    pub harness: HarnessArgs,

    /// Where to write the report (default: <result>_scored.json).
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Print the full report as JSON instead of a summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `gaia-harness fetch`.
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Dataset split to download.
    #[arg(short = 's', long, default_value = "validation")]
    pub split: String,

    /// Destination root of the dataset snapshot.
    #[arg(short = 'd', long, default_value = "data/gaia")]
    pub data_dir: PathBuf,

    /// Dataset repository on the hub.
    #[arg(long, default_value = DEFAULT_GAIA_REPO)]
    pub repo: String,

    /// Hub endpoint, for mirrors.
    #[arg(long, env = "HF_ENDPOINT", default_value = DEFAULT_HF_ENDPOINT)]
    pub endpoint: String,

    /// HuggingFace token; the GAIA dataset is gated.
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// Arguments for `gaia-harness ask`.
#[derive(Parser, Debug)]
pub struct AskArgs {
    /// The question to ask.
    pub question: String,

    /// YAML configuration file.
    #[arg(short = 'c', long, env = "GAIA_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub society: SocietyArgs,

    /// Log file for the society run.
    #[arg(long, default_value = DEFAULT_ASK_LOG)]
    pub log_file: PathBuf,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let log_filter = cli.log_filter();
    match cli.command {
        Commands::Run(args) => run_run_command(args, log_filter).await,
        Commands::Score(args) => run_score_command(args),
        Commands::Fetch(args) => run_fetch_command(args).await,
        Commands::Ask(args) => run_ask_command(args, log_filter).await,
    }
}

fn build_run_config(args: &RunArgs) -> anyhow::Result<HarnessConfig> {
    let mut config = args.harness.resolve()?;
    args.society.apply(&mut config);
    if let Some(limit) = args.retry_limit {
        config.retry_limit = limit;
    }
    if let Some(max) = args.max_tasks {
        config.max_tasks = Some(max);
    }
    if !args.task_ids.is_empty() {
        config.task_ids = args.task_ids.clone();
    }
    config.validate()?;
    Ok(config)
}

async fn run_run_command(args: RunArgs, log_filter: String) -> anyhow::Result<()> {
    let config = build_run_config(&args)?.with_log_level(log_filter);
    let factory = config.society.build_factory();
    let loader = GaiaLoader::new(&config.data_dir);
    let result_path = config.result_path();

    let summary = Driver::new(config, Box::new(loader), factory).run().await?;

    println!();
    println!("Results: {}", result_path.display());
    println!(
        "Processed {} (answered {}, failed {}), skipped {}",
        summary.processed, summary.answered, summary.failed, summary.skipped
    );
    Ok(())
}

fn run_score_command(args: ScoreArgs) -> anyhow::Result<()> {
    let config = args.harness.resolve()?;
    config.validate()?;
    let loader = GaiaLoader::new(&config.data_dir);

    let report = score(&config, &loader)?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| scored_path(&config.result_path()));
    report.write(&output)?;
    info!(path = %output.display(), "Wrote score report");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for (level, level_report) in &report.levels {
        let stat = level_report.stat;
        println!(
            "{}: {}/{} correct, score {:.4}",
            level, stat.correct, stat.total, stat.score
        );
    }
    let all = report.all_stat;
    println!(
        "all: {}/{} correct, score {:.4}",
        all.correct, all.total, all.score
    );
    println!("Report: {}", output.display());
    Ok(())
}

async fn run_fetch_command(args: FetchArgs) -> anyhow::Result<()> {
    let split: Split = args.split.parse()?;
    let summary = download_split(
        &args.endpoint,
        &args.repo,
        split,
        &args.data_dir,
        args.token.as_deref(),
    )
        .await
        .with_context(|| format!("Failed to download {} split of {}", split, args.repo))?;

    println!(
        "Fetched {} tasks into {} ({} attachments downloaded, {} already present)",
        summary.tasks,
        args.data_dir.display(),
        summary.attachments_downloaded,
        summary.attachments_skipped
    );
    Ok(())
}

async fn run_ask_command(args: AskArgs, log_filter: String) -> anyhow::Result<()> {
    let mut config = HarnessConfig::load(args.config.as_deref())?;
    args.society.apply(&mut config);
    config.validate()?;

    let factory = config.society.build_factory();
    let log = TaskLog::new(args.log_file.clone(), &log_filter);
    let outcome = run_isolated(factory, args.question.clone(), Some(log)).await?;

    println!("Answer: {}", outcome.answer);
    println!("Tokens: {}", outcome.token_count);
    println!("Log: {}", args.log_file.display());
    Ok(())
}
