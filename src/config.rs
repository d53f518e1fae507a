//! Harness configuration.
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then
//! `GAIA_*` environment variables. The CLI applies its flags on top and calls
//! [`HarnessConfig::validate`] before anything runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dataset::{Level, Split};
use crate::error::ConfigError;
use crate::society::{
    CommandSocietyConfig, CommandSocietyFactory, RolePlayingConfig, RolePlayingFactory,
    SharedFactory,
};

/// Which agent society answers the queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SocietyConfig {
    /// External agent program.
    Command(CommandSocietyConfig),
    /// Built-in user/assistant role-play over an OpenAI-compatible endpoint.
    RolePlaying(RolePlayingConfig),
}

impl Default for SocietyConfig {
    fn default() -> Self {
        SocietyConfig::RolePlaying(RolePlayingConfig::new("gpt-4o"))
    }
}

impl SocietyConfig {
    /// Build the factory the runner constructs societies with.
    pub fn build_factory(&self) -> SharedFactory {
        match self {
            SocietyConfig::Command(config) => Arc::new(CommandSocietyFactory::new(config.clone())),
            SocietyConfig::RolePlaying(config) => Arc::new(RolePlayingFactory::new(config.clone())),
        }
    }
}

/// Configuration of a benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub split: Split,
    pub levels: Vec<Level>,
    /// Root of the local dataset snapshot.
    pub data_dir: PathBuf,
    /// Result file; `gaia_<split>.jsonl` when unset.
    pub result_file: Option<PathBuf>,
    pub logs_dir: PathBuf,
    pub retry_limit: u32,
    /// Accept answers written before an agent error, and fall back to answer
    /// files when scoring.
    pub relax_mode: bool,
    /// Cap on tasks per level.
    pub max_tasks: Option<usize>,
    /// Only run these task ids (all when empty).
    pub task_ids: Vec<String>,
    /// Level or `EnvFilter` directives of the per-task log files.
    pub log_level: String,
    pub society: SocietyConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            split: Split::Validation,
            levels: Level::ALL.to_vec(),
            data_dir: PathBuf::from("data/gaia"),
            result_file: None,
            logs_dir: PathBuf::from("logs"),
            retry_limit: 3,
            relax_mode: true,
            max_tasks: None,
            task_ids: Vec::new(),
            log_level: "info".to_string(),
            society: SocietyConfig::default(),
        }
    }
}

impl HarnessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load defaults, overlay the YAML file when given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Parse a YAML file. Missing keys keep their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Apply `GAIA_*` variables from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `GAIA_SPLIT`: `validation` or `test`
    /// - `GAIA_LEVELS`: comma-separated levels, e.g. `1,2`
    /// - `GAIA_DATA_DIR`, `GAIA_RESULT_FILE`, `GAIA_LOGS_DIR`: paths
    /// - `GAIA_RETRY_LIMIT`: attempts per task
    /// - `GAIA_RELAX_MODE`: boolean
    /// - `GAIA_MAX_TASKS`: cap on tasks per level
    /// - `GAIA_TASK_IDS`: comma-separated task ids
    /// - `GAIA_MODEL`: model of the role-playing society
    /// - `GAIA_AGENT_PROGRAM`: switch to an external agent program
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply `GAIA_*` variables read through `lookup`.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("GAIA_SPLIT") {
            self.split = val.parse().map_err(|e| invalid("GAIA_SPLIT", e))?;
        }

        if let Some(val) = lookup("GAIA_LEVELS") {
            self.levels = parse_levels(&val).map_err(|e| invalid("GAIA_LEVELS", e))?;
        }

        if let Some(val) = lookup("GAIA_DATA_DIR") {
            self.data_dir = PathBuf::from(val);
        }

        if let Some(val) = lookup("GAIA_RESULT_FILE") {
            self.result_file = Some(PathBuf::from(val));
        }

        if let Some(val) = lookup("GAIA_LOGS_DIR") {
            self.logs_dir = PathBuf::from(val);
        }

        if let Some(val) = lookup("GAIA_RETRY_LIMIT") {
            self.retry_limit = parse_env_value(&val, "GAIA_RETRY_LIMIT")?;
        }

        if let Some(val) = lookup("GAIA_RELAX_MODE") {
            self.relax_mode = parse_env_bool(&val, "GAIA_RELAX_MODE")?;
        }

        if let Some(val) = lookup("GAIA_MAX_TASKS") {
            self.max_tasks = Some(parse_env_value(&val, "GAIA_MAX_TASKS")?);
        }

        if let Some(val) = lookup("GAIA_TASK_IDS") {
            self.task_ids = split_list(&val);
        }

        if let Some(program) = lookup("GAIA_AGENT_PROGRAM") {
            match &mut self.society {
                SocietyConfig::Command(config) => config.program = program,
                society => *society = SocietyConfig::Command(CommandSocietyConfig::new(program)),
            }
        }

        if let Some(model) = lookup("GAIA_MODEL") {
            match &mut self.society {
                SocietyConfig::RolePlaying(config) => config.model = model,
                SocietyConfig::Command(config) => warn!(
                    model = %model,
                    program = %config.program,
                    "GAIA_MODEL ignored: the external agent chooses its own model"
                ),
            }
        }

        Ok(())
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_limit == 0 {
            return Err(ConfigError::ValidationFailed(
                "retry_limit must be greater than 0".to_string(),
            ));
        }

        if self.levels.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "at least one level must be selected".to_string(),
            ));
        }

        match &self.society {
            SocietyConfig::Command(config) => {
                if config.program.trim().is_empty() {
                    return Err(ConfigError::ValidationFailed(
                        "society program cannot be empty".to_string(),
                    ));
                }
                if config.timeout_secs == 0 {
                    return Err(ConfigError::ValidationFailed(
                        "society timeout must be greater than 0".to_string(),
                    ));
                }
            }
            SocietyConfig::RolePlaying(config) => {
                if config.model.trim().is_empty() {
                    return Err(ConfigError::ValidationFailed(
                        "model cannot be empty".to_string(),
                    ));
                }
                if !(0.0..=2.0).contains(&config.temperature) {
                    return Err(ConfigError::ValidationFailed(
                        "temperature must be between 0.0 and 2.0".to_string(),
                    ));
                }
                if config.round_limit == 0 {
                    return Err(ConfigError::ValidationFailed(
                        "round_limit must be greater than 0".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Path of the JSONL result file.
    pub fn result_path(&self) -> PathBuf {
        self.result_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("gaia_{}.jsonl", self.split)))
    }

    /// Directory holding answer files and logs of one level.
    pub fn level_log_dir(&self, level: Level) -> PathBuf {
        self.logs_dir.join(format!("{}-{}", self.split, level))
    }

    /// Builder method to set the split.
    pub fn with_split(mut self, split: Split) -> Self {
        self.split = split;
        self
    }

    /// Builder method to set the levels.
    pub fn with_levels(mut self, levels: Vec<Level>) -> Self {
        self.levels = levels;
        self
    }

    /// Builder method to set the dataset root.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Builder method to set the result file.
    pub fn with_result_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.result_file = Some(path.into());
        self
    }

    /// Builder method to set the logs directory.
    pub fn with_logs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.logs_dir = dir.into();
        self
    }

    /// Builder method to set the retry limit.
    pub fn with_retry_limit(mut self, limit: u32) -> Self {
        self.retry_limit = limit;
        self
    }

    /// Builder method to enable or disable relax mode.
    pub fn with_relax_mode(mut self, enabled: bool) -> Self {
        self.relax_mode = enabled;
        self
    }

    /// Builder method to cap the tasks per level.
    pub fn with_max_tasks(mut self, max: usize) -> Self {
        self.max_tasks = Some(max);
        self
    }

    /// Builder method to restrict the run to specific task ids.
    pub fn with_task_ids(mut self, ids: Vec<String>) -> Self {
        self.task_ids = ids;
        self
    }

    /// Builder method to set the per-task log level.
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Builder method to set the society.
    pub fn with_society(mut self, society: SocietyConfig) -> Self {
        self.society = society;
        self
    }
}

/// Parse a comma-separated level list such as `1,2` or `level1, level3`.
pub fn parse_levels(value: &str) -> Result<Vec<Level>, String> {
    split_list(value)
        .iter()
        .map(|s| s.parse::<Level>().map_err(|e| e.to_string()))
        .collect()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn invalid(key: &str, message: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

/// Parse an environment variable value into the target type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(key, format!("could not parse '{}'", value)))
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, format!("expected boolean value, got '{}'", value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = HarnessConfig::default();
        assert_eq!(config.split, Split::Validation);
        assert_eq!(config.levels, Level::ALL.to_vec());
        assert_eq!(config.retry_limit, 3);
        assert!(config.relax_mode);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.result_path(), PathBuf::from("gaia_validation.jsonl"));
        assert_eq!(
            config.level_log_dir(Level::Level2),
            PathBuf::from("logs/validation-level2")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = HarnessConfig::default();
        config
            .apply_env_from(env(&[
                ("GAIA_SPLIT", "test"),
                ("GAIA_LEVELS", "1, level3"),
                ("GAIA_RETRY_LIMIT", "5"),
                ("GAIA_RELAX_MODE", "off"),
                ("GAIA_MAX_TASKS", "2"),
                ("GAIA_TASK_IDS", "a,b,"),
                ("GAIA_MODEL", "doubao-pro"),
            ]))
            .unwrap();

        assert_eq!(config.split, Split::Test);
        assert_eq!(config.levels, vec![Level::Level1, Level::Level3]);
        assert_eq!(config.retry_limit, 5);
        assert!(!config.relax_mode);
        assert_eq!(config.max_tasks, Some(2));
        assert_eq!(config.task_ids, vec!["a", "b"]);
        assert_eq!(config.result_path(), PathBuf::from("gaia_test.jsonl"));
        match &config.society {
            SocietyConfig::RolePlaying(rp) => assert_eq!(rp.model, "doubao-pro"),
            other => panic!("unexpected society {:?}", other),
        }
    }

    #[test]
    fn test_env_agent_program_switches_society() {
        let mut config = HarnessConfig::default();
        config
            .apply_env_from(env(&[("GAIA_AGENT_PROGRAM", "python3")]))
            .unwrap();
        assert!(matches!(&config.society, SocietyConfig::Command(c) if c.program == "python3"));
    }

    #[test]
    fn test_env_model_ignored_for_command_society() {
        let mut config = HarnessConfig::default()
            .with_society(SocietyConfig::Command(CommandSocietyConfig::new("python3")));
        let before = config.society.clone();
        config
            .apply_env_from(env(&[("GAIA_MODEL", "doubao-pro")]))
            .unwrap();
        assert_eq!(config.society, before);
    }

    #[test]
    fn test_invalid_env_values() {
        let mut config = HarnessConfig::default();
        let err = config
            .apply_env_from(env(&[("GAIA_RETRY_LIMIT", "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "GAIA_RETRY_LIMIT"));

        let err = config
            .apply_env_from(env(&[("GAIA_LEVELS", "4")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "GAIA_LEVELS"));
    }

    #[test]
    fn test_validation() {
        assert!(HarnessConfig::default().with_retry_limit(0).validate().is_err());
        assert!(HarnessConfig::default().with_levels(vec![]).validate().is_err());

        let command = SocietyConfig::Command(CommandSocietyConfig::new(" "));
        assert!(HarnessConfig::default().with_society(command).validate().is_err());

        let mut rp = RolePlayingConfig::new("m");
        rp.temperature = 2.5;
        let config = HarnessConfig::default().with_society(SocietyConfig::RolePlaying(rp));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_yaml_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("harness.yaml");
        std::fs::write(
            &path,
            r#"
split: validation
levels: [1, "2"]
retry_limit: 2
result_file: out/results.jsonl
society:
  kind: command
  program: python
  args: ["run_agent.py", "--model", "gpt-4o"]
  timeout_secs: 900
"#,
        )
        .unwrap();

        let config = HarnessConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.levels, vec![Level::Level1, Level::Level2]);
        assert_eq!(config.retry_limit, 2);
        assert!(config.relax_mode);
        assert_eq!(config.result_path(), PathBuf::from("out/results.jsonl"));
        match &config.society {
            SocietyConfig::Command(c) => {
                assert_eq!(c.program, "python");
                assert_eq!(c.args.len(), 3);
                assert_eq!(c.timeout_secs, 900);
                assert!(c.use_stdin);
            }
            other => panic!("unexpected society {:?}", other),
        }
    }

    #[test]
    fn test_yaml_role_playing_with_azure() {
        let config: HarnessConfig = serde_yaml::from_str(
            r#"
society:
  kind: role_playing
  model: gpt-4o
  env_prefix: AZURE_OPENAI
  flavor:
    kind: azure
    api_version: "2024-06-01"
"#,
        )
        .unwrap();
        match &config.society {
            SocietyConfig::RolePlaying(rp) => {
                assert_eq!(rp.env_prefix, "AZURE_OPENAI");
                assert_eq!(rp.temperature, 0.4);
            }
            other => panic!("unexpected society {:?}", other),
        }
    }
}
