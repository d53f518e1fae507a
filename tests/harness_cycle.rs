//! End-to-end cycle over a local dataset snapshot: run, resume, score.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use gaia_harness::config::HarnessConfig;
use gaia_harness::dataset::{split_dir, GaiaLoader, Level, Split};
use gaia_harness::error::SocietyError;
use gaia_harness::runner::{Driver, RunSummary};
use gaia_harness::scorer::{score, scored_path};
use gaia_harness::society::{Society, SocietyFactory, SocietyOutcome};
use gaia_harness::store::load_records;
use tempfile::TempDir;

const METADATA: &str = r#"{"task_id": "easy-1", "Question": "What is 2+2?", "Level": "1", "Final answer": "4", "file_name": ""}
{"task_id": "easy-2", "Question": "Name the red planet.", "Level": 1, "Final answer": "Mars", "file_name": "planet.txt"}
{"task_id": "easy-3", "Question": "Flaky question", "Level": "1", "Final answer": "blue, green", "file_name": ""}
{"task_id": "mid-1", "Question": "Crashing question", "Level": "2", "Final answer": "7", "file_name": ""}
"#;

fn write_dataset(root: &Path) {
    let dir = split_dir(root, Split::Validation);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("metadata.jsonl"), METADATA).unwrap();
    fs::write(dir.join("planet.txt"), "fourth planet").unwrap();
}

fn output_path(query: &str) -> Option<PathBuf> {
    query
        .split("answer to file ")
        .nth(1)?
        .split(" with the following template")
        .next()
        .map(PathBuf::from)
}

/// Answers by question:
/// - "2+2": 4
/// - "red planet": Mars, only if the attachment path was given
/// - "Flaky": fails the first attempt, then answers
/// - "Crashing": writes its answer, then errors
struct ScriptedFactory {
    constructed: AtomicUsize,
    flaky_calls: Arc<AtomicUsize>,
}

struct ScriptedSociety {
    query: String,
    flaky_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Society for ScriptedSociety {
    async fn run(&self) -> Result<SocietyOutcome, SocietyError> {
        let output = output_path(&self.query)
            .ok_or_else(|| SocietyError::ExecutionFailed("no answer file in query".to_string()))?;

        let answer = if self.query.contains("2+2") {
            "4"
        } else if self.query.contains("red planet") {
            if !self.query.contains("planet.txt is the absolute file path") {
                return Err(SocietyError::ExecutionFailed("attachment missing".to_string()));
            }
            "Mars"
        } else if self.query.contains("Flaky") {
            if self.flaky_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(SocietyError::ExecutionFailed("flaky".to_string()));
            }
            "Blue; Green"
        } else {
            fs::write(&output, "FINAL ANSWER: 7")?;
            return Err(SocietyError::Panicked("browser crashed".to_string()));
        };

        fs::write(&output, format!("Thoughts...\nFINAL ANSWER: {}", answer))?;
        Ok(SocietyOutcome {
            answer: answer.to_string(),
            chat_history: Vec::new(),
            token_count: 100,
        })
    }
}

impl SocietyFactory for ScriptedFactory {
    fn construct(&self, query: &str) -> Result<Box<dyn Society>, SocietyError> {
        self.constructed.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSociety {
            query: query.to_string(),
            flaky_calls: Arc::clone(&self.flaky_calls),
        }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn config(tmp: &TempDir) -> HarnessConfig {
    HarnessConfig::default()
        .with_data_dir(tmp.path().join("data"))
        .with_logs_dir(tmp.path().join("logs"))
        .with_result_file(tmp.path().join("gaia_validation.jsonl"))
}

#[tokio::test]
async fn test_run_resume_and_score() {
    let tmp = TempDir::new().unwrap();
    write_dataset(&tmp.path().join("data"));
    let config = config(&tmp);

    let factory = Arc::new(ScriptedFactory {
        constructed: AtomicUsize::new(0),
        flaky_calls: Arc::new(AtomicUsize::new(0)),
    });
    let driver = Driver::new(
        config.clone(),
        Box::new(GaiaLoader::new(&config.data_dir)),
        factory.clone(),
    );
    let summary = driver.run().await.unwrap();
    assert_eq!(
        summary,
        RunSummary {
            processed: 4,
            skipped: 0,
            answered: 4,
            failed: 0
        }
    );
    // One extra attempt for the flaky task.
    assert_eq!(factory.constructed.load(Ordering::SeqCst), 5);

    let records = load_records(&config.result_path()).unwrap();
    assert_eq!(records["easy-3"].attempts, Some(2));
    assert_eq!(records["mid-1"].model_answer, "7");
    assert_eq!(records["mid-1"].token_count, None);
    assert_eq!(records["mid-1"].level, Some(Level::Level2));

    // Resuming does not touch recorded tasks.
    let summary = Driver::new(
        config.clone(),
        Box::new(GaiaLoader::new(&config.data_dir)),
        factory.clone(),
    )
    .run()
    .await
    .unwrap();
    assert_eq!(summary.skipped, 4);
    assert_eq!(factory.constructed.load(Ordering::SeqCst), 5);
    let lines = fs::read_to_string(config.result_path()).unwrap();
    assert_eq!(lines.lines().count(), 4);

    let report = score(&config, &GaiaLoader::new(&config.data_dir)).unwrap();
    assert_eq!(report.levels["level1"].stat.correct, 3);
    assert_eq!(report.levels["level2"].stat.correct, 1);
    assert_eq!(report.levels["level3"].stat.total, 0);
    assert_eq!(report.all_stat.score, 1.0);

    let path = scored_path(&config.result_path());
    report.write(&path).unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn test_strict_mode_records_empty_answer() {
    let tmp = TempDir::new().unwrap();
    write_dataset(&tmp.path().join("data"));
    let config = config(&tmp)
        .with_levels(vec![Level::Level2])
        .with_relax_mode(false)
        .with_retry_limit(2);

    let factory = Arc::new(ScriptedFactory {
        constructed: AtomicUsize::new(0),
        flaky_calls: Arc::new(AtomicUsize::new(0)),
    });
    let summary = Driver::new(
        config.clone(),
        Box::new(GaiaLoader::new(&config.data_dir)),
        factory.clone(),
    )
    .run()
    .await
    .unwrap();

    // Without relax mode an answer written before a crash is not accepted.
    assert_eq!(summary.processed, 1);
    assert_eq!(factory.constructed.load(Ordering::SeqCst), 2);
    let records = load_records(&config.result_path()).unwrap();
    assert_eq!(records["mid-1"].model_answer, "");
    assert_eq!(records["mid-1"].attempts, Some(2));
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_society_end_to_end() {
    use gaia_harness::config::SocietyConfig;
    use gaia_harness::society::CommandSocietyConfig;

    let tmp = TempDir::new().unwrap();
    write_dataset(&tmp.path().join("data"));

    let script = r#"q=$(cat)
f=$(printf '%s\n' "$q" | sed -n 's/.*answer to file \(.*\) with the following template.*/\1/p')
printf 'FINAL ANSWER: 4\n' > "$f"
echo '{"answer": "4", "token_count": 12}'"#;
    let command = CommandSocietyConfig::new("sh").with_args(vec!["-c".to_string(), script.to_string()]);
    let config = config(&tmp)
        .with_task_ids(vec!["easy-1".to_string()])
        .with_society(SocietyConfig::Command(command));
    config.validate().unwrap();

    let summary = Driver::new(
        config.clone(),
        Box::new(GaiaLoader::new(&config.data_dir)),
        config.society.build_factory(),
    )
    .run()
    .await
    .unwrap();
    assert_eq!(summary.answered, 1);

    let records = load_records(&config.result_path()).unwrap();
    assert_eq!(records["easy-1"].model_answer, "4");
    assert_eq!(records["easy-1"].token_count, Some(12));
}
