//! HuggingFace hub download of a GAIA split.
//!
//! GAIA is a gated dataset, so a token with accepted terms is normally
//! required (`HF_TOKEN`).

use std::path::Path;

use reqwest::Client;
use tracing::{debug, info};

use super::loader::{read_metadata_jsonl, split_dir, GAIA_RELEASE};
use super::types::Split;
use crate::error::DatasetError;

/// Default hub repository of the benchmark.
pub const DEFAULT_GAIA_REPO: &str = "gaia-benchmark/GAIA";

/// Default hub endpoint. Mirrors are selected with `HF_ENDPOINT`.
pub const DEFAULT_HF_ENDPOINT: &str = "https://huggingface.co";

/// Summary of a split download.
#[derive(Debug, Clone, Default)]
pub struct DownloadSummary {
    pub tasks: usize,
    pub attachments_downloaded: usize,
    pub attachments_skipped: usize,
}

/// Resolve URL of a file inside a dataset repository of the hub at `endpoint`.
pub fn resolve_url(endpoint: &str, repo_id: &str, file: &str) -> String {
    format!(
        "{}/datasets/{}/resolve/main/{}",
        endpoint.trim_end_matches('/'),
        repo_id,
        urlencoding::encode(file).replace("%2F", "/")
    )
}

/// Download `metadata.jsonl` and all referenced attachments of a split
/// into `<root>/2023/<split>/`. Files already on disk are kept.
pub async fn download_split(
    endpoint: &str,
    repo_id: &str,
    split: Split,
    root: &Path,
    token: Option<&str>,
) -> Result<DownloadSummary, DatasetError> {
    let client = Client::new();
    let dir = split_dir(root, split);
    tokio::fs::create_dir_all(&dir).await?;

    let remote_dir = format!("{}/{}", GAIA_RELEASE, split.as_str());
    let metadata_path = dir.join("metadata.jsonl");
    let metadata_url = resolve_url(endpoint, repo_id, &format!("{}/metadata.jsonl", remote_dir));

    info!(repo = repo_id, split = %split, "Downloading GAIA metadata from HuggingFace");
    let bytes = fetch(&client, &metadata_url, token).await?;
    tokio::fs::write(&metadata_path, &bytes).await?;

    let tasks = read_metadata_jsonl(&metadata_path)?;
    let mut summary = DownloadSummary {
        tasks: tasks.len(),
        ..Default::default()
    };

    for task in tasks.iter().filter(|t| t.has_attachment()) {
        let local = dir.join(&task.file_name);
        if local.exists() {
            summary.attachments_skipped += 1;
            continue;
        }
        let url = resolve_url(endpoint, repo_id, &format!("{}/{}", remote_dir, task.file_name));
        debug!(task_id = %task.task_id, file = %task.file_name, "Downloading attachment");
        let bytes = fetch(&client, &url, token).await?;
        tokio::fs::write(&local, &bytes).await?;
        summary.attachments_downloaded += 1;
    }

    info!(
        tasks = summary.tasks,
        downloaded = summary.attachments_downloaded,
        skipped = summary.attachments_skipped,
        path = %dir.display(),
        "GAIA split downloaded"
    );
    Ok(summary)
}

async fn fetch(client: &Client, url: &str, token: Option<&str>) -> Result<Vec<u8>, DatasetError> {
    let mut request = client.get(url);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    let resp = request.send().await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(DatasetError::DownloadFailed {
            url: url.to_string(),
            status: status.as_u16(),
            message: resp.text().await.unwrap_or_default(),
        });
    }

    Ok(resp.bytes().await?.to_vec())
}
