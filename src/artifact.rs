//! Download-on-first-use for the model artifact.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};
use futures_util::StreamExt;
use regex::Regex;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::common::{BinError, Result};

const DRIVE_DOWNLOAD: &str = "https://drive.google.com/uc?export=download&confirm=t&id=";
const RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Makes sure the artifact exists at `path`, fetching it from `url` if it does not.
///
/// An existing file is returned as is, whatever its contents. Downloads are written
/// to `<path>.part` and renamed once complete.
pub async fn ensure_artifact(path: &Path, url: Option<&str>, attempts: u32) -> Result<PathBuf> {
    if fs::try_exists(path).await.unwrap_or(false) {
        log::info!("Using existing model artifact {}", path.display());
        return Ok(path.to_path_buf());
    }

    let url = url.ok_or_else(|| {
        BinError::ArtifactUnavailable(format!(
            "{} does not exist and no MODEL_URL is configured",
            path.display()
        ))
    })?;
    let url = resolve_download_url(url);

    let attempts = attempts.max(1);
    let mut last_err = anyhow!("no download attempted");
    for attempt in 1..=attempts {
        log::info!("Downloading model artifact ({attempt}/{attempts}) from {url}");
        match download(&url, path).await {
            Ok(bytes) => {
                log::info!("Saved {} ({})", path.display(), crate::utils::human_bytes(bytes as f64));
                return Ok(path.to_path_buf());
            }
            Err(err) => {
                log::warn!("Download attempt {attempt}/{attempts} failed: {err:#}");
                last_err = err;
                if attempt < attempts {
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
            }
        }
    }

    Err(BinError::ArtifactUnavailable(format!(
        "download failed after {attempts} attempt(s): {last_err:#}"
    )))
}

/// Rewrites Google Drive share links to their direct-download form.
///
/// Any other URL is returned unchanged.
pub fn resolve_download_url(url: &str) -> String {
    match drive_file_id(url) {
        Some(id) => format!("{DRIVE_DOWNLOAD}{id}"),
        None => url.to_string(),
    }
}

fn drive_file_id(url: &str) -> Option<String> {
    if !url.contains("drive.google.com") {
        return None;
    }
    let re = Regex::new(r"(?:/file/d/|[?&]id=)([A-Za-z0-9_-]+)").ok()?;
    let (_, [id]) = re.captures(url)?.extract();
    Some(id.to_string())
}

async fn download(url: &str, path: &Path) -> anyhow::Result<u64> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let response = reqwest::get(url).await?;
    if !response.status().is_success() {
        return Err(anyhow!("HTTP {}", response.status()));
    }

    let part = part_path(path);
    let written = match stream_to_file(response, &part).await {
        Ok(n) => n,
        Err(err) => {
            let _ = fs::remove_file(&part).await;
            return Err(err);
        }
    };
    fs::rename(&part, path)
        .await
        .with_context(|| format!("moving {} into place", part.display()))?;
    Ok(written)
}

async fn stream_to_file(response: reqwest::Response, part: &Path) -> anyhow::Result<u64> {
    let mut file = fs::File::create(part)
        .await
        .with_context(|| format!("creating {}", part.display()))?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    file.sync_all().await?;

    if written == 0 {
        return Err(anyhow!("server returned an empty body"));
    }
    Ok(written)
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
