//! Conditional download of the bulk dataset files.
//!
//! An existing local copy is revalidated with `If-Modified-Since`. A fresh
//! body is streamed to `<name>.part` and renamed into place only once it is
//! complete, so an interrupted download never replaces a good file. A
//! failed attempt removes its part file.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::header::{IF_MODIFIED_SINCE, LAST_MODIFIED};
use reqwest::StatusCode;
use tokio::io::AsyncWriteExt;

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded { bytes: u64 },
    NotModified,
}

pub struct DatasetDownloader {
    http: reqwest::Client,
}

impl DatasetDownloader {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http })
    }

    /// Fetch `url` into `dest` unless the server reports it unchanged.
    pub async fn fetch(&self, url: &str, dest: &Path) -> Result<DownloadOutcome> {
        let mut request = self.http.get(url);
        if let Some(since) = local_mtime(dest) {
            request = request.header(IF_MODIFIED_SINCE, since.format(HTTP_DATE).to_string());
        }

        let mut resp = request
            .send()
            .await
            .with_context(|| format!("download request failed: {url}"))?;

        if resp.status() == StatusCode::NOT_MODIFIED {
            tracing::info!(url, "Dataset file not modified, keeping local copy");
            return Ok(DownloadOutcome::NotModified);
        }
        if resp.status() != StatusCode::OK {
            bail!("download of {url} returned status {}", resp.status());
        }

        let last_modified = resp
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|dt| SystemTime::from(dt.with_timezone(&Utc)));

        let part = part_path(dest);
        let bytes = match write_into_place(&mut resp, &part, dest, last_modified).await {
            Ok(bytes) => bytes,
            Err(err) => {
                if let Err(cleanup) = tokio::fs::remove_file(&part).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(part = %part.display(), error = %cleanup, "Failed to remove partial download");
                    }
                }
                return Err(err.context(format!("download of {url} failed")));
            }
        };

        tracing::info!(url, bytes, "Downloaded dataset file");
        Ok(DownloadOutcome::Downloaded { bytes })
    }
}

/// Stream the body to `part`, then rename it over `dest`.
async fn write_into_place(
    resp: &mut reqwest::Response,
    part: &Path,
    dest: &Path,
    last_modified: Option<SystemTime>,
) -> Result<u64> {
    let mut file = tokio::fs::File::create(part)
        .await
        .with_context(|| format!("failed to create {}", part.display()))?;

    let mut bytes = 0u64;
    while let Some(chunk) = resp.chunk().await.context("body interrupted")? {
        file.write_all(&chunk)
            .await
            .with_context(|| format!("failed to write {}", part.display()))?;
        bytes += chunk.len() as u64;
    }
    file.flush().await?;
    let file = file.into_std().await;
    if let Some(modified) = last_modified {
        file.set_modified(modified)
            .with_context(|| format!("failed to set mtime on {}", part.display()))?;
    }
    drop(file);

    tokio::fs::rename(part, dest)
        .await
        .with_context(|| format!("failed to move {} into place", part.display()))?;
    Ok(bytes)
}

fn local_mtime(path: &Path) -> Option<DateTime<Utc>> {
    let meta = std::fs::metadata(path).ok()?;
    meta.modified().ok().map(DateTime::<Utc>::from)
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// Last path segment of a URL, used as the local file name.
pub fn file_name_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    path.rsplit('/').next().filter(|name| !name.is_empty())
}
