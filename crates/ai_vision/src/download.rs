//! Artifact downloads
//!
//! Graph, weight, label and mean files are fetched once into the model's
//! work directory and reused on later runs. HTTP bodies are streamed into a
//! `.part` file that is renamed into place, so an interrupted download never
//! looks cached.

use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::config::VisionConfig;
use crate::error::VisionError;

/// Downloads model artifacts over HTTP(S) or from local paths
#[derive(Debug, Clone)]
pub struct ArtifactDownloader {
    client: Client,
}

impl ArtifactDownloader {
    /// Create a downloader from the plugin configuration
    pub fn new(config: &VisionConfig) -> Result<Self, VisionError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.download_timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| VisionError::Configuration(e.to_string()))?;
        Ok(Self { client })
    }

    /// Fetch `url` into `target`, reusing a non-empty existing file
    #[instrument(skip(self, target), fields(target = %target.display()))]
    pub async fn download_file(&self, url: &str, target: &Path) -> Result<PathBuf, VisionError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(VisionError::download_failed(
                url,
                format!("no URL given for {}", target.display()),
            ));
        }

        if is_cached(target).await {
            debug!("Artifact already downloaded");
            return Ok(target.to_path_buf());
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let partial = partial_path(target);
        let result = match local_source(url) {
            Some(source) => tokio::fs::copy(&source, &partial)
                .await
                .map_err(|e| VisionError::download_failed(url, e.to_string())),
            None => self.fetch(url, &partial).await,
        };

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&partial).await;
            warn!(error = %e, "Artifact download failed");
            return Err(e);
        }

        if let Err(e) = tokio::fs::rename(&partial, target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            warn!(error = %e, "Failed to move artifact into place");
            return Err(e.into());
        }
        info!(bytes = result.unwrap_or_default(), "Downloaded artifact");
        Ok(target.to_path_buf())
    }

    /// Fetch an archive into `dir` and unpack it there
    ///
    /// A cached archive is not unpacked again while every path in `members`
    /// is already present.
    #[instrument(skip(self, dir, members), fields(dir = %dir.display()))]
    pub async fn download_archive(
        &self,
        url: &str,
        dir: &Path,
        members: &[PathBuf],
    ) -> Result<(), VisionError> {
        let archive = dir.join(archive_file_name(url));
        let was_cached = is_cached(&archive).await;
        self.download_file(url, &archive).await?;

        if was_cached && all_cached(members).await {
            debug!("Archive already unpacked");
            return Ok(());
        }

        let target = dir.to_path_buf();
        tokio::task::spawn_blocking(move || unpack_archive(&archive, &target)).await??;
        info!("Unpacked model archive");
        Ok(())
    }

    async fn fetch(&self, url: &str, partial: &Path) -> Result<u64, VisionError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(VisionError::download_failed(url, format!("HTTP {status}")));
        }

        let mut file = tokio::fs::File::create(partial).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0_u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

async fn is_cached(target: &Path) -> bool {
    tokio::fs::metadata(target)
        .await
        .is_ok_and(|meta| meta.is_file() && meta.len() > 0)
}

async fn all_cached(paths: &[PathBuf]) -> bool {
    for path in paths {
        if !is_cached(path).await {
            return false;
        }
    }
    true
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    target.with_file_name(name)
}

/// `file://` URLs and scheme-less strings name local files
fn local_source(url: &str) -> Option<PathBuf> {
    if let Some(path) = url.strip_prefix("file://") {
        return Some(PathBuf::from(path));
    }
    if url.contains("://") {
        None
    } else {
        Some(PathBuf::from(url))
    }
}

fn archive_file_name(url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .unwrap_or("model.tar.gz")
        .to_string()
}

fn unpack_archive(archive: &Path, dir: &Path) -> Result<(), VisionError> {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let file = std::fs::File::open(archive)?;

    let unpacked = if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        tar::Archive::new(GzDecoder::new(file)).unpack(dir)
    } else if name.ends_with(".tar") {
        tar::Archive::new(file).unpack(dir)
    } else {
        return Err(VisionError::Archive(format!(
            "unsupported archive format: {name}"
        )));
    };
    unpacked.map_err(|e| VisionError::Archive(format!("{}: {e}", archive.display())))
}
