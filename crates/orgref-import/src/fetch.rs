//! Archive acquisition
//!
//! Resolves the data and schema archives to local, readable files: either a
//! pre-existing local copy, or a download that replaces any previous copy
//! only once it has fully arrived (temporary file, remove, rename), so the
//! target file is never left partially written.

use orgref_common::{OrgRefError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Resolve `target` to an existing local file.
///
/// With a source URL the archive is downloaded; without one the file must
/// already be present.
pub async fn acquire(target: &Path, source_url: Option<&str>) -> Result<PathBuf> {
    match source_url {
        Some(url) => download(target, url).await,
        None => {
            if tokio::fs::try_exists(target).await? {
                debug!(target = %target.display(), "Using local archive");
                Ok(target.to_path_buf())
            } else {
                Err(OrgRefError::FileNotFound(target.display().to_string()))
            }
        },
    }
}

async fn download(target: &Path, url: &str) -> Result<PathBuf> {
    info!(url, target = %target.display(), "Downloading archive");

    let response = reqwest::Client::new()
        .get(url)
        .send()
        .await
        .map_err(|e| OrgRefError::Network(e.to_string()))?;
    if !response.status().is_success() {
        return Err(OrgRefError::Network(format!(
            "HTTP {} fetching {}",
            response.status(),
            url
        )));
    }
    let body = response
        .bytes()
        .await
        .map_err(|e| OrgRefError::Network(e.to_string()))?;

    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let tmp = tmp_path(target);
    tokio::fs::write(&tmp, &body).await?;

    // Replace any previous copy only once the download is complete
    if tokio::fs::try_exists(target).await? {
        tokio::fs::remove_file(target).await?;
    }
    tokio::fs::rename(&tmp, target).await?;

    info!(bytes = body.len(), "Download complete");
    Ok(target.to_path_buf())
}

fn tmp_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_local_mode_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("fullfile.zip");

        let err = acquire(&target, None).await.unwrap_err();
        assert!(matches!(err, OrgRefError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_local_mode_returns_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("fullfile.zip");
        std::fs::write(&target, b"archive").unwrap();

        let resolved = acquire(&target, None).await.unwrap();
        assert_eq!(resolved, target);
    }

    #[tokio::test]
    async fn test_download_replaces_previous_copy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fullfile.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fresh".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("fullfile.zip");
        std::fs::write(&target, b"stale").unwrap();

        let url = format!("{}/fullfile.zip", server.uri());
        let resolved = acquire(&target, Some(&url)).await.unwrap();

        assert_eq!(std::fs::read(&resolved).unwrap(), b"fresh");
        assert!(!tmp_path(&target).exists());
    }

    #[tokio::test]
    async fn test_download_failure_keeps_previous_copy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fullfile.zip"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("fullfile.zip");
        std::fs::write(&target, b"previous").unwrap();

        let url = format!("{}/fullfile.zip", server.uri());
        let err = acquire(&target, Some(&url)).await.unwrap_err();

        assert!(matches!(err, OrgRefError::Network(_)));
        assert_eq!(std::fs::read(&target).unwrap(), b"previous");
    }
}
