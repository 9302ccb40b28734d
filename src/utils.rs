use std::{env, path::Path};

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {0}")]
    Status(reqwest::StatusCode),
    #[error("invalid GITHUB_TOKEN format")]
    InvalidToken,
    #[error("failed to write file: {0}")]
    Io(#[from] std::io::Error),
}

async fn download_file(url: &str, path: &Path) -> Result<(), DownloadError> {
    info!("Downloading {} from {}", path.display(), url);

    let mut header_map = HeaderMap::new();

    if let Ok(token) = env::var("GITHUB_TOKEN") {
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| DownloadError::InvalidToken)?;
        header_map.insert(AUTHORIZATION, auth_value);
    }
    header_map.insert(ACCEPT, HeaderValue::from_static("application/octet-stream"));

    let client = reqwest::Client::new();
    let response = client.get(url).headers(header_map).send().await?;

    if !response.status().is_success() {
        return Err(DownloadError::Status(response.status()));
    }

    let bytes = response.bytes().await?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

/// Fetches `path` from `url` when the file is missing locally. Failures are
/// logged and the service starts without the artifact.
pub async fn ensure_file_exists(path: &Path, url: Option<&str>) {
    if path.exists() {
        return;
    }

    match url {
        Some(url) => {
            if let Err(e) = download_file(url, path).await {
                warn!("Could not download {}: {}", path.display(), e);
            }
        }
        None => warn!("{} not found and no download URL configured", path.display()),
    }
}
