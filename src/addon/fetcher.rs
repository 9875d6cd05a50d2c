//! Addon package retrieval.
//!
//! A [`PackageSource`] places the package for a named addon at a local temp
//! path. The remote endpoint answers either with raw archive bytes or with a
//! JSON error envelope `{code, msg, data}`, told apart by the first byte.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;

use super::sync::write_atomic;
use super::{AddonError, AddonResult};
use crate::core::RemoteConfig;

/// Somewhere addon packages can be fetched from.
pub trait PackageSource: Send + Sync {
    /// Fetch the package for `name` and write it to `dest`.
    fn fetch(&self, name: &str, dest: &Path) -> AddonResult<PathBuf>;
}

/// Error envelope returned by the remote endpoint.
#[derive(Debug, Deserialize)]
struct RemoteEnvelope {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Value,
}

/// Interpret a successful response body.
///
/// Returns the archive bytes, or the structured remote error.
pub fn classify_payload(body: &[u8]) -> AddonResult<&[u8]> {
    if body.first() != Some(&b'{') {
        return Ok(body);
    }

    let envelope: RemoteEnvelope = serde_json::from_slice(body)
        .map_err(|e| AddonError::Transport(format!("Malformed error envelope: {e}")))?;

    Err(AddonError::Remote { code: envelope.code, msg: envelope.msg, data: envelope.data })
}

/// Downloads packages over HTTP.
pub struct RemoteSource {
    /// Download endpoint.
    url: String,

    /// HTTP client
    client: reqwest::blocking::Client,
}

impl RemoteSource {
    /// Create a remote source from configuration.
    pub fn new(config: &RemoteConfig) -> AddonResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));

        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(format!("addonkit/{}", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| AddonError::Transport(e.to_string()))?;

        Ok(Self { url: config.url.clone(), client })
    }

    /// The configured endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl PackageSource for RemoteSource {
    fn fetch(&self, name: &str, dest: &Path) -> AddonResult<PathBuf> {
        tracing::info!(addon = name, url = %self.url, "Downloading addon package");

        let response = self
            .client
            .get(&self.url)
            .query(&[("name", name)])
            .send()
            .map_err(|e| AddonError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AddonError::Transport(format!(
                "Failed to download addon: HTTP {}",
                response.status()
            )));
        }

        let body = response.bytes().map_err(|e| AddonError::Transport(e.to_string()))?;
        let archive = classify_payload(&body)?;

        write_atomic(dest, archive)?;
        tracing::debug!(addon = name, bytes = archive.len(), path = %dest.display(), "Saved package");

        Ok(dest.to_path_buf())
    }
}

/// Reads packages from the local filesystem.
#[derive(Debug, Clone)]
pub enum LocalSource {
    /// `<dir>/<name>.zip`
    Directory(PathBuf),
    /// One specific archive, whatever the requested name.
    File(PathBuf),
}

impl LocalSource {
    fn path_for(&self, name: &str) -> PathBuf {
        match self {
            Self::Directory(dir) => dir.join(format!("{name}.zip")),
            Self::File(file) => file.clone(),
        }
    }
}

impl PackageSource for LocalSource {
    fn fetch(&self, name: &str, dest: &Path) -> AddonResult<PathBuf> {
        let source = self.path_for(name);
        let bytes = std::fs::read(&source)
            .map_err(|e| AddonError::Transport(format!("{}: {e}", source.display())))?;

        let archive = classify_payload(&bytes)?;
        write_atomic(dest, archive)?;

        tracing::debug!(addon = name, source = %source.display(), "Copied local package");
        Ok(dest.to_path_buf())
    }
}
