//! Azure File Share upload over the Files REST API.
//!
//! A file is created at its final size, then written with `Put Range`
//! requests of at most 4 MiB each. Authorization comes entirely from the
//! SAS token in the configured URL.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use martin_config_runtime::ArtifactStore;
use reqwest::Url;

/// Largest body accepted by a single `Put Range` request.
pub const MAX_RANGE_BYTES: usize = 4 * 1024 * 1024;

const API_VERSION: &str = "2021-06-08";

pub const DEFAULT_SHARE: &str = "mconfig";

pub struct AzureFileShareStore {
    client: reqwest::Client,
    sas_url: Url,
    share: String,
}

impl AzureFileShareStore {
    /// `account`, when given, must appear in the host of `sas_url`.
    pub fn new(sas_url: &str, share: impl Into<String>, account: Option<&str>) -> Result<Self> {
        let sas_url = Url::parse(sas_url).context("invalid Azure File Share SAS URL")?;
        let host = sas_url
            .host_str()
            .ok_or_else(|| anyhow!("SAS URL has no host"))?;
        if let Some(account) = account
            && !host.to_ascii_lowercase().contains(&account.to_ascii_lowercase())
        {
            bail!("storage account '{}' does not match SAS URL host '{}'", account, host);
        }

        let client = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            sas_url,
            share: share.into(),
        })
    }

    pub fn file_url(&self, file_name: &str) -> Result<Url> {
        file_url(&self.sas_url, &self.share, file_name)
    }
}

/// URL of `file_name` in `share`, keeping the SAS query string.
///
/// A SAS URL that already points at the share is not extended with the
/// share name a second time.
pub fn file_url(sas_url: &Url, share: &str, file_name: &str) -> Result<Url> {
    let parts: Vec<&str> = file_name.split('/').filter(|p| !p.is_empty()).collect();
    if parts.is_empty() {
        bail!("empty upload file name");
    }

    let mut url = sas_url.clone();
    let points_at_share = url
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .is_some_and(|last| last == share);

    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| anyhow!("SAS URL cannot be used as a base URL"))?;
        segments.pop_if_empty();
        if !points_at_share {
            segments.push(share);
        }
        segments.extend(parts);
    }
    Ok(url)
}

/// Inclusive byte ranges covering `len` bytes in chunks of at most `chunk`.
pub fn byte_ranges(len: usize, chunk: usize) -> Vec<(usize, usize)> {
    let chunk = chunk.max(1);
    (0..len)
        .step_by(chunk)
        .map(|start| (start, (start + chunk).min(len) - 1))
        .collect()
}

async fn ensure_success(response: reqwest::Response, step: &str) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    bail!("{} failed with HTTP {}: {}", step, status, body.trim())
}

#[async_trait]
impl ArtifactStore for AzureFileShareStore {
    async fn store(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let url = self.file_url(name)?;

        let response = self
            .client
            .put(url.clone())
            .header("x-ms-version", API_VERSION)
            .header("x-ms-type", "file")
            .header("x-ms-content-length", bytes.len().to_string())
            .header("x-ms-file-permission", "inherit")
            .header("x-ms-file-attributes", "None")
            .header("x-ms-file-creation-time", "now")
            .header("x-ms-file-last-write-time", "now")
            .body(Vec::new())
            .send()
            .await
            .context("create file request failed")?;
        ensure_success(response, "create file").await?;

        let mut range_url = url;
        range_url.query_pairs_mut().append_pair("comp", "range");

        for (start, end) in byte_ranges(bytes.len(), MAX_RANGE_BYTES) {
            tracing::debug!(name, start, end, "uploading range");
            let response = self
                .client
                .put(range_url.clone())
                .header("x-ms-version", API_VERSION)
                .header("x-ms-write", "update")
                .header("x-ms-range", format!("bytes={}-{}", start, end))
                .body(bytes[start..=end].to_vec())
                .send()
                .await
                .context("put range request failed")?;
            ensure_success(response, "put range").await?;
        }

        tracing::info!(destination = %self.destination(), name, size = bytes.len(), "configuration uploaded");
        Ok(())
    }

    fn destination(&self) -> String {
        format!(
            "{}/{}",
            self.sas_url.host_str().unwrap_or_default(),
            self.share
        )
    }
}
