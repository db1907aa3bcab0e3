//! Remote storage of the rendered configuration.
//!
//! The pipeline only hands finished bytes to an [`ArtifactStore`]; it never
//! knows which backend, if any, is configured.

use async_trait::async_trait;
use martin_config_core::{Error, Result};

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` under `name`. Authorization is the store's concern.
    async fn store(&self, name: &str, bytes: &[u8]) -> anyhow::Result<()>;

    /// Short human-readable destination, used in logs.
    fn destination(&self) -> String;
}

/// Store used when no upload target is configured.
pub struct NoopStore;

#[async_trait]
impl ArtifactStore for NoopStore {
    async fn store(&self, name: &str, _bytes: &[u8]) -> anyhow::Result<()> {
        tracing::debug!(name, "no upload target configured");
        Ok(())
    }

    fn destination(&self) -> String {
        "none".to_string()
    }
}

/// Upload a rendered artifact, mapping failures to [`Error::Upload`].
pub async fn publish_artifact(store: &dyn ArtifactStore, name: &str, bytes: &[u8]) -> Result<()> {
    tracing::debug!(name, destination = %store.destination(), size = bytes.len(), "uploading configuration");
    store
        .store(name, bytes)
        .await
        .map_err(|e| Error::Upload(format!("{}: {:#}", store.destination(), e)))
}
