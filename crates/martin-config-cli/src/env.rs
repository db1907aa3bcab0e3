//! Environment lookup with an optional `.env` fallback.
//!
//! Process environment variables win. Values missing from the process
//! environment are looked up in the env file given with `--env-file`.

use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::path::Path;

/// Environment variable holding the Azure File Share SAS URL.
pub const SAS_URL_ENV: &str = "AZURE_FILESHARE_SASURL";
/// Environment variable holding the Azure storage account name.
pub const STORAGE_ACCOUNT_ENV: &str = "AZURE_STORAGE_ACCOUNT";

#[derive(Debug, Default)]
pub struct EnvSource {
    file: HashMap<String, String>,
}

impl EnvSource {
    /// Load `path` as a dotenv file. A missing or empty file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let metadata = std::fs::metadata(path)
            .with_context(|| format!("env file {} does not exist", path.display()))?;
        if metadata.len() == 0 {
            bail!("env file {} is empty", path.display());
        }

        let mut file = HashMap::new();
        let entries = dotenvy::from_path_iter(path)
            .with_context(|| format!("failed to read env file {}", path.display()))?;
        for entry in entries {
            let (key, value) =
                entry.with_context(|| format!("failed to parse env file {}", path.display()))?;
            file.insert(key, value);
        }
        if file.is_empty() {
            bail!("env file {} defines no variables", path.display());
        }

        tracing::debug!(path = %path.display(), variables = file.len(), "loaded env file");
        Ok(Self { file })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.resolve(key, std::env::var(key).ok())
    }

    fn resolve(&self, key: &str, process_value: Option<String>) -> Option<String> {
        process_value
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.file.get(key).cloned())
            .filter(|v| !v.trim().is_empty())
    }
}
