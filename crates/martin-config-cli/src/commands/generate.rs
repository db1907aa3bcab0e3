//! `martin-config generate` - scan the catalog and write the martin configuration.
//!
//! The document is written locally (file or stdout) before any upload, so a
//! failed upload still leaves the artifact behind.

use super::ConnectionArgs;
use crate::azfile::{AzureFileShareStore, DEFAULT_SHARE};
use crate::env::{EnvSource, SAS_URL_ENV, STORAGE_ACCOUNT_ENV};
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use martin_config_core::{GeneralConfig, OutputFormat};
use martin_config_runtime::{
    ArtifactStore, ExtentMode, GenerateOptions, MissingSchemaPolicy, NoopStore, Orchestrator,
    SchemaSelection, publish_artifact,
};
use std::io::Write;
use std::path::{Path, PathBuf};

const DEFAULT_FILE_NAME: &str = "config.yaml";
const DEFAULT_MAX_CONCURRENCY: u16 = 5;

#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Schemas to scan. Repeat the flag or pass a comma-separated list; `all` scans every schema.
    #[arg(short = 's', long = "schema", value_name = "SCHEMA")]
    pub schemas: Vec<String>,

    /// Only publish objects this database user can access.
    #[arg(short = 'u', long = "database-user")]
    pub database_user: Option<String>,

    /// Output file. The document goes to stdout when omitted.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Do not emit function sources.
    #[arg(long, default_value_t = false)]
    pub skip_function_sources: bool,

    /// Do not emit the general server section.
    #[arg(long, default_value_t = false)]
    pub skip_general: bool,

    /// Only publish property columns starting with this prefix.
    #[arg(long)]
    pub column_prefix: Option<String>,

    /// Compute exact extents with a full table scan instead of planner estimates.
    #[arg(long, default_value_t = false)]
    pub compute_extent: bool,

    /// What to do when a requested schema does not exist.
    #[arg(long, value_enum, default_value_t = MissingSchemaArg::Skip)]
    pub missing_schema: MissingSchemaArg,

    #[arg(long, value_enum, default_value_t = FormatArg::Yaml)]
    pub format: FormatArg,

    /// Maximum number of catalog queries in flight. The connection pool is sized to match.
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENCY, value_parser = clap::value_parser!(u16).range(1..))]
    pub max_concurrency: u16,

    /// Azure File Share receiving the uploaded document.
    #[arg(long, default_value = DEFAULT_SHARE)]
    pub upload_share: String,

    /// Name of the uploaded file. Defaults to the output file name.
    #[arg(long)]
    pub upload_file_name: Option<String>,

    /// Azure storage account. Defaults to AZURE_STORAGE_ACCOUNT.
    #[arg(long)]
    pub storage_account: Option<String>,

    /// Azure File Share SAS URL. Defaults to AZURE_FILESHARE_SASURL; no upload without it.
    #[arg(long)]
    pub sas_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MissingSchemaArg {
    Skip,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Yaml,
    Json,
}

impl From<MissingSchemaArg> for MissingSchemaPolicy {
    fn from(arg: MissingSchemaArg) -> Self {
        match arg {
            MissingSchemaArg::Skip => MissingSchemaPolicy::Skip,
            MissingSchemaArg::Fail => MissingSchemaPolicy::Fail,
        }
    }
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Yaml => OutputFormat::Yaml,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

impl GenerateArgs {
    pub fn options(&self) -> GenerateOptions {
        GenerateOptions {
            schemas: SchemaSelection::from_args(&self.schemas),
            include_functions: !self.skip_function_sources,
            include_general: !self.skip_general,
            general: GeneralConfig::default(),
            column_prefix: self.column_prefix.clone().filter(|p| !p.is_empty()),
            extent_mode: if self.compute_extent {
                ExtentMode::Exact
            } else {
                ExtentMode::Estimated
            },
            missing_schema: self.missing_schema.into(),
            database_user: self.database_user.clone(),
            max_concurrency: usize::from(self.max_concurrency),
        }
    }

    /// Name used for the uploaded file.
    pub fn upload_file_name(&self) -> String {
        self.upload_file_name
            .clone()
            .or_else(|| {
                self.output
                    .as_deref()
                    .and_then(Path::file_name)
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string())
    }

    /// Upload target, or [`NoopStore`] when no SAS URL is configured.
    pub fn artifact_store(&self, env: &EnvSource) -> Result<Box<dyn ArtifactStore>> {
        let sas_url = self.sas_url.clone().or_else(|| env.get(SAS_URL_ENV));
        let account = self
            .storage_account
            .clone()
            .or_else(|| env.get(STORAGE_ACCOUNT_ENV));

        match sas_url {
            Some(sas_url) => Ok(Box::new(AzureFileShareStore::new(
                &sas_url,
                self.upload_share.clone(),
                account.as_deref(),
            )?)),
            None => {
                if account.is_some() {
                    tracing::warn!("storage account set without {}, skipping upload", SAS_URL_ENV);
                }
                Ok(Box::new(NoopStore))
            }
        }
    }
}

pub async fn run(args: GenerateArgs) -> Result<()> {
    let env = args.connection.load_env()?;
    let store = args.artifact_store(&env)?;
    let catalog = args
        .connection
        .connect(&env, usize::from(args.max_concurrency))
        .await?;

    let report = Orchestrator::new(catalog, args.options()).run().await?;
    report.log_summary();

    let rendered = report.configuration.render(args.format.into())?;
    write_output(args.output.as_deref(), &rendered)?;

    publish_artifact(store.as_ref(), &args.upload_file_name(), rendered.as_bytes()).await?;
    Ok(())
}

fn write_output(path: Option<&Path>, rendered: &str) -> Result<()> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "configuration written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(rendered.as_bytes())
                .context("failed to write configuration to stdout")?;
            stdout.flush()?;
        }
    }
    Ok(())
}
