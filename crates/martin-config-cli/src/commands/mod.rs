//! CLI command implementations.

pub mod generate;
pub mod schemas;

use crate::env::EnvSource;
use anyhow::{Context, Result};
use clap::Args;
use martin_config_adapter_pg::PostgresCatalog;
use martin_config_core::UpstreamConfig;
use martin_config_core::config::upstream::{DEFAULT_DSN_ENV, SslMode};
use std::path::PathBuf;

/// Database connection arguments shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// PostGIS connection string. Defaults to the POSTGRES_DSN environment variable.
    #[arg(long, conflicts_with_all = ["host", "port", "database", "username", "password", "ssl_mode"])]
    pub dsn: Option<String>,

    /// Database host. Any connection field flag replaces POSTGRES_DSN.
    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long)]
    pub database: Option<String>,

    #[arg(long)]
    pub username: Option<String>,

    #[arg(long)]
    pub password: Option<String>,

    /// disable, allow, prefer, require, verify-ca or verify-full.
    #[arg(long)]
    pub ssl_mode: Option<SslMode>,

    /// Dotenv file consulted for variables missing from the environment.
    #[arg(short = 'e', long = "env-file")]
    pub env_file: Option<PathBuf>,
}

impl ConnectionArgs {
    pub fn load_env(&self) -> Result<EnvSource> {
        EnvSource::load(self.env_file.as_deref())
    }

    fn has_field_flags(&self) -> bool {
        self.host.is_some()
            || self.port.is_some()
            || self.database.is_some()
            || self.username.is_some()
            || self.password.is_some()
            || self.ssl_mode.is_some()
    }

    /// Connection settings: `--dsn` when given, then the individual field
    /// flags, otherwise `POSTGRES_DSN`.
    pub fn upstream(&self) -> UpstreamConfig {
        if let Some(dsn) = &self.dsn {
            return UpstreamConfig {
                database_url_env: None,
                database_url: Some(dsn.clone()),
                ..Default::default()
            };
        }
        if !self.has_field_flags() {
            return UpstreamConfig::default();
        }

        let defaults = UpstreamConfig::default();
        UpstreamConfig {
            database_url_env: None,
            host: self.host.clone(),
            port: self.port.unwrap_or(defaults.port),
            database: self.database.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            ssl_mode: self.ssl_mode.unwrap_or(defaults.ssl_mode),
            ..defaults
        }
    }

    /// Connection settings with a pool large enough for `concurrency`
    /// simultaneous catalog queries.
    pub fn upstream_for(&self, concurrency: usize) -> UpstreamConfig {
        let mut upstream = self.upstream();
        let wanted = u32::try_from(concurrency).unwrap_or(u32::MAX);
        upstream.pool.max_connections = upstream.pool.max_connections.max(wanted);
        upstream.pool.min_connections = upstream.pool.min_connections.min(upstream.pool.max_connections);
        upstream
    }

    pub async fn connect(&self, env: &EnvSource, concurrency: usize) -> Result<PostgresCatalog> {
        let upstream = self.upstream_for(concurrency);
        let url = upstream
            .connection_string_with(|key| env.get(key))
            .with_context(|| {
                if self.has_field_flags() {
                    "incomplete connection settings: --host and --database are required".to_string()
                } else {
                    format!(
                        "no database connection configured: pass --dsn, --host/--database or set {}",
                        DEFAULT_DSN_ENV
                    )
                }
            })?;
        PostgresCatalog::connect(&url, &upstream.pool).await
    }
}
