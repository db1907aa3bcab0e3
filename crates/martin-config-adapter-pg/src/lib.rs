use anyhow::Context;
use async_trait::async_trait;
use martin_config_core::config::ConnectionPoolConfig;
use martin_config_core::{Bounds, FunctionCatalogEntry, TableCatalogEntry};
use martin_config_runtime::{CatalogReader, ExtentRequest, PrivilegeCheck};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;

pub mod introspect;

/// [`CatalogReader`] over a PostGIS database.
pub struct PostgresCatalog {
    pool: sqlx::PgPool,
}

impl PostgresCatalog {
    /// Open a pool against `database_url`. Every session gets the configured
    /// statement timeout.
    pub async fn connect(database_url: &str, pool: &ConnectionPoolConfig) -> anyhow::Result<Self> {
        let options = PgConnectOptions::from_str(database_url)
            .context("invalid database connection string")?
            .options([(
                "statement_timeout",
                format!("{}s", pool.statement_timeout_seconds),
            )]);

        tracing::debug!(
            host = %options.get_host(),
            port = options.get_port(),
            database = ?options.get_database(),
            "connecting to database"
        );

        let pool = PgPoolOptions::new()
            .min_connections(pool.min_connections)
            .max_connections(pool.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(pool.acquire_timeout_seconds))
            .connect_with(options)
            .await
            .context("failed to connect to database")?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}

#[async_trait]
impl CatalogReader for PostgresCatalog {
    async fn list_schemas(&self) -> anyhow::Result<Vec<String>> {
        introspect::list_schemas(&self.pool).await
    }

    async fn list_tables(&self, schema: &str) -> anyhow::Result<Vec<TableCatalogEntry>> {
        introspect::list_tables(&self.pool, schema).await
    }

    async fn list_functions(&self, schema: &str) -> anyhow::Result<Vec<FunctionCatalogEntry>> {
        introspect::list_functions(&self.pool, schema).await
    }

    async fn fetch_extent(&self, request: &ExtentRequest<'_>) -> anyhow::Result<Option<Bounds>> {
        introspect::fetch_extent(&self.pool, request).await
    }

    async fn has_privilege(&self, user: &str, check: &PrivilegeCheck) -> anyhow::Result<bool> {
        introspect::has_privilege(&self.pool, user, check).await
    }
}
