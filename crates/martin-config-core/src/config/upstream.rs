//! Database connection settings.
//!
//! The connection string is resolved from, in order of precedence:
//! 1. an environment variable holding a full URL (`POSTGRES_DSN` by default)
//! 2. a direct URL
//! 3. individual fields (host, port, database, username, password)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default environment variable holding the PostGIS connection string.
pub const DEFAULT_DSN_ENV: &str = "POSTGRES_DSN";

/// Connection settings for the PostGIS database being scanned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Environment variable containing the connection URL. Highest precedence.
    #[serde(default = "default_dsn_env")]
    pub database_url_env: Option<String>,

    /// Full connection URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// SSL mode appended to URLs built from individual fields.
    #[serde(default)]
    pub ssl_mode: SslMode,

    #[serde(default)]
    pub pool: ConnectionPoolConfig,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            database_url_env: default_dsn_env(),
            database_url: None,
            host: None,
            port: default_port(),
            database: None,
            username: None,
            password: None,
            ssl_mode: SslMode::default(),
            pool: ConnectionPoolConfig::default(),
        }
    }
}

/// SSL mode for database connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    Disable,
    Allow,
    #[default]
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl SslMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Allow => "allow",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
            SslMode::VerifyCa => "verify-ca",
            SslMode::VerifyFull => "verify-full",
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disable" => Ok(SslMode::Disable),
            "allow" => Ok(SslMode::Allow),
            "prefer" => Ok(SslMode::Prefer),
            "require" => Ok(SslMode::Require),
            "verify-ca" => Ok(SslMode::VerifyCa),
            "verify-full" => Ok(SslMode::VerifyFull),
            other => Err(format!(
                "unknown ssl mode '{}', expected one of disable, allow, prefer, require, verify-ca, verify-full",
                other
            )),
        }
    }
}

/// Connection pool settings. Catalog scans are short and read-only, so the
/// pool stays small.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionPoolConfig {
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Timeout in seconds when acquiring a connection.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,

    /// Per-statement timeout in seconds.
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout_seconds: u64,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            acquire_timeout_seconds: default_acquire_timeout(),
            statement_timeout_seconds: default_statement_timeout(),
        }
    }
}

impl UpstreamConfig {
    /// Settings that read the connection URL from `env_var`.
    pub fn from_env_var(env_var: impl Into<String>) -> Self {
        Self {
            database_url_env: Some(env_var.into()),
            ..Default::default()
        }
    }

    /// Resolve the connection string against the process environment.
    pub fn connection_string(&self) -> Option<String> {
        self.connection_string_with(|key| std::env::var(key).ok())
    }

    /// Resolve the connection string, looking environment values up with `lookup`.
    ///
    /// Username, password and database are percent-encoded when the URL is
    /// built from individual fields.
    pub fn connection_string_with<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(env_var) = &self.database_url_env
            && let Some(url) = lookup(env_var).filter(|u| !u.trim().is_empty())
        {
            return Some(url);
        }

        if let Some(url) = &self.database_url {
            return Some(url.clone());
        }

        let host = self.host.as_deref()?;
        let database = self.database.as_deref()?;
        let credentials = match (&self.username, &self.password) {
            (Some(user), Some(password)) => {
                format!("{}:{}@", urlencoding::encode(user), urlencoding::encode(password))
            }
            (Some(user), None) => format!("{}@", urlencoding::encode(user)),
            _ => String::new(),
        };
        Some(format!(
            "postgresql://{}{}:{}/{}?sslmode={}",
            credentials,
            host,
            self.port,
            urlencoding::encode(database),
            self.ssl_mode.as_str()
        ))
    }
}

fn default_dsn_env() -> Option<String> {
    Some(DEFAULT_DSN_ENV.to_string())
}

fn default_port() -> u16 {
    5432
}

fn default_min_connections() -> u32 {
    3
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_statement_timeout() -> u64 {
    15 * 60
}
