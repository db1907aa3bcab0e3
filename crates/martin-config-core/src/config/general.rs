//! General (server) section of the martin configuration.

use serde::{Deserialize, Serialize};

/// Server and process defaults emitted at the top of the document.
///
/// This is a fixed template independent of database contents; values that
/// martin resolves from its own environment are written as `$VAR` references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Socket address martin binds to.
    #[serde(default = "default_listen_addresses")]
    pub listen_addresses: String,

    /// Database connection string, resolved by martin at startup.
    #[serde(default = "default_connection_string")]
    pub connection_string: String,

    /// Maximum connection pool size.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Connection keep alive timeout in seconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive: u32,

    /// Number of web server workers.
    #[serde(default = "default_worker_processes")]
    pub worker_processes: u32,

    /// Watch mode.
    #[serde(default)]
    pub watch: bool,

    /// Trust invalid certificates.
    #[serde(default = "default_true")]
    pub danger_accept_invalid_certs: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            listen_addresses: default_listen_addresses(),
            connection_string: default_connection_string(),
            pool_size: default_pool_size(),
            keep_alive: default_keep_alive(),
            worker_processes: default_worker_processes(),
            watch: false,
            danger_accept_invalid_certs: true,
        }
    }
}

fn default_listen_addresses() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_connection_string() -> String {
    "$DATABASE_URL".to_string()
}

fn default_pool_size() -> u32 {
    20
}

fn default_keep_alive() -> u32 {
    75
}

fn default_worker_processes() -> u32 {
    8
}

fn default_true() -> bool {
    true
}
