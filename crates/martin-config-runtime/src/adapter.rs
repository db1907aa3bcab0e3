use async_trait::async_trait;
use martin_config_core::{Bounds, FunctionCatalogEntry, TableCatalogEntry};
use serde::{Deserialize, Serialize};

/// How the spatial extent of a table is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtentMode {
    /// Planner statistics (`ST_EstimatedExtent`). Cheap, may be stale.
    #[default]
    Estimated,
    /// Full scan (`ST_Extent`).
    Exact,
}

/// Extent lookup for one geometry column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtentRequest<'a> {
    pub schema: &'a str,
    pub table: &'a str,
    pub column: &'a str,
    pub srid: i32,
    pub mode: ExtentMode,
}

/// A privilege a database user must hold for an object to be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivilegeCheck {
    SchemaUsage { schema: String },
    TableSelect { schema: String, table: String },
    FunctionExecute { signature: String },
}

impl PrivilegeCheck {
    pub fn privilege(&self) -> &'static str {
        match self {
            PrivilegeCheck::SchemaUsage { .. } => "USAGE",
            PrivilegeCheck::TableSelect { .. } => "SELECT",
            PrivilegeCheck::FunctionExecute { .. } => "EXECUTE",
        }
    }
}

/// Read-only access to the database catalog.
///
/// Implementations map every row into typed records immediately after each
/// query. All methods are read-only.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Every schema visible through the connection, system schemas included.
    async fn list_schemas(&self) -> anyhow::Result<Vec<String>>;

    /// Tables of `schema` with their columns in ordinal order.
    async fn list_tables(&self, schema: &str) -> anyhow::Result<Vec<TableCatalogEntry>>;

    /// Functions of `schema` matching the tile-function parameter convention.
    /// Functions of any other shape are omitted.
    async fn list_functions(&self, schema: &str) -> anyhow::Result<Vec<FunctionCatalogEntry>>;

    /// WGS84 extent of a geometry column. `None` when the extent is empty.
    async fn fetch_extent(&self, request: &ExtentRequest<'_>) -> anyhow::Result<Option<Bounds>>;

    /// Whether `user` holds the privilege described by `check`.
    async fn has_privilege(&self, user: &str, check: &PrivilegeCheck) -> anyhow::Result<bool>;
}
