//! Typed catalog snapshots.
//!
//! Rows returned by catalog queries are mapped into these records right after
//! each query; nothing downstream sees raw rows. Records are read-only
//! snapshots of the database at scan time.

use serde::{Deserialize, Serialize};

/// Schemas that are never scanned unless a caller names them explicitly.
pub const SYSTEM_SCHEMAS: &[&str] = &["pg_catalog", "information_schema", "pg_toast"];

/// Whether `schema` is a Postgres system schema (including per-session temp schemas).
pub fn is_system_schema(schema: &str) -> bool {
    SYSTEM_SCHEMAS.contains(&schema)
        || schema.starts_with("pg_temp_")
        || schema.starts_with("pg_toast_temp_")
}

/// Geometry attributes registered for a column in PostGIS `geometry_columns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryColumnEntry {
    /// Spatial reference id. Zero when the column is unconstrained.
    pub srid: i32,
    /// Geometry type tag, e.g. `POINT`, `MULTIPOLYGON`, `GEOMETRY`.
    pub geometry_type: String,
}

/// A single table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCatalogEntry {
    pub name: String,
    /// Declared type as formatted by the catalog, e.g. `geometry(Point,3857)`.
    pub data_type: String,
    /// Base type name, e.g. `int4`, `text`, `geometry`.
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Present when the column is registered as a geometry column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<GeometryColumnEntry>,
}

impl ColumnCatalogEntry {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self {
            name: name.into(),
            data_type: type_name.clone(),
            type_name,
            comment: None,
            geometry: None,
        }
    }

    /// Attach a catalog comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Mark the column as a registered geometry column.
    pub fn with_geometry(mut self, srid: i32, geometry_type: impl Into<String>) -> Self {
        let geometry_type = geometry_type.into();
        self.data_type = format!("geometry({},{})", geometry_type, srid);
        self.type_name = "geometry".to_string();
        self.geometry = Some(GeometryColumnEntry {
            srid,
            geometry_type,
        });
        self
    }

    pub fn is_geometry(&self) -> bool {
        self.geometry.is_some() || self.type_name.eq_ignore_ascii_case("geometry")
    }
}

/// A table (or view) with its columns in catalog ordinal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCatalogEntry {
    pub schema: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub columns: Vec<ColumnCatalogEntry>,
}

impl TableCatalogEntry {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            comment: None,
            columns: Vec::new(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_column(mut self, column: ColumnCatalogEntry) -> Self {
        self.columns.push(column);
        self
    }

    /// `schema.table`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnCatalogEntry> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn geometry_columns(&self) -> impl Iterator<Item = &ColumnCatalogEntry> {
        self.columns.iter().filter(|c| c.is_geometry())
    }
}

/// A SQL function that follows the martin tile-function convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCatalogEntry {
    pub schema: String,
    pub name: String,
    /// Input parameter names in positional order.
    pub parameters: Vec<String>,
    /// Qualified signature with argument types only, e.g.
    /// `public.tiles(integer, integer, integer, json)`. Accepted by
    /// `regprocedure` input, so it identifies one overload.
    pub signature: String,
}

impl FunctionCatalogEntry {
    /// `parameters` are `(name, type)` pairs in positional order.
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        parameters: &[(&str, &str)],
    ) -> Self {
        let schema = schema.into();
        let name = name.into();
        let types: Vec<&str> = parameters.iter().map(|(_, ty)| *ty).collect();
        let signature = function_signature(&schema, &name, &types);
        Self {
            schema,
            name,
            parameters: parameters.iter().map(|(p, _)| p.to_string()).collect(),
            signature,
        }
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    pub fn is_tile_function(&self) -> bool {
        matches_tile_signature(&self.parameters)
    }
}

/// Signature in the form Postgres prints for `oidvectortypes`, with
/// identifiers quoted the way `quote_ident` does for non-keywords.
pub fn function_signature<S: AsRef<str>>(schema: &str, name: &str, arg_types: &[S]) -> String {
    let types: Vec<&str> = arg_types.iter().map(|t| t.as_ref()).collect();
    format!(
        "{}.{}({})",
        quote_ident_if_needed(schema),
        quote_ident_if_needed(name),
        types.join(", ")
    )
}

fn quote_ident_if_needed(ident: &str) -> String {
    let plain = ident
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && ident
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if plain {
        ident.to_string()
    } else {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

/// Whether a parameter-name list follows the tile-function convention:
/// `(z, x, y)` with an optional trailing `query_params` blob.
/// `zoom` is accepted in place of `z`.
pub fn matches_tile_signature<S: AsRef<str>>(parameters: &[S]) -> bool {
    let names: Vec<String> = parameters
        .iter()
        .map(|p| p.as_ref().trim().to_ascii_lowercase())
        .collect();

    let coords_match = |names: &[String]| {
        matches!(names[0].as_str(), "z" | "zoom") && names[1] == "x" && names[2] == "y"
    };

    match names.len() {
        3 => coords_match(&names),
        4 => coords_match(&names) && names[3] == "query_params",
        _ => false,
    }
}
