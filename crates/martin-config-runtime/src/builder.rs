//! Source descriptor building.
//!
//! Turns an included table and its accepted columns into a [`TableSource`],
//! or into an exclusion reason when no single geometry column can be
//! resolved. Function candidates become [`FunctionSource`]s directly.

use crate::adapter::{CatalogReader, ExtentMode, ExtentRequest};
use martin_config_core::{
    ExclusionReason, Extent, FunctionCatalogEntry, FunctionSource, GeometryMetadata, PropertyMap,
    TableCatalogEntry, TableSource,
};
use martin_config_policy::AcceptedColumns;

/// Options shared by every table built in a run.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Only property columns whose name starts with this prefix are published.
    pub column_prefix: Option<String>,
    pub extent_mode: ExtentMode,
}

/// Geometry column and properties of a table, before the extent is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedGeometry {
    pub column: String,
    pub srid: i32,
    pub geometry_type: String,
    pub properties: PropertyMap,
}

/// Pick the single eligible geometry column and the published properties.
///
/// A geometry column is eligible when it is among the accepted columns, so an
/// explicit `publish=false` on one column disambiguates a two-geometry table.
/// The prefix filter narrows properties further but never re-admits a column
/// its marker rejected.
pub fn resolve_geometry(
    table: &TableCatalogEntry,
    accepted: &AcceptedColumns,
    column_prefix: Option<&str>,
) -> Result<ResolvedGeometry, ExclusionReason> {
    let eligible: Vec<_> = table
        .geometry_columns()
        .filter(|c| accepted.contains(&c.name))
        .collect();

    let geom = match eligible.as_slice() {
        [] => return Err(ExclusionReason::NoGeometryColumn),
        [single] => *single,
        many => {
            return Err(ExclusionReason::AmbiguousGeometryColumn {
                columns: many.iter().map(|c| c.name.clone()).collect(),
            });
        }
    };

    let (srid, geometry_type) = match &geom.geometry {
        Some(entry) => (entry.srid, entry.geometry_type.to_uppercase()),
        None => (0, "GEOMETRY".to_string()),
    };
    if srid <= 0 {
        return Err(ExclusionReason::InvalidSrid {
            column: geom.name.clone(),
            srid,
        });
    }

    let properties = table
        .columns
        .iter()
        .filter(|c| !c.is_geometry())
        .filter(|c| accepted.contains(&c.name))
        .filter(|c| column_prefix.is_none_or(|prefix| c.name.starts_with(prefix)))
        .map(|c| (c.name.clone(), c.type_name.clone()))
        .collect();

    Ok(ResolvedGeometry {
        column: geom.name.clone(),
        srid,
        geometry_type,
        properties,
    })
}

/// Result of building one table.
#[derive(Debug, Clone, PartialEq)]
pub enum TableOutcome {
    Built(TableSource),
    Excluded(ExclusionReason),
}

/// Build the descriptor of an included table, querying its extent.
///
/// An empty or failing extent query does not exclude the table; the source
/// gets [`Extent::Unknown`] instead.
pub async fn build_table_source<R: CatalogReader + ?Sized>(
    reader: &R,
    table: &TableCatalogEntry,
    accepted: &AcceptedColumns,
    options: &BuildOptions,
) -> TableOutcome {
    let resolved = match resolve_geometry(table, accepted, options.column_prefix.as_deref()) {
        Ok(resolved) => resolved,
        Err(reason) => return TableOutcome::Excluded(reason),
    };

    let request = ExtentRequest {
        schema: &table.schema,
        table: &table.name,
        column: &resolved.column,
        srid: resolved.srid,
        mode: options.extent_mode,
    };

    let extent = match reader.fetch_extent(&request).await {
        Ok(Some(bounds)) => Extent::Known(bounds),
        Ok(None) => {
            tracing::info!(
                table = %table.qualified_name(),
                column = %resolved.column,
                "empty extent, using world bounds"
            );
            Extent::Unknown
        }
        Err(e) => {
            tracing::warn!(
                table = %table.qualified_name(),
                column = %resolved.column,
                error = %e,
                "extent query failed, using world bounds"
            );
            Extent::Unknown
        }
    };

    TableOutcome::Built(TableSource::new(
        table.schema.clone(),
        table.name.clone(),
        GeometryMetadata {
            column: resolved.column,
            srid: resolved.srid,
            geometry_type: resolved.geometry_type,
            extent,
            properties: resolved.properties,
        },
    ))
}

/// Functions are not gated by comments; the signature filter already applied.
pub fn build_function_source(function: &FunctionCatalogEntry) -> FunctionSource {
    FunctionSource::new(
        function.schema.clone(),
        function.name.clone(),
        function.parameters.clone(),
    )
}
