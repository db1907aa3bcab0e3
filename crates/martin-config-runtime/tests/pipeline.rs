//! End-to-end generation runs against an in-memory catalog.

use async_trait::async_trait;
use martin_config_core::{
    Bounds, ColumnCatalogEntry, Error, ExclusionReason, FunctionCatalogEntry, OutputFormat,
    TableCatalogEntry,
};
use martin_config_runtime::{
    CatalogReader, ExtentRequest, GenerateOptions, MissingSchemaPolicy, Orchestrator,
    PrivilegeCheck, SchemaSelection,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default, Clone)]
struct MemoryCatalog {
    schemas: BTreeMap<String, Vec<TableCatalogEntry>>,
    functions: BTreeMap<String, Vec<FunctionCatalogEntry>>,
    extents: BTreeMap<String, Bounds>,
    broken_schemas: BTreeSet<String>,
    broken_extents: BTreeSet<String>,
    /// Privileges the `viewer` user holds, as `PRIVILEGE object` strings.
    grants: BTreeSet<String>,
    load: Load,
}

/// Tracks how many catalog calls are in flight at once.
#[derive(Default, Clone)]
struct Load {
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Load {
    async fn enter(&self) -> LoadGuard {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        // let sibling futures start before this call completes
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        LoadGuard(self.in_flight.clone())
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct LoadGuard(Arc<AtomicUsize>);

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Postgres resolves `has_function_privilege` arguments as regprocedure,
/// which accepts argument types but not parameter names.
fn parse_regprocedure(signature: &str) -> anyhow::Result<()> {
    let args = signature
        .split_once('(')
        .and_then(|(_, rest)| rest.strip_suffix(')'))
        .ok_or_else(|| anyhow::anyhow!("invalid function signature: {signature}"))?;
    for arg in args.split(',').map(str::trim).filter(|a| !a.is_empty()) {
        let words: Vec<&str> = arg.split_whitespace().collect();
        let known_type = matches!(
            words.as_slice(),
            [_] | ["double", "precision"] | ["character", "varying"]
        );
        if !known_type {
            anyhow::bail!("syntax error at or near \"{}\"", words.last().copied().unwrap_or(arg));
        }
    }
    Ok(())
}

impl MemoryCatalog {
    fn with_table(mut self, table: TableCatalogEntry) -> Self {
        self.schemas.entry(table.schema.clone()).or_default().push(table);
        self
    }

    fn with_function(mut self, function: FunctionCatalogEntry) -> Self {
        self.schemas.entry(function.schema.clone()).or_default();
        self.functions
            .entry(function.schema.clone())
            .or_default()
            .push(function);
        self
    }

    fn with_schema(mut self, schema: &str) -> Self {
        self.schemas.entry(schema.to_string()).or_default();
        self
    }

    fn with_extent(mut self, table: &str, bounds: Bounds) -> Self {
        self.extents.insert(table.to_string(), bounds);
        self
    }

    fn broken(mut self, schema: &str) -> Self {
        self.broken_schemas.insert(schema.to_string());
        self
    }

    fn grant(mut self, grant: &str) -> Self {
        self.grants.insert(grant.to_string());
        self
    }

    fn check_schema(&self, schema: &str) -> anyhow::Result<()> {
        if self.broken_schemas.contains(schema) {
            anyhow::bail!("permission denied for schema {schema}");
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogReader for MemoryCatalog {
    async fn list_schemas(&self) -> anyhow::Result<Vec<String>> {
        let _guard = self.load.enter().await;
        let mut schemas: Vec<String> = self.schemas.keys().cloned().collect();
        schemas.push("pg_catalog".to_string());
        schemas.push("information_schema".to_string());
        Ok(schemas)
    }

    async fn list_tables(&self, schema: &str) -> anyhow::Result<Vec<TableCatalogEntry>> {
        let _guard = self.load.enter().await;
        self.check_schema(schema)?;
        Ok(self.schemas.get(schema).cloned().unwrap_or_default())
    }

    async fn list_functions(&self, schema: &str) -> anyhow::Result<Vec<FunctionCatalogEntry>> {
        let _guard = self.load.enter().await;
        self.check_schema(schema)?;
        Ok(self
            .functions
            .get(schema)
            .map(|fns| fns.iter().filter(|f| f.is_tile_function()).cloned().collect())
            .unwrap_or_default())
    }

    async fn fetch_extent(&self, request: &ExtentRequest<'_>) -> anyhow::Result<Option<Bounds>> {
        let _guard = self.load.enter().await;
        let key = format!("{}.{}", request.schema, request.table);
        if self.broken_extents.contains(&key) {
            anyhow::bail!("could not estimate extent");
        }
        Ok(self.extents.get(&key).copied())
    }

    async fn has_privilege(&self, user: &str, check: &PrivilegeCheck) -> anyhow::Result<bool> {
        let _guard = self.load.enter().await;
        if let PrivilegeCheck::FunctionExecute { signature } = check {
            parse_regprocedure(signature)?;
        }
        if user != "viewer" {
            return Ok(false);
        }
        let object = match check {
            PrivilegeCheck::SchemaUsage { schema } => schema.clone(),
            PrivilegeCheck::TableSelect { schema, table } => format!("{schema}.{table}"),
            PrivilegeCheck::FunctionExecute { signature } => signature.clone(),
        };
        Ok(self.grants.contains(&format!("{} {}", check.privilege(), object)))
    }
}

fn geom(srid: i32, geometry_type: &str) -> ColumnCatalogEntry {
    ColumnCatalogEntry::new("geom", "geometry").with_geometry(srid, geometry_type)
}

fn roads(schema: &str) -> TableCatalogEntry {
    TableCatalogEntry::new(schema, "roads")
        .with_comment("publish=true")
        .with_column(geom(3857, "LINESTRING"))
        .with_column(ColumnCatalogEntry::new("name", "text"))
}

fn parcels() -> TableCatalogEntry {
    TableCatalogEntry::new("public", "parcels")
        .with_comment("publish=true")
        .with_column(geom(4326, "POLYGON"))
        .with_column(ColumnCatalogEntry::new("internal_id", "int4").with_comment("publish=false"))
        .with_column(ColumnCatalogEntry::new("owner", "text"))
}

fn temp_scratch() -> TableCatalogEntry {
    TableCatalogEntry::new("public", "temp_scratch")
        .with_column(geom(4326, "POINT"))
        .with_column(ColumnCatalogEntry::new("note", "text"))
}

fn dual_geom() -> TableCatalogEntry {
    TableCatalogEntry::new("public", "dual_geom")
        .with_comment("publish=true")
        .with_column(geom(4326, "POINT"))
        .with_column(ColumnCatalogEntry::new("geom_3857", "geometry").with_geometry(3857, "POINT"))
}

const XYZ: [(&str, &str); 3] = [("z", "integer"), ("x", "integer"), ("y", "integer")];

fn tile_query() -> FunctionCatalogEntry {
    FunctionCatalogEntry::new(
        "public",
        "tile_query",
        &[XYZ[0], XYZ[1], XYZ[2], ("query_params", "json")],
    )
}

fn tile_query_xyz() -> FunctionCatalogEntry {
    FunctionCatalogEntry::new("public", "tile_query", &XYZ)
}

fn public_catalog() -> MemoryCatalog {
    MemoryCatalog::default()
        .with_table(roads("public"))
        .with_table(parcels())
        .with_table(temp_scratch())
        .with_table(dual_geom())
        .with_function(tile_query())
        .with_function(FunctionCatalogEntry::new("public", "area_of", &[("geom", "geometry")]))
        .with_extent("public.roads", Bounds::from_corners(10.0, 50.0, 11.0, 51.0).unwrap())
}

fn options(schemas: &[&str]) -> GenerateOptions {
    GenerateOptions {
        schemas: SchemaSelection::from_args(schemas),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_marked_table_is_included_with_unmarked_columns() {
    let report = Orchestrator::new(public_catalog(), options(&["public"]))
        .run()
        .await
        .unwrap();

    let roads = report.configuration.table_source("public.roads").unwrap();
    assert_eq!(roads.geometry.column, "geom");
    assert_eq!(roads.geometry.srid, 3857);
    assert_eq!(roads.geometry.properties.names().collect::<Vec<_>>(), vec!["name"]);
    assert!(roads.geometry.extent.is_known());
}

#[tokio::test]
async fn test_column_marked_false_is_dropped() {
    let report = Orchestrator::new(public_catalog(), options(&["public"]))
        .run()
        .await
        .unwrap();

    let parcels = report.configuration.table_source("public.parcels").unwrap();
    assert!(!parcels.geometry.properties.contains("internal_id"));
    assert!(parcels.geometry.properties.contains("owner"));
}

#[tokio::test]
async fn test_unmarked_table_is_excluded() {
    let report = Orchestrator::new(public_catalog(), options(&["public"]))
        .run()
        .await
        .unwrap();

    assert!(report.configuration.table_source("public.temp_scratch").is_none());
    assert_eq!(
        report.excluded("public.temp_scratch"),
        Some(&ExclusionReason::Unmarked)
    );
}

#[tokio::test]
async fn test_two_geometry_columns_are_excluded() {
    let report = Orchestrator::new(public_catalog(), options(&["public"]))
        .run()
        .await
        .unwrap();

    assert!(report.configuration.table_source("public.dual_geom").is_none());
    assert!(matches!(
        report.excluded("public.dual_geom"),
        Some(ExclusionReason::AmbiguousGeometryColumn { .. })
    ));
}

#[tokio::test]
async fn test_tile_function_is_included_without_comment() {
    let report = Orchestrator::new(public_catalog(), options(&["public"]))
        .run()
        .await
        .unwrap();

    let functions = report.configuration.function_sources();
    assert_eq!(functions.len(), 1);
    assert_eq!(functions[0].id, "public.tile_query");
}

#[tokio::test]
async fn test_same_table_name_in_two_schemas() {
    let catalog = MemoryCatalog::default()
        .with_table(
            TableCatalogEntry::new("east", "points")
                .with_comment("publish=true")
                .with_column(geom(4326, "POINT")),
        )
        .with_table(
            TableCatalogEntry::new("west", "points")
                .with_comment("publish=true")
                .with_column(geom(4326, "POINT")),
        );

    let report = Orchestrator::new(catalog, options(&["all"])).run().await.unwrap();

    let ids: Vec<&str> = report
        .configuration
        .table_sources()
        .iter()
        .map(|t| t.id.as_str())
        .collect();
    assert_eq!(ids, vec!["east.points", "west.points"]);
}

#[tokio::test]
async fn test_output_is_byte_identical_across_runs() {
    let catalog = public_catalog().with_table(roads("admin"));
    let first = Orchestrator::new(catalog.clone(), options(&["all"]))
        .run()
        .await
        .unwrap();
    let second = Orchestrator::new(catalog, options(&["admin", "public"]))
        .run()
        .await
        .unwrap();

    let a = first.configuration.render(OutputFormat::Yaml).unwrap();
    let b = second.configuration.render(OutputFormat::Yaml).unwrap();
    assert_eq!(a, b);

    let admin = a.find("admin.roads").unwrap();
    let public = a.find("public.roads").unwrap();
    assert!(admin < public);
}

#[tokio::test]
async fn test_failing_schema_is_skipped_in_multi_schema_mode() {
    let catalog = public_catalog().with_table(roads("admin")).broken("admin");
    let report = Orchestrator::new(catalog, options(&["all"])).run().await.unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.failed_schemas.len(), 1);
    assert_eq!(report.failed_schemas[0].schema, "admin");
    assert!(report.configuration.table_source("public.roads").is_some());
    assert!(report.configuration.table_source("admin.roads").is_none());
}

#[tokio::test]
async fn test_failing_schema_is_fatal_in_single_schema_mode() {
    let catalog = public_catalog().broken("public");
    let err = Orchestrator::new(catalog, options(&["public"]))
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DataAccess { ref schema, .. } if schema == "public"));
}

#[tokio::test]
async fn test_all_schemas_failing_is_an_error() {
    let catalog = public_catalog()
        .with_table(roads("admin"))
        .broken("admin")
        .broken("public");
    let err = Orchestrator::new(catalog, options(&["all"])).run().await.unwrap_err();
    match err {
        Error::AllSchemasFailed(schemas) => assert_eq!(schemas, vec!["admin", "public"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_missing_schema_is_skipped_by_default() {
    let report = Orchestrator::new(public_catalog(), options(&["public", "nowhere"]))
        .run()
        .await
        .unwrap();
    assert_eq!(report.missing_schemas, vec!["nowhere"]);
    assert!(report.configuration.table_source("public.roads").is_some());
}

#[tokio::test]
async fn test_missing_schema_can_be_fatal() {
    let opts = GenerateOptions {
        missing_schema: MissingSchemaPolicy::Fail,
        ..options(&["public", "nowhere"])
    };
    let err = Orchestrator::new(public_catalog(), opts).run().await.unwrap_err();
    assert!(matches!(err, Error::SchemaNotFound(ref s) if s == "nowhere"));
}

#[tokio::test]
async fn test_all_skips_system_schemas() {
    let report = Orchestrator::new(public_catalog(), options(&[]))
        .run()
        .await
        .unwrap();
    assert!(report.failed_schemas.is_empty());
    assert!(
        report
            .configuration
            .table_sources()
            .iter()
            .all(|t| t.schema == "public")
    );
}

#[tokio::test]
async fn test_column_prefix_filters_properties() {
    let opts = GenerateOptions {
        column_prefix: Some("own".to_string()),
        ..options(&["public"])
    };
    let report = Orchestrator::new(public_catalog(), opts).run().await.unwrap();

    let parcels = report.configuration.table_source("public.parcels").unwrap();
    assert_eq!(parcels.geometry.properties.names().collect::<Vec<_>>(), vec!["owner"]);
    let roads = report.configuration.table_source("public.roads").unwrap();
    assert!(roads.geometry.properties.is_empty());
}

#[tokio::test]
async fn test_unknown_extent_renders_world_bounds() {
    let mut catalog = public_catalog();
    catalog.broken_extents.insert("public.roads".to_string());
    let report = Orchestrator::new(catalog, options(&["public"])).run().await.unwrap();

    assert_eq!(report.unknown_extents, vec!["public.parcels", "public.roads"]);
    let roads = report.configuration.table_source("public.roads").unwrap();
    assert_eq!(roads.geometry.extent.bounds(), Bounds::WORLD);
}

#[tokio::test]
async fn test_database_user_filters_inaccessible_objects() {
    let catalog = public_catalog()
        .with_table(roads("admin"))
        .grant("USAGE public")
        .grant("SELECT public.roads")
        .grant("EXECUTE public.tile_query(integer, integer, integer, json)");
    let opts = GenerateOptions {
        database_user: Some("viewer".to_string()),
        ..options(&["all"])
    };
    let report = Orchestrator::new(catalog, opts).run().await.unwrap();

    let ids: Vec<&str> = report
        .configuration
        .table_sources()
        .iter()
        .map(|t| t.id.as_str())
        .collect();
    assert_eq!(ids, vec!["public.roads"]);
    assert_eq!(report.configuration.function_sources().len(), 1);
    assert_eq!(
        report.excluded("admin"),
        Some(&ExclusionReason::NotAccessible {
            privilege: "USAGE".to_string()
        })
    );
    assert_eq!(
        report.excluded("public.parcels"),
        Some(&ExclusionReason::NotAccessible {
            privilege: "SELECT".to_string()
        })
    );
    // comment policy still applies before privileges
    assert_eq!(
        report.excluded("public.temp_scratch"),
        Some(&ExclusionReason::Unmarked)
    );
}

#[tokio::test]
async fn test_function_sources_can_be_skipped() {
    let opts = GenerateOptions {
        include_functions: false,
        ..options(&["public"])
    };
    let report = Orchestrator::new(public_catalog(), opts).run().await.unwrap();
    assert!(report.configuration.function_sources().is_empty());

    let yaml = report.configuration.render(OutputFormat::Yaml).unwrap();
    assert!(!yaml.contains("function_sources"));
}

#[tokio::test]
async fn test_general_section_can_be_skipped() {
    let opts = GenerateOptions {
        include_general: false,
        ..options(&["public"])
    };
    let report = Orchestrator::new(public_catalog(), opts).run().await.unwrap();
    assert!(report.configuration.general().is_none());

    let yaml = report.configuration.render(OutputFormat::Yaml).unwrap();
    assert!(!yaml.contains("listen_addresses"));
    assert!(yaml.contains("table_sources"));
}

#[tokio::test]
async fn test_malformed_marker_is_reported() {
    let catalog = MemoryCatalog::default().with_schema("public").with_table(
        TableCatalogEntry::new("public", "odd")
            .with_comment("publish=maybe")
            .with_column(geom(4326, "POINT")),
    );
    let report = Orchestrator::new(catalog, options(&["public"])).run().await.unwrap();

    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].object, "public.odd");
    assert_eq!(report.excluded("public.odd"), Some(&ExclusionReason::Unmarked));
}

#[tokio::test]
async fn test_overloaded_tile_function_yields_one_source() {
    let catalog = public_catalog().with_function(tile_query_xyz());
    let report = Orchestrator::new(catalog, options(&["public"])).run().await.unwrap();

    let functions = report.configuration.function_sources();
    assert_eq!(functions.len(), 1);
    assert_eq!(functions[0].id, "public.tile_query");
    assert_eq!(
        report.excluded("public.tile_query(integer, integer, integer)"),
        Some(&ExclusionReason::ShadowedOverload {
            kept: "public.tile_query(integer, integer, integer, json)".to_string()
        })
    );
}

#[tokio::test]
async fn test_overloads_are_resolved_after_privilege_checks() {
    let catalog = public_catalog()
        .with_function(tile_query_xyz())
        .grant("USAGE public")
        .grant("EXECUTE public.tile_query(integer, integer, integer)");
    let opts = GenerateOptions {
        database_user: Some("viewer".to_string()),
        ..options(&["public"])
    };
    let report = Orchestrator::new(catalog, opts).run().await.unwrap();

    assert_eq!(report.configuration.function_sources().len(), 1);
    assert_eq!(
        report.excluded("public.tile_query"),
        Some(&ExclusionReason::NotAccessible {
            privilege: "EXECUTE".to_string()
        })
    );
    assert!(
        report
            .exclusions
            .iter()
            .all(|e| !matches!(e.reason, ExclusionReason::ShadowedOverload { .. }))
    );
}

#[tokio::test]
async fn test_function_privilege_check_uses_type_signature() {
    let named = FunctionCatalogEntry {
        signature: "public.tile_query(z integer, x integer, y integer)".to_string(),
        ..tile_query_xyz()
    };
    let catalog = MemoryCatalog::default()
        .with_function(named)
        .grant("USAGE public");
    let opts = GenerateOptions {
        database_user: Some("viewer".to_string()),
        ..options(&["public"])
    };
    let err = Orchestrator::new(catalog, opts).run().await.unwrap_err();
    assert!(matches!(err, Error::DataAccess { ref schema, .. } if schema == "public"));
}

#[tokio::test]
async fn test_in_flight_queries_stay_within_max_concurrency() {
    let mut catalog = MemoryCatalog::default();
    for schema in ["a", "b", "c"] {
        for table in ["t1", "t2", "t3", "t4"] {
            catalog = catalog.with_table(
                TableCatalogEntry::new(schema, table)
                    .with_comment("publish=true")
                    .with_column(geom(4326, "POINT")),
            );
        }
    }
    let load = catalog.load.clone();
    let opts = GenerateOptions {
        max_concurrency: 2,
        ..options(&["all"])
    };
    let report = Orchestrator::new(catalog, opts).run().await.unwrap();

    assert_eq!(report.configuration.table_sources().len(), 12);
    assert!(load.peak() >= 1);
    assert!(load.peak() <= 2, "peak of {} in-flight queries", load.peak());
}
