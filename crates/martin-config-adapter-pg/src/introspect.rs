//! Catalog queries against `pg_catalog` and the PostGIS `geometry_columns` view.
//!
//! Every query maps its rows into the typed catalog records straight away.

use anyhow::Context;
use martin_config_core::{
    Bounds, ColumnCatalogEntry, FunctionCatalogEntry, GeometryColumnEntry, TableCatalogEntry,
    catalog::matches_tile_signature,
};
use martin_config_runtime::{ExtentMode, ExtentRequest, PrivilegeCheck};
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;

/// Relation kinds scanned as table sources: tables, views, materialized views
/// and partitioned tables.
const RELKINDS: &str = "('r', 'v', 'm', 'p')";

pub async fn list_schemas(pool: &PgPool) -> anyhow::Result<Vec<String>> {
    let rows = sqlx::query(
        r#"
        select nspname::text as schema_name
        from pg_namespace
        order by nspname
        "#,
    )
    .fetch_all(pool)
    .await
    .context("listing schemas")?;

    Ok(rows
        .into_iter()
        .map(|r| r.get::<String, _>("schema_name"))
        .collect())
}

/// Tables of `schema` with comments and columns, ordered by table name and
/// column ordinal.
pub async fn list_tables(pool: &PgPool, schema: &str) -> anyhow::Result<Vec<TableCatalogEntry>> {
    let table_rows = sqlx::query(&format!(
        r#"
        select c.relname::text as table_name,
               obj_description(c.oid, 'pg_class') as comment
        from pg_class c
        join pg_namespace n on n.oid = c.relnamespace
        where n.nspname = $1
          and c.relkind in {RELKINDS}
        order by c.relname
        "#
    ))
    .bind(schema)
    .fetch_all(pool)
    .await
    .with_context(|| format!("listing tables of schema '{}'", schema))?;

    let mut tables: BTreeMap<String, TableCatalogEntry> = BTreeMap::new();
    for row in table_rows {
        let name: String = row.get("table_name");
        let comment: Option<String> = row.get("comment");
        let mut table = TableCatalogEntry::new(schema, name.clone());
        table.comment = comment;
        tables.insert(name, table);
    }

    let column_rows = sqlx::query(&format!(
        r#"
        select c.relname::text as table_name,
               a.attname::text as column_name,
               format_type(a.atttypid, a.atttypmod) as data_type,
               t.typname::text as type_name,
               col_description(c.oid, a.attnum) as comment,
               gc.srid as srid,
               gc.type::text as geometry_type
        from pg_attribute a
        join pg_class c on c.oid = a.attrelid
        join pg_namespace n on n.oid = c.relnamespace
        join pg_type t on t.oid = a.atttypid
        left join geometry_columns gc
          on gc.f_table_schema = n.nspname
         and gc.f_table_name = c.relname
         and gc.f_geometry_column = a.attname
        where n.nspname = $1
          and c.relkind in {RELKINDS}
          and a.attnum > 0
          and not a.attisdropped
        order by c.relname, a.attnum
        "#
    ))
    .bind(schema)
    .fetch_all(pool)
    .await
    .with_context(|| format!("listing columns of schema '{}'", schema))?;

    for row in column_rows {
        let table_name: String = row.get("table_name");
        let Some(table) = tables.get_mut(&table_name) else {
            continue;
        };

        let srid: Option<i32> = row.get("srid");
        let geometry_type: Option<String> = row.get("geometry_type");
        table.columns.push(ColumnCatalogEntry {
            name: row.get("column_name"),
            data_type: row.get("data_type"),
            type_name: row.get("type_name"),
            comment: row.get("comment"),
            geometry: srid.map(|srid| GeometryColumnEntry {
                srid,
                geometry_type: geometry_type.unwrap_or_else(|| "GEOMETRY".to_string()),
            }),
        });
    }

    Ok(tables.into_values().collect())
}

/// Functions of `schema` returning `bytea` whose input parameters follow the
/// tile-function convention. Every overload is returned.
///
/// The signature lists argument types only (`oidvectortypes`), which is the
/// form `has_function_privilege` and `regprocedure` accept.
pub async fn list_functions(
    pool: &PgPool,
    schema: &str,
) -> anyhow::Result<Vec<FunctionCatalogEntry>> {
    let rows = sqlx::query(
        r#"
        select p.proname::text as function_name,
               coalesce(p.proargnames[1:p.pronargs], '{}'::text[]) as parameters,
               quote_ident(n.nspname) || '.' || quote_ident(p.proname)
                 || '(' || oidvectortypes(p.proargtypes) || ')' as signature
        from pg_proc p
        join pg_namespace n on n.oid = p.pronamespace
        where n.nspname = $1
          and p.prokind = 'f'
          and p.prorettype = 'bytea'::regtype
        order by p.proname, signature
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await
    .with_context(|| format!("listing functions of schema '{}'", schema))?;

    let mut functions = Vec::new();
    for row in rows {
        let name: String = row.get("function_name");
        let parameters: Vec<String> = row.get("parameters");
        if !matches_tile_signature(&parameters) {
            tracing::debug!(schema, function = %name, ?parameters, "skipping non-tile function");
            continue;
        }
        functions.push(FunctionCatalogEntry {
            schema: schema.to_string(),
            name,
            parameters,
            signature: row.get("signature"),
        });
    }
    Ok(functions)
}

/// SQL computing the WGS84 extent of a geometry column.
///
/// Estimated mode binds schema, table and column as `$1..$3` and the srid as
/// `$4`. Exact mode scans the table, so identifiers are quoted inline and
/// only the srid is bound, as `$1`.
pub fn extent_sql(request: &ExtentRequest<'_>) -> anyhow::Result<String> {
    let source = match request.mode {
        ExtentMode::Estimated => {
            "select ST_Transform(ST_SetSRID(ST_EstimatedExtent($1, $2, $3)::geometry, $4), 4326) as extent"
                .to_string()
        }
        ExtentMode::Exact => format!(
            "select ST_Transform(ST_SetSRID(ST_Extent({})::geometry, $1), 4326) as extent from {}.{}",
            quote_ident(request.column)?,
            quote_ident(request.schema)?,
            quote_ident(request.table)?
        ),
    };

    Ok(format!(
        "with bbox as ({source}) \
         select ST_XMin(extent) as xmin, ST_YMin(extent) as ymin, \
         ST_XMax(extent) as xmax, ST_YMax(extent) as ymax from bbox"
    ))
}

pub async fn fetch_extent(
    pool: &PgPool,
    request: &ExtentRequest<'_>,
) -> anyhow::Result<Option<Bounds>> {
    let sql = extent_sql(request)?;
    let query = match request.mode {
        ExtentMode::Estimated => sqlx::query(&sql)
            .bind(request.schema)
            .bind(request.table)
            .bind(request.column)
            .bind(request.srid),
        ExtentMode::Exact => sqlx::query(&sql).bind(request.srid),
    };

    let row = query.fetch_optional(pool).await.with_context(|| {
        format!(
            "computing extent of {}.{}.{}",
            request.schema, request.table, request.column
        )
    })?;

    let Some(row) = row else {
        return Ok(None);
    };
    let corners: (Option<f64>, Option<f64>, Option<f64>, Option<f64>) = (
        row.get("xmin"),
        row.get("ymin"),
        row.get("xmax"),
        row.get("ymax"),
    );
    Ok(match corners {
        (Some(x1), Some(y1), Some(x2), Some(y2)) => Bounds::from_corners(x1, y1, x2, y2),
        _ => None,
    })
}

pub async fn has_privilege(
    pool: &PgPool,
    user: &str,
    check: &PrivilegeCheck,
) -> anyhow::Result<bool> {
    let (sql, object) = match check {
        PrivilegeCheck::SchemaUsage { schema } => (
            "select has_schema_privilege($1, $2, 'USAGE') as allowed",
            schema.clone(),
        ),
        PrivilegeCheck::TableSelect { schema, table } => (
            "select has_table_privilege($1, $2, 'SELECT') as allowed",
            format!("{}.{}", quote_ident(schema)?, quote_ident(table)?),
        ),
        PrivilegeCheck::FunctionExecute { signature } => (
            "select has_function_privilege($1, $2, 'EXECUTE') as allowed",
            signature.clone(),
        ),
    };

    let row = sqlx::query(sql)
        .bind(user)
        .bind(&object)
        .fetch_one(pool)
        .await
        .with_context(|| {
            format!(
                "checking {} privilege of '{}' on {}",
                check.privilege(),
                user,
                object
            )
        })?;
    Ok(row.get("allowed"))
}

/// Quote an identifier for inline use in SQL.
pub fn quote_ident(ident: &str) -> anyhow::Result<String> {
    if ident.is_empty() {
        return Err(anyhow::anyhow!("empty identifier"));
    }
    if ident.contains('\0') {
        return Err(anyhow::anyhow!("invalid identifier '{}'", ident.escape_default()));
    }
    Ok(format!("\"{}\"", ident.replace('"', "\"\"")))
}
