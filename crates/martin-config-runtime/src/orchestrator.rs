//! The discovery, decision and assembly pass.
//!
//! Each schema is scanned as an independent unit of async work, and within a
//! schema each table's privilege and extent queries run concurrently. One
//! `max_concurrency` budget is split between the two levels (see
//! [`concurrency_budget`]), so the number of in-flight catalog queries never
//! exceeds it. Assembly only starts once every unit has finished, so the
//! final ordering never depends on query completion order.
//!
//! Failure policy: in multi-schema mode (several schemas, or all of them) a
//! schema whose catalog cannot be read is logged and reported, and the other
//! schemas still produce sources. The run fails only if every schema failed.
//! In single-schema mode the failure is fatal.

use crate::adapter::{CatalogReader, ExtentMode, PrivilegeCheck};
use crate::assembler::assemble;
use crate::builder::{BuildOptions, TableOutcome, build_function_source, build_table_source};
use crate::report::{ExclusionRecord, GenerationReport, SchemaFailure};
use futures::stream::{self, StreamExt};
use martin_config_core::{
    Error, ExclusionReason, FunctionCatalogEntry, GeneralConfig, Result, SourceDescriptor,
    SourceKind, TableCatalogEntry, is_system_schema,
};
use martin_config_policy::{MarkerWarning, TableDecision, resolve_table};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Which schemas to scan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SchemaSelection {
    /// Every non-system schema.
    #[default]
    All,
    /// Exactly these schemas. System schemas are allowed when named.
    Named(Vec<String>),
}

impl SchemaSelection {
    /// Build a selection from CLI-style values. Empty input or a literal
    /// `all` selects every schema.
    pub fn from_args<S: AsRef<str>>(values: &[S]) -> Self {
        let names: Vec<String> = values
            .iter()
            .flat_map(|v| v.as_ref().split(','))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
            .collect();

        if names.is_empty() || names.iter().any(|n| n.eq_ignore_ascii_case("all")) {
            SchemaSelection::All
        } else {
            SchemaSelection::Named(names)
        }
    }
}

/// What to do with a requested schema that does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingSchemaPolicy {
    /// Log a warning, report it, and carry on.
    #[default]
    Skip,
    /// Abort the run with [`Error::SchemaNotFound`].
    Fail,
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub schemas: SchemaSelection,
    pub include_functions: bool,
    /// Emit the general section; `general` supplies its values.
    pub include_general: bool,
    pub general: GeneralConfig,
    pub column_prefix: Option<String>,
    pub extent_mode: ExtentMode,
    pub missing_schema: MissingSchemaPolicy,
    /// When set, objects this user cannot access are excluded.
    pub database_user: Option<String>,
    /// Upper bound on catalog queries in flight across the whole run.
    pub max_concurrency: usize,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            schemas: SchemaSelection::All,
            include_functions: true,
            include_general: true,
            general: GeneralConfig::default(),
            column_prefix: None,
            extent_mode: ExtentMode::Estimated,
            missing_schema: MissingSchemaPolicy::Skip,
            database_user: None,
            max_concurrency: 5,
        }
    }
}

/// Split `max` concurrent slots into `(schemas, tables per schema)` so that
/// their product never exceeds `max`. Schemas get as many slots as there are
/// targets; each schema's tables share what is left.
pub fn concurrency_budget(schemas: usize, max: usize) -> (usize, usize) {
    let max = max.max(1);
    let per_run = schemas.clamp(1, max);
    (per_run, (max / per_run).max(1))
}

/// Keep one overload per function name: the one with the most parameters,
/// which is the form taking `query_params` when both exist. Ties go to the
/// lowest signature. Returns the kept entries and `(shadowed, kept)` pairs.
fn select_overloads(
    functions: Vec<FunctionCatalogEntry>,
) -> (Vec<FunctionCatalogEntry>, Vec<(FunctionCatalogEntry, String)>) {
    let mut by_name: BTreeMap<String, Vec<FunctionCatalogEntry>> = BTreeMap::new();
    for function in functions {
        by_name.entry(function.name.clone()).or_default().push(function);
    }

    let mut kept = Vec::new();
    let mut shadowed = Vec::new();
    for (_, mut overloads) in by_name {
        overloads.sort_by(|a, b| {
            b.parameters
                .len()
                .cmp(&a.parameters.len())
                .then_with(|| a.signature.cmp(&b.signature))
        });
        let mut overloads = overloads.into_iter();
        let Some(winner) = overloads.next() else {
            continue;
        };
        for other in overloads {
            shadowed.push((other, winner.signature.clone()));
        }
        kept.push(winner);
    }
    (kept, shadowed)
}

/// Sources and exclusions found in one schema.
#[derive(Debug, Default)]
struct SchemaScan {
    sources: Vec<SourceDescriptor>,
    exclusions: Vec<ExclusionRecord>,
    warnings: Vec<MarkerWarning>,
    unknown_extents: Vec<String>,
}

pub struct Orchestrator<R: CatalogReader> {
    reader: R,
    options: GenerateOptions,
}

impl<R: CatalogReader> Orchestrator<R> {
    pub fn new(reader: R, options: GenerateOptions) -> Self {
        Self { reader, options }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    /// Run one full pass and return the assembled configuration with its report.
    pub async fn run(&self) -> Result<GenerationReport> {
        let available: BTreeSet<String> = self
            .reader
            .list_schemas()
            .await
            .map_err(|e| Error::data_access("*", e))?
            .into_iter()
            .collect();

        let (targets, missing, multi_schema) = self.resolve_targets(&available)?;

        match &self.options.schemas {
            SchemaSelection::All => tracing::info!(count = targets.len(), "scanning all schemas"),
            SchemaSelection::Named(_) => {
                tracing::info!(schemas = %targets.join(", "), "scanning schemas")
            }
        }

        let (schema_slots, table_slots) =
            concurrency_budget(targets.len(), self.options.max_concurrency);
        tracing::debug!(schema_slots, table_slots, "concurrency budget");

        let scans: Vec<(String, Result<SchemaScan>)> = stream::iter(targets.iter().cloned())
            .map(|schema| async move {
                let result = self.scan_schema(&schema, table_slots).await;
                (schema, result)
            })
            .buffered(schema_slots)
            .collect()
            .await;

        let mut sources = Vec::new();
        let mut exclusions = Vec::new();
        let mut warnings = Vec::new();
        let mut unknown_extents = Vec::new();
        let mut failed_schemas = Vec::new();

        for (schema, result) in scans {
            match result {
                Ok(scan) => {
                    sources.extend(scan.sources);
                    exclusions.extend(scan.exclusions);
                    warnings.extend(scan.warnings);
                    unknown_extents.extend(scan.unknown_extents);
                }
                Err(e) if multi_schema => {
                    tracing::error!(schema = %schema, error = %e, "failed to scan schema, continuing");
                    failed_schemas.push(SchemaFailure {
                        schema,
                        error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        if !targets.is_empty() && failed_schemas.len() == targets.len() {
            return Err(Error::AllSchemasFailed(
                failed_schemas.into_iter().map(|f| f.schema).collect(),
            ));
        }

        let general = self
            .options
            .include_general
            .then(|| self.options.general.clone());
        let configuration = assemble(general, sources)?;

        exclusions.sort_by(|a, b| a.object.cmp(&b.object).then(a.kind.cmp(&b.kind)));
        unknown_extents.sort();

        Ok(GenerationReport {
            configuration,
            exclusions,
            warnings,
            failed_schemas,
            missing_schemas: missing,
            unknown_extents,
        })
    }

    /// Schemas to scan, requested schemas that do not exist, and whether the
    /// run is in multi-schema mode.
    fn resolve_targets(
        &self,
        available: &BTreeSet<String>,
    ) -> Result<(Vec<String>, Vec<String>, bool)> {
        match &self.options.schemas {
            SchemaSelection::All => {
                let targets = available
                    .iter()
                    .filter(|s| !is_system_schema(s))
                    .cloned()
                    .collect();
                Ok((targets, Vec::new(), true))
            }
            SchemaSelection::Named(names) => {
                let requested: BTreeSet<&String> = names.iter().collect();
                let mut targets = Vec::new();
                let mut missing = Vec::new();
                for name in &requested {
                    if available.contains(*name) {
                        targets.push((*name).clone());
                        continue;
                    }
                    match self.options.missing_schema {
                        MissingSchemaPolicy::Fail => {
                            return Err(Error::SchemaNotFound((*name).clone()));
                        }
                        MissingSchemaPolicy::Skip => {
                            tracing::warn!(
                                schema = %name,
                                available = %available.iter().cloned().collect::<Vec<_>>().join(","),
                                "schema does not exist, skipping"
                            );
                            missing.push((*name).clone());
                        }
                    }
                }
                Ok((targets, missing, requested.len() > 1))
            }
        }
    }

    async fn scan_schema(&self, schema: &str, table_slots: usize) -> Result<SchemaScan> {
        let mut scan = SchemaScan::default();

        if let Some(user) = &self.options.database_user {
            let check = PrivilegeCheck::SchemaUsage {
                schema: schema.to_string(),
            };
            if !self.check_privilege(schema, user, &check).await? {
                tracing::info!(schema, user = %user, "user lacks USAGE on schema");
                scan.exclusions.push(ExclusionRecord {
                    object: schema.to_string(),
                    kind: None,
                    reason: ExclusionReason::NotAccessible {
                        privilege: check.privilege().to_string(),
                    },
                });
                return Ok(scan);
            }
        }

        let tables = self
            .reader
            .list_tables(schema)
            .await
            .map_err(|e| Error::data_access(schema, e))?;
        tracing::debug!(schema, tables = tables.len(), "listed tables");

        let build_options = BuildOptions {
            column_prefix: self.options.column_prefix.clone(),
            extent_mode: self.options.extent_mode,
        };

        let outcomes: Vec<Result<(String, TableOutcome, Vec<MarkerWarning>)>> =
            stream::iter(tables.iter())
                .map(|table| self.scan_table(table, &build_options))
                .buffered(table_slots.max(1))
                .collect()
                .await;

        for outcome in outcomes {
            let (object, outcome, warnings) = outcome?;
            for warning in &warnings {
                tracing::warn!("{}", warning);
            }
            scan.warnings.extend(warnings);
            match outcome {
                TableOutcome::Built(source) => {
                    tracing::info!(table = %object, geometry_column = %source.geometry.column, "table source created");
                    if !source.geometry.extent.is_known() {
                        scan.unknown_extents.push(object);
                    }
                    scan.sources.push(SourceDescriptor::Table(source));
                }
                TableOutcome::Excluded(reason) => {
                    tracing::debug!(table = %object, %reason, "table excluded");
                    scan.exclusions.push(ExclusionRecord {
                        object,
                        kind: Some(SourceKind::Table),
                        reason,
                    });
                }
            }
        }

        if self.options.include_functions {
            self.scan_functions(schema, &mut scan).await?;
        }

        Ok(scan)
    }

    async fn scan_table(
        &self,
        table: &TableCatalogEntry,
        options: &BuildOptions,
    ) -> Result<(String, TableOutcome, Vec<MarkerWarning>)> {
        let object = table.qualified_name();
        let resolution = resolve_table(table);

        let accepted = match resolution.decision {
            TableDecision::Included(accepted) => accepted,
            TableDecision::Excluded(reason) => {
                return Ok((object, TableOutcome::Excluded(reason), resolution.warnings));
            }
        };

        if let Some(user) = &self.options.database_user {
            let check = PrivilegeCheck::TableSelect {
                schema: table.schema.clone(),
                table: table.name.clone(),
            };
            if !self.check_privilege(&table.schema, user, &check).await? {
                let reason = ExclusionReason::NotAccessible {
                    privilege: check.privilege().to_string(),
                };
                return Ok((object, TableOutcome::Excluded(reason), resolution.warnings));
            }
        }

        let outcome = build_table_source(&self.reader, table, &accepted, options).await;
        Ok((object, outcome, resolution.warnings))
    }

    async fn scan_functions(&self, schema: &str, scan: &mut SchemaScan) -> Result<()> {
        let functions = self
            .reader
            .list_functions(schema)
            .await
            .map_err(|e| Error::data_access(schema, e))?;

        if !functions.is_empty() {
            tracing::info!(schema, count = functions.len(), "creating function sources");
        }

        let mut accessible = Vec::with_capacity(functions.len());
        for function in functions {
            if let Some(user) = &self.options.database_user {
                let check = PrivilegeCheck::FunctionExecute {
                    signature: function.signature.clone(),
                };
                if !self.check_privilege(schema, user, &check).await? {
                    tracing::info!(function = %function.qualified_name(), user = %user, "user lacks EXECUTE on function");
                    scan.exclusions.push(ExclusionRecord {
                        object: function.qualified_name(),
                        kind: Some(SourceKind::Function),
                        reason: ExclusionReason::NotAccessible {
                            privilege: check.privilege().to_string(),
                        },
                    });
                    continue;
                }
            }
            accessible.push(function);
        }

        let (kept, shadowed) = select_overloads(accessible);
        for (function, kept_signature) in shadowed {
            tracing::info!(function = %function.signature, kept = %kept_signature, "skipping shadowed overload");
            scan.exclusions.push(ExclusionRecord {
                object: function.signature,
                kind: Some(SourceKind::Function),
                reason: ExclusionReason::ShadowedOverload {
                    kept: kept_signature,
                },
            });
        }
        for function in &kept {
            scan.sources
                .push(SourceDescriptor::Function(build_function_source(function)));
        }

        Ok(())
    }

    async fn check_privilege(&self, schema: &str, user: &str, check: &PrivilegeCheck) -> Result<bool> {
        self.reader
            .has_privilege(user, check)
            .await
            .map_err(|e| Error::data_access(schema, e))
    }
}
