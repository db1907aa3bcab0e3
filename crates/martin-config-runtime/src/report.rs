use martin_config_core::{Configuration, ExclusionReason, SourceKind};
use martin_config_policy::MarkerWarning;

/// An object left out of the configuration, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionRecord {
    /// `schema.name`, or just the schema name for schema-level exclusions.
    pub object: String,
    pub kind: Option<SourceKind>,
    pub reason: ExclusionReason,
}

/// A schema whose catalog could not be read in multi-schema mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaFailure {
    pub schema: String,
    pub error: String,
}

/// Everything a run produced: the configuration plus what was left out.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub configuration: Configuration,
    pub exclusions: Vec<ExclusionRecord>,
    pub warnings: Vec<MarkerWarning>,
    pub failed_schemas: Vec<SchemaFailure>,
    /// Requested schemas that do not exist (skip policy only).
    pub missing_schemas: Vec<String>,
    /// Table sources rendered with world bounds.
    pub unknown_extents: Vec<String>,
}

impl GenerationReport {
    /// Whether every requested schema was read.
    pub fn is_complete(&self) -> bool {
        self.failed_schemas.is_empty() && self.missing_schemas.is_empty()
    }

    pub fn excluded(&self, object: &str) -> Option<&ExclusionReason> {
        self.exclusions
            .iter()
            .find(|e| e.object == object)
            .map(|e| &e.reason)
    }

    /// Log every exclusion with its reason, then a one-line summary.
    pub fn log_summary(&self) {
        for exclusion in &self.exclusions {
            tracing::info!(
                object = %exclusion.object,
                reason = %exclusion.reason,
                "excluded"
            );
        }
        for failure in &self.failed_schemas {
            tracing::error!(schema = %failure.schema, error = %failure.error, "schema skipped after failure");
        }

        tracing::info!(
            tables = self.configuration.table_sources().len(),
            functions = self.configuration.function_sources().len(),
            excluded = self.exclusions.len(),
            warnings = self.warnings.len(),
            unknown_extents = self.unknown_extents.len(),
            failed_schemas = self.failed_schemas.len(),
            missing_schemas = self.missing_schemas.len(),
            "configuration generated"
        );
    }
}
