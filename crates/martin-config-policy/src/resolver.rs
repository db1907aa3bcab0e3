//! Table and column publication decisions.
//!
//! Tables are default-deny: only an explicit `publish=true` includes them.
//! Columns of an included table are default-allow: only an explicit
//! `publish=false` rejects them. The two defaults are named constants so the
//! asymmetry is visible and tested on its own.

use crate::marker::{MarkerWarning, parse_marker};
use martin_config_core::{ExclusionReason, PublishDirective, TableCatalogEntry};

/// What an unmarked object resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultRule {
    Allow,
    Deny,
}

impl DefaultRule {
    /// Whether an object with `directive` is published under this default.
    pub fn allows(self, directive: PublishDirective) -> bool {
        match directive {
            PublishDirective::Marked(value) => value,
            PublishDirective::Unmarked => self == DefaultRule::Allow,
        }
    }
}

/// Tables without a marker are not published.
pub const TABLE_DEFAULT: DefaultRule = DefaultRule::Deny;

/// Columns without a marker are published when their table is.
pub const COLUMN_DEFAULT: DefaultRule = DefaultRule::Allow;

/// Column names accepted for publication, in catalog ordinal order.
///
/// Geometry columns are included here too; the descriptor builder separates
/// the geometry column from the property columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptedColumns(Vec<String>);

impl AcceptedColumns {
    pub fn contains(&self, column: &str) -> bool {
        self.0.iter().any(|c| c == column)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|c| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableDecision {
    Included(AcceptedColumns),
    Excluded(ExclusionReason),
}

impl TableDecision {
    pub fn is_included(&self) -> bool {
        matches!(self, TableDecision::Included(_))
    }
}

/// Decision for one table plus any malformed markers met along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub decision: TableDecision,
    pub warnings: Vec<MarkerWarning>,
}

/// Decide whether `table` is published and which of its columns are.
///
/// Depends only on the catalog snapshot, so repeated calls on the same
/// entry give the same result.
pub fn resolve_table(table: &TableCatalogEntry) -> Resolution {
    let mut warnings = Vec::new();
    let qualified = table.qualified_name();

    let parsed = parse_marker(table.comment.as_deref());
    if let Some(value) = parsed.malformed_value {
        warnings.push(MarkerWarning {
            object: qualified.clone(),
            value,
        });
    }

    if !TABLE_DEFAULT.allows(parsed.directive) {
        let reason = match parsed.directive {
            PublishDirective::Marked(false) => ExclusionReason::MarkedFalse,
            _ => ExclusionReason::Unmarked,
        };
        tracing::debug!(table = %qualified, %reason, "table not published");
        return Resolution {
            decision: TableDecision::Excluded(reason),
            warnings,
        };
    }

    let mut accepted = Vec::with_capacity(table.columns.len());
    for column in &table.columns {
        let parsed = parse_marker(column.comment.as_deref());
        if let Some(value) = parsed.malformed_value {
            warnings.push(MarkerWarning {
                object: format!("{}.{}", qualified, column.name),
                value,
            });
        }

        if COLUMN_DEFAULT.allows(parsed.directive) {
            accepted.push(column.name.clone());
        } else {
            tracing::debug!(table = %qualified, column = %column.name, "column not published");
        }
    }

    Resolution {
        decision: TableDecision::Included(AcceptedColumns(accepted)),
        warnings,
    }
}
