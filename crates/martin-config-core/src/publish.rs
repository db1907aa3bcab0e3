//! Publish directives and exclusion reasons.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of reading a `publish=<bool>` marker from a catalog comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PublishDirective {
    /// No usable marker in the comment.
    #[default]
    Unmarked,
    /// An explicit `publish=true` or `publish=false`.
    Marked(bool),
}

impl PublishDirective {
    pub fn is_marked(&self) -> bool {
        matches!(self, PublishDirective::Marked(_))
    }
}

/// Why a catalog object did not make it into the configuration.
///
/// These are per-object outcomes, never run failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum ExclusionReason {
    /// Table has no comment or no `publish=` marker.
    Unmarked,
    /// Table carries an explicit `publish=false`.
    MarkedFalse,
    /// No eligible geometry column.
    NoGeometryColumn,
    /// More than one eligible geometry column.
    AmbiguousGeometryColumn { columns: Vec<String> },
    /// The geometry column has no usable SRID.
    InvalidSrid { column: String, srid: i32 },
    /// The configured database user lacks the required privilege.
    NotAccessible { privilege: String },
    /// Another overload of the same function is published instead.
    ShadowedOverload { kept: String },
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::Unmarked => write!(f, "unmarked"),
            ExclusionReason::MarkedFalse => write!(f, "marked publish=false"),
            ExclusionReason::NoGeometryColumn => write!(f, "no geometry column"),
            ExclusionReason::AmbiguousGeometryColumn { columns } => {
                write!(f, "ambiguous geometry column ({})", columns.join(", "))
            }
            ExclusionReason::InvalidSrid { column, srid } => {
                write!(f, "invalid srid {} on geometry column '{}'", srid, column)
            }
            ExclusionReason::NotAccessible { privilege } => {
                write!(f, "not accessible (missing {} privilege)", privilege)
            }
            ExclusionReason::ShadowedOverload { kept } => {
                write!(f, "overload shadowed by {}", kept)
            }
        }
    }
}
