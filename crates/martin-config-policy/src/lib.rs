//! Publication policy for martin-config.
//!
//! Tables and columns opt in or out of publication through a
//! `publish=<bool>` marker embedded in their catalog comment. This crate
//! parses those markers and turns them into per-table decisions. Everything
//! here is pure: no database access, no I/O.

pub mod marker;
pub mod resolver;

pub use marker::{MarkerWarning, ParsedMarker, parse_marker};
pub use resolver::{
    AcceptedColumns, COLUMN_DEFAULT, DefaultRule, Resolution, TABLE_DEFAULT, TableDecision,
    resolve_table,
};
