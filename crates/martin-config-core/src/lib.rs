//! Shared types for martin-config.
//!
//! Catalog snapshots read from a PostGIS database, the publish directive
//! carried by catalog comments, the source descriptors derived from them, and
//! the final configuration document handed to the martin tile server.

pub mod catalog;
pub mod config;
pub mod error;
pub mod publish;
pub mod source;

pub use catalog::{
    ColumnCatalogEntry, FunctionCatalogEntry, GeometryColumnEntry, SYSTEM_SCHEMAS,
    TableCatalogEntry, is_system_schema,
};
pub use config::{Configuration, GeneralConfig, OutputFormat, UpstreamConfig};
pub use error::{Error, Result};
pub use publish::{ExclusionReason, PublishDirective};
pub use source::{
    Bounds, Extent, FunctionSource, GeometryMetadata, PropertyMap, SourceDescriptor, SourceId,
    SourceKind, TableSource, TileSettings,
};
