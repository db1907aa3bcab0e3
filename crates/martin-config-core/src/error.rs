//! Error types for martin-config.
//!
//! Only connection-level failures and invariant violations are errors.
//! Per-object conditions (unmarked tables, ambiguous geometry, malformed
//! markers) are reported as [`crate::ExclusionReason`] values instead.

use crate::source::SourceId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A catalog query or the connection failed.
    #[error("data access failed for schema '{schema}': {source}")]
    DataAccess {
        schema: String,
        #[source]
        source: anyhow::Error,
    },

    /// A requested schema is not present in the database.
    #[error("schema '{0}' does not exist")]
    SchemaNotFound(String),

    /// Every requested schema failed in multi-schema mode.
    #[error("all requested schemas failed: {}", .0.join(", "))]
    AllSchemasFailed(Vec<String>),

    /// Two descriptors share an identity. Indicates a defect upstream of assembly.
    #[error("internal consistency error: duplicate source identity {0}")]
    DuplicateIdentity(SourceId),

    /// Two distinct sources render under the same `schema.name` key, e.g.
    /// schema `a.b` table `c` and schema `a` table `b.c`.
    #[error("sources {first} and {second} both render as key '{key}'")]
    KeyCollision {
        key: String,
        first: SourceId,
        second: SourceId,
    },

    /// The artifact could not be stored remotely.
    #[error("upload failed: {0}")]
    Upload(String),

    /// The configuration could not be rendered.
    #[error("failed to render configuration: {0}")]
    Render(String),
}

impl Error {
    pub fn data_access(schema: impl Into<String>, source: anyhow::Error) -> Self {
        Error::DataAccess {
            schema: schema.into(),
            source,
        }
    }

    /// Whether this error should abort the whole run regardless of mode.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Error::DuplicateIdentity(_))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Render(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Render(e.to_string())
    }
}
