//! Generation pipeline for martin-config.
//!
//! Reads catalog snapshots through a [`adapter::CatalogReader`], applies the
//! publication policy, builds one source descriptor per published table or
//! function and assembles them into a [`martin_config_core::Configuration`].

pub mod adapter;
pub mod assembler;
pub mod builder;
pub mod orchestrator;
pub mod report;
pub mod upload;

pub use adapter::{CatalogReader, ExtentMode, ExtentRequest, PrivilegeCheck};
pub use assembler::assemble;
pub use orchestrator::{GenerateOptions, MissingSchemaPolicy, Orchestrator, SchemaSelection};
pub use report::{ExclusionRecord, GenerationReport, SchemaFailure};
pub use upload::{ArtifactStore, NoopStore, publish_artifact};
