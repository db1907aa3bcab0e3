//! The martin configuration document.
//!
//! A [`Configuration`] is the final artifact of a run: an optional general
//! (server) section followed by the table and function source maps. It is
//! built once by the assembler and only read afterwards.

pub mod general;
pub mod upstream;

use crate::error::Result;
use crate::source::{FunctionSource, TableSource};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::str::FromStr;

pub use general::GeneralConfig;
pub use upstream::{ConnectionPoolConfig, UpstreamConfig};

/// Complete configuration document for the martin tile server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Configuration {
    #[serde(flatten)]
    general: Option<GeneralConfig>,

    #[serde(skip_serializing_if = "Vec::is_empty", serialize_with = "serialize_keyed")]
    table_sources: Vec<TableSource>,

    #[serde(skip_serializing_if = "Vec::is_empty", serialize_with = "serialize_keyed")]
    function_sources: Vec<FunctionSource>,
}

impl Configuration {
    /// Build a configuration from already ordered, identity-unique sources.
    ///
    /// The runtime assembler is the intended caller; it establishes both
    /// properties before calling this.
    pub fn new(
        general: Option<GeneralConfig>,
        table_sources: Vec<TableSource>,
        function_sources: Vec<FunctionSource>,
    ) -> Self {
        Self {
            general,
            table_sources,
            function_sources,
        }
    }

    pub fn general(&self) -> Option<&GeneralConfig> {
        self.general.as_ref()
    }

    pub fn table_sources(&self) -> &[TableSource] {
        &self.table_sources
    }

    pub fn function_sources(&self) -> &[FunctionSource] {
        &self.function_sources
    }

    pub fn table_source(&self, id: &str) -> Option<&TableSource> {
        self.table_sources.iter().find(|t| t.id == id)
    }

    pub fn function_source(&self, id: &str) -> Option<&FunctionSource> {
        self.function_sources.iter().find(|f| f.id == id)
    }

    pub fn source_count(&self) -> usize {
        self.table_sources.len() + self.function_sources.len()
    }

    /// Render the document in the requested format.
    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Yaml => Ok(serde_yaml::to_string(self)?),
            OutputFormat::Json => {
                let mut out = serde_json::to_string_pretty(self)?;
                out.push('\n');
                Ok(out)
            }
        }
    }
}

/// Sources are keyed by their id in the rendered maps.
trait KeyedSource: Serialize {
    fn key(&self) -> &str;
}

impl KeyedSource for TableSource {
    fn key(&self) -> &str {
        &self.id
    }
}

impl KeyedSource for FunctionSource {
    fn key(&self) -> &str {
        &self.id
    }
}

fn serialize_keyed<T: KeyedSource, S: Serializer>(
    sources: &Vec<T>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(sources.len()))?;
    for source in sources {
        map.serialize_entry(source.key(), source)?;
    }
    map.end()
}

/// Rendering format of the configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Yaml,
    /// JSON is a YAML subset and is accepted by martin as well.
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}
