//! Configuration assembly.

use martin_config_core::{
    Configuration, Error, GeneralConfig, Result, SourceDescriptor, SourceId, SourceKind,
};
use std::collections::HashMap;

/// Merge source descriptors and an optional general section into one
/// [`Configuration`].
///
/// Sources are ordered by schema, then kind, then name, whatever order they
/// arrive in. Two sources with the same identity mean an upstream defect and
/// fail the whole assembly, as do two distinct sources of one kind whose
/// `schema.name` keys coincide.
pub fn assemble(
    general: Option<GeneralConfig>,
    mut sources: Vec<SourceDescriptor>,
) -> Result<Configuration> {
    sources.sort_by_key(|s| s.id());

    if let Some(dup) = sources.windows(2).find(|w| w[0].id() == w[1].id()) {
        let id = dup[0].id();
        tracing::error!(source = %id, "duplicate source identity during assembly");
        return Err(Error::DuplicateIdentity(id));
    }

    let mut keys: HashMap<(SourceKind, &str), SourceId> = HashMap::new();
    for source in &sources {
        if let Some(first) = keys.insert((source.kind(), source.key()), source.id()) {
            let second = source.id();
            tracing::error!(key = source.key(), %first, %second, "source key collision during assembly");
            return Err(Error::KeyCollision {
                key: source.key().to_string(),
                first,
                second,
            });
        }
    }

    let mut tables = Vec::new();
    let mut functions = Vec::new();
    for source in sources {
        match source {
            SourceDescriptor::Table(t) => tables.push(t),
            SourceDescriptor::Function(f) => functions.push(f),
        }
    }

    Ok(Configuration::new(general, tables, functions))
}
