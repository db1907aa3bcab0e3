//! `martin-config schemas` - list the schemas that can be passed to `--schema`.

use super::ConnectionArgs;
use anyhow::Result;
use clap::Args;
use martin_config_core::is_system_schema;
use martin_config_runtime::CatalogReader;

#[derive(Args, Debug)]
pub struct SchemasArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Include system schemas such as pg_catalog.
    #[arg(long, default_value_t = false)]
    pub include_system: bool,
}

pub async fn run(args: SchemasArgs) -> Result<()> {
    let env = args.connection.load_env()?;
    let catalog = args.connection.connect(&env, 1).await?;

    let schemas = catalog.list_schemas().await?;
    for schema in visible(schemas, args.include_system) {
        println!("{}", schema);
    }
    Ok(())
}

fn visible(schemas: Vec<String>, include_system: bool) -> Vec<String> {
    schemas
        .into_iter()
        .filter(|s| include_system || !is_system_schema(s))
        .collect()
}
