use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod azfile;
mod commands;
mod env;

use commands::generate::GenerateArgs;
use commands::schemas::SchemasArgs;

#[derive(Parser, Debug)]
#[command(
    name = "martin-config",
    version,
    about = "Generate martin tile server configuration from a PostGIS catalog"
)]
struct Cli {
    /// Debug logging. RUST_LOG takes precedence when set.
    #[arg(short = 'd', long, global = true, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan the catalog and write the martin configuration document.
    Generate(GenerateArgs),

    /// List the schemas visible through the connection.
    Schemas(SchemasArgs),
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // stdout carries the generated document
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match cli.cmd {
        Command::Generate(args) => commands::generate::run(args).await?,
        Command::Schemas(args) => commands::schemas::run(args).await?,
    }

    Ok(())
}
