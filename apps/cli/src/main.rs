//! metaenrich CLI: metadata enrichment pipeline for a data catalog.
//!
//! Records intake metadata for a table identifier, then fetches catalog
//! metadata, samples rows, captures documentation and synthesizes a
//! description, one artifact per stage.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);

    let stage = cli.command.stage();
    if let Err(e) = commands::run(cli).await {
        eprintln!("❌ {stage} failed: {e}");
        std::process::exit(1);
    }
    Ok(())
}
