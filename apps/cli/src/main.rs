//! Hibou CLI: extract, transform and distribute EMMAA knowledge-graph models.
//!
//! Pulls models, tests and explanatory paths from the EMMAA platform,
//! grounds them to an ontology, and writes JSONL objects to S3-compatible
//! storage.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
