//! tdocgraph CLI — graph-ranked retrieval over standardization documents.
//!
//! Ranks documents from the property graph, stages their archives for the
//! generation backend, and prints the generated answer.

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
