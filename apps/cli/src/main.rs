//! pestres CLI — Codex Alimentarius pesticide MRL harvester.
//!
//! Walks the FAO commodity taxonomy, fetches MRL detail records, and writes
//! three flattened CSV datasets.

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
