//! extloader CLI: staged bootstrap of plugin extensions and plugin UI.
//!
//! Discovers what each plugin contributes, loads plain extension scripts
//! first, then the plugin UI components they point at.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
