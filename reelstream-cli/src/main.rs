//! Reelstream CLI - Command-line interface
//!
//! Runs the streaming API and offers small offline helpers.

mod commands;

use clap::Parser;

#[derive(Parser)]
#[command(name = "reelstream")]
#[command(about = "Stream torrent media over HTTP while it downloads")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    commands::handle_command(cli.command).await
}
