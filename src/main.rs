use anyhow::Result;
use clap::Parser;

use censogeo::cli::{Cli, Commands};
use censogeo::commands;

fn main() -> Result<()> {
    let cli = Cli::parse();
    match &cli.command {
        Commands::Download(args) => commands::download(&cli, args),
        Commands::Similarity(args) => commands::similarity(&cli, args),
    }
}
