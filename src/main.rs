mod archive;
mod cli;
mod client;
mod config;
mod error;
mod ingest;
mod logging;
mod parquet;
mod station;
mod summary;

use anyhow::{Error, Result};
use clap::Parser;
use cli::{command, Cli, Commands};
use logging::init_logging;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    let settings = &cli.settings;

    let log_dir = settings.log_file.then(|| settings.log_dir());
    let _guard = init_logging(&settings.log_level, log_dir.as_deref())?;

    match &cli.command {
        Commands::Stations {
            networks,
            no_archive,
        } => {
            let message = command::stations(settings, networks, !no_archive).await?;
            println!("{}", message);
        }
        Commands::Triplets { network } => {
            for triplet in command::triplets(settings, network).await? {
                println!("{}", triplet);
            }
        }
    }

    Ok(())
}
