mod cli;
mod config;
mod error;
mod gocd;
mod snapshot;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    info!("Starting godash");
    cli.execute().await?;

    Ok(())
}
