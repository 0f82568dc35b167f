use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use crate::config::Config;
use crate::gocd::Resolver;
use crate::snapshot::DashboardSnapshot;

#[derive(Parser)]
#[command(name = "godash")]
#[command(author, version, about = "GoCD pipeline status dashboard", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true, env = "GODASH_CONFIG")]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve every configured pipeline group and print a status snapshot
    Status {
        #[arg(short, long)]
        server: Option<String>,

        #[arg(short, long, env = "GOCD_USERNAME")]
        username: Option<String>,

        #[arg(long, env = "GOCD_PASSWORD")]
        password: Option<String>,
    },
}

impl Cli {
    async fn execute_status(
        &self,
        server: &Option<String>,
        username: &Option<String>,
        password: &Option<String>,
    ) -> Result<()> {
        let mut config = Config::load(self.config.as_deref())?;

        if let Some(server) = server {
            config.gocd.server = server.clone();
        }
        if let Some(username) = username {
            config.gocd.username = username.clone();
        }
        if let Some(password) = password {
            config.gocd.password = password.clone();
        }

        info!(
            "Resolving {} pipeline group(s) against {}",
            config.groups.len(),
            config.gocd.server
        );

        let resolver = Resolver::new(&config.gocd)?;
        let groups = resolver.resolve_groups(&config.groups).await?;
        let snapshot = DashboardSnapshot::capture(&groups);

        let json_output = if self.pretty {
            serde_json::to_string_pretty(&snapshot)?
        } else {
            serde_json::to_string(&snapshot)?
        };

        if let Some(output_path) = &self.output {
            std::fs::write(output_path, json_output)?;
            info!("Snapshot written to: {}", output_path.display());
        } else {
            println!("{}", json_output);
        }

        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Status {
                server,
                username,
                password,
            } => self.execute_status(server, username, password).await,
        }
    }
}
