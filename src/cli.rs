// src/cli.rs
use crate::core::{KeyValueStore, SqliteKeyValueStore};
use crate::database::DatabaseConfig;
use crate::environment::EnvironmentConfig;
use anyhow::Result;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "jobboard")]
#[command(about = "Job board application server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to ./config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve,
    /// Delete visitor sessions untouched for the given number of days
    PurgeSessions {
        /// Defaults to `session_ttl_days` from the configuration
        #[arg(long)]
        older_than_days: Option<u32>,
    },
}

pub async fn handle_command(cli: Cli) -> Result<()> {
    let config = EnvironmentConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve => crate::web::start_web_server(config).await,
        Command::PurgeSessions { older_than_days } => {
            let days = older_than_days.unwrap_or(config.session_ttl_days);
            purge_sessions(&config, days).await
        }
    }
}

async fn purge_sessions(config: &EnvironmentConfig, days: u32) -> Result<()> {
    config.ensure_directories().await?;

    let mut db_config = DatabaseConfig::new(config.database_path.clone());
    db_config.init_pool().await?;
    db_config.migrate().await?;

    let store = SqliteKeyValueStore::new(db_config.pool()?.clone());
    let cutoff = Utc::now() - Duration::days(i64::from(days));

    match store.purge_older_than(cutoff).await {
        Ok(removed) => {
            info!(
                "Purged {} session entries untouched for {} days",
                removed, days
            );
            Ok(())
        }
        Err(e) => {
            error!("Failed to purge sessions: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_commands() {
        let cli = Cli::parse_from(["jobboard", "serve", "--log-json", "--config", "/etc/jb.yaml"]);
        assert!(matches!(cli.command, Command::Serve));
        assert!(cli.log_json);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/jb.yaml")));

        let cli = Cli::parse_from(["jobboard", "purge-sessions", "--older-than-days", "7"]);
        assert!(matches!(
            cli.command,
            Command::PurgeSessions {
                older_than_days: Some(7)
            }
        ));
        assert!(!cli.log_json);
    }

    #[test]
    fn test_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["jobboard", "generate"]).is_err());
    }
}
