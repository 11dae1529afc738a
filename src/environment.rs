// src/environment.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::service_client::DEFAULT_TIMEOUT_SECS;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub backend_url: String,
    pub database_path: PathBuf,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_days: u32,
    /// How long an uploaded resume is held in memory for an idle flow
    #[serde(default = "default_resume_ttl")]
    pub resume_ttl_minutes: u64,
}

fn default_port() -> u16 {
    8000
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_session_ttl() -> u32 {
    30
}

fn default_resume_ttl() -> u64 {
    120
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    local: EnvironmentConfig,
    production: EnvironmentConfig,
}

impl EnvironmentConfig {
    /// Load configuration based on environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let environment = Self::get_environment();
        info!("Loading configuration for environment: {}", environment);

        let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        let config = Self::load_from_file(path, &environment)?;
        config.with_overrides(
            std::env::var("JOBBOARD_BACKEND_URL").ok(),
            std::env::var("ROCKET_PORT").ok(),
        )
    }

    fn get_environment() -> String {
        std::env::var("JOBBOARD_ENV")
            .or_else(|_| std::env::var("ENVIRONMENT"))
            .or_else(|_| std::env::var("ENV"))
            .unwrap_or_else(|_| "local".to_string())
    }

    pub fn load_from_file(config_path: &Path, environment: &str) -> Result<Self> {
        if !config_path.exists() {
            anyhow::bail!(
                "{} not found. Server cannot start without configuration.",
                config_path.display()
            );
        }

        let config_content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config_file: ConfigFile = serde_yaml::from_str(&config_content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        let env_config = match environment {
            "production" => config_file.production,
            _ => config_file.local,
        };

        Ok(Self {
            database_path: Self::resolve_path(&env_config.database_path)?,
            ..env_config
        })
    }

    fn with_overrides(mut self, backend_url: Option<String>, port: Option<String>) -> Result<Self> {
        if let Some(url) = backend_url.filter(|u| !u.trim().is_empty()) {
            info!("Backend URL overridden from environment");
            self.backend_url = url;
        }

        if let Some(port) = port {
            self.port = port
                .parse::<u16>()
                .map_err(|_| anyhow::anyhow!("ROCKET_PORT must be a valid port number"))?;
        }

        Ok(self)
    }

    fn resolve_path(path: &Path) -> Result<PathBuf> {
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            // For relative paths, resolve from current working directory
            let current_dir = std::env::current_dir().context("Failed to get current directory")?;
            Ok(current_dir.join(path))
        }
    }

    /// Ensure the database directory exists
    pub async fn ensure_directories(&self) -> Result<()> {
        if let Some(db_parent) = self.database_path.parent() {
            tokio::fs::create_dir_all(db_parent)
                .await
                .with_context(|| {
                    format!(
                        "Failed to create database directory: {}",
                        db_parent.display()
                    )
                })?;
        }

        info!("All configured directories ensured to exist");
        Ok(())
    }
}
