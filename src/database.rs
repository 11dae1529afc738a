// src/database.rs
use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug)]
pub struct DatabaseConfig {
    pub database_path: PathBuf,
    pub pool: Option<SqlitePool>,
}

impl DatabaseConfig {
    pub fn new(database_path: PathBuf) -> Self {
        Self {
            database_path,
            pool: None,
        }
    }

    /// Single-connection in-memory database with migrations applied
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory SQLite database")?;

        let config = Self {
            database_path: PathBuf::from(":memory:"),
            pool: Some(pool),
        };
        config.migrate().await?;
        Ok(config)
    }

    /// Initialize the database connection pool
    pub async fn init_pool(&mut self) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = self.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let database_url = format!("sqlite:{}?mode=rwc", self.database_path.display());

        let pool = SqlitePool::connect(&database_url)
            .await
            .context("Failed to connect to SQLite database")?;
        self.pool = Some(pool);

        info!("Database connection pool initialized: {}", database_url);
        Ok(())
    }

    /// Get the database pool
    pub fn pool(&self) -> Result<&SqlitePool> {
        self.pool.as_ref().ok_or_else(|| {
            anyhow::anyhow!("Database pool not initialized. Call init_pool() first.")
        })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        let pool = self.pool()?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_entries (
                session_id TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (session_id, key)
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_session_entries_updated_at
            ON session_entries(updated_at);
            "#,
        )
        .execute(pool)
        .await?;

        info!("Database migrations completed successfully");
        Ok(())
    }
}
