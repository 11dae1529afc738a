// src/core/session_store.rs
//! Per-visitor persisted session: the durable key/value state that survives
//! navigation away from the application flow and back.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::application::sequencer::Step;
use crate::types::UserProfile;

// ===== Storage Backends =====

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>>;

    async fn set(&self, session_id: &str, key: &str, value: &str) -> Result<()>;

    async fn remove(&self, session_id: &str, key: &str) -> Result<()>;

    /// Read and erase in one step
    async fn take(&self, session_id: &str, key: &str) -> Result<Option<String>>;

    /// Drop every session whose newest entry is older than `cutoff`; returns removed rows
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

pub struct SqliteKeyValueStore {
    pool: SqlitePool,
}

impl SqliteKeyValueStore {
    /// The pool must already have the `session_entries` table (see `DatabaseConfig::migrate`)
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT value FROM session_entries WHERE session_id = ? AND key = ?",
        )
        .bind(session_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to read session entry: {}", key))
    }

    async fn set(&self, session_id: &str, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO session_entries (session_id, key, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(session_id, key)
            DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(session_id)
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to write session entry: {}", key))?;
        Ok(())
    }

    async fn remove(&self, session_id: &str, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM session_entries WHERE session_id = ? AND key = ?")
            .bind(session_id)
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to remove session entry: {}", key))?;
        Ok(())
    }

    async fn take(&self, session_id: &str, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>(
            "DELETE FROM session_entries WHERE session_id = ? AND key = ? RETURNING value",
        )
        .bind(session_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to consume session entry: {}", key))
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM session_entries
            WHERE session_id IN (
                SELECT session_id FROM session_entries
                GROUP BY session_id
                HAVING MAX(updated_at) < ?
            )
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .context("Failed to purge stale sessions")?;

        Ok(result.rows_affected())
    }
}

/// Process-local store for tests and single-node development
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<(String, String), (String, DateTime<Utc>)>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut HashMap<(String, String), (String, DateTime<Utc>)>) -> T,
    ) -> T {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut entries)
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>> {
        Ok(self.with_entries(|entries| {
            entries
                .get(&(session_id.to_string(), key.to_string()))
                .map(|(value, _)| value.clone())
        }))
    }

    async fn set(&self, session_id: &str, key: &str, value: &str) -> Result<()> {
        self.with_entries(|entries| {
            entries.insert(
                (session_id.to_string(), key.to_string()),
                (value.to_string(), Utc::now()),
            );
        });
        Ok(())
    }

    async fn remove(&self, session_id: &str, key: &str) -> Result<()> {
        self.with_entries(|entries| {
            entries.remove(&(session_id.to_string(), key.to_string()));
        });
        Ok(())
    }

    async fn take(&self, session_id: &str, key: &str) -> Result<Option<String>> {
        Ok(self.with_entries(|entries| {
            entries
                .remove(&(session_id.to_string(), key.to_string()))
                .map(|(value, _)| value)
        }))
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        Ok(self.with_entries(|entries| {
            let mut newest: HashMap<String, DateTime<Utc>> = HashMap::new();
            for ((session_id, _), (_, updated_at)) in entries.iter() {
                let slot = newest.entry(session_id.clone()).or_insert(*updated_at);
                if *updated_at > *slot {
                    *slot = *updated_at;
                }
            }

            let before = entries.len();
            entries.retain(|(session_id, _), _| {
                newest.get(session_id).map_or(true, |newest| *newest >= cutoff)
            });
            (before - entries.len()) as u64
        }))
    }
}

// ===== Typed Session Schema =====

/// Every key the front end persists for a visitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionKey {
    Draft(String),
    ReturnToApplication,
    ResumeStep,
    AutoOpenApplication,
    AuthToken,
    AuthUser,
}

impl SessionKey {
    pub fn as_key(&self) -> String {
        match self {
            SessionKey::Draft(job_id) => format!("draft:{}", job_id),
            SessionKey::ReturnToApplication => "return_to_application".to_string(),
            SessionKey::ResumeStep => "resume_step".to_string(),
            SessionKey::AutoOpenApplication => "auto_open_application".to_string(),
            SessionKey::AuthToken => "auth_token".to_string(),
            SessionKey::AuthUser => "auth_user".to_string(),
        }
    }
}

/// The only accessor to a visitor's persisted state. Values that fail to
/// parse are treated as absent.
#[derive(Clone, Copy)]
pub struct PersistedSession<'a> {
    store: &'a dyn KeyValueStore,
    session_id: &'a str,
}

impl<'a> PersistedSession<'a> {
    pub fn new(store: &'a dyn KeyValueStore, session_id: &'a str) -> Self {
        Self { store, session_id }
    }

    pub fn id(&self) -> &'a str {
        self.session_id
    }

    fn decode<T: DeserializeOwned>(key: &SessionKey, raw: Option<String>) -> Option<T> {
        let raw = raw?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring corrupt session entry {}: {}", key.as_key(), e);
                None
            }
        }
    }

    pub async fn read<T: DeserializeOwned>(&self, key: &SessionKey) -> Result<Option<T>> {
        let raw = self.store.get(self.session_id, &key.as_key()).await?;
        Ok(Self::decode(key, raw))
    }

    pub async fn write<T: Serialize>(&self, key: &SessionKey, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value).context("Failed to encode session entry")?;
        self.store.set(self.session_id, &key.as_key(), &raw).await
    }

    pub async fn remove(&self, key: &SessionKey) -> Result<()> {
        self.store.remove(self.session_id, &key.as_key()).await
    }

    /// At-most-once read: the entry is gone afterwards whether or not it parsed
    pub async fn take<T: DeserializeOwned>(&self, key: &SessionKey) -> Result<Option<T>> {
        let raw = self.store.take(self.session_id, &key.as_key()).await?;
        Ok(Self::decode(key, raw))
    }

    // --- Resume signals ---

    pub async fn mark_return_to_application(&self) -> Result<()> {
        self.write(&SessionKey::ReturnToApplication, &true).await
    }

    pub async fn take_return_to_application(&self) -> Result<bool> {
        Ok(self
            .take::<bool>(&SessionKey::ReturnToApplication)
            .await?
            .unwrap_or(false))
    }

    pub async fn set_resume_step(&self, step: Step) -> Result<()> {
        self.write(&SessionKey::ResumeStep, &step).await
    }

    pub async fn take_resume_step(&self) -> Result<Option<Step>> {
        self.take(&SessionKey::ResumeStep).await
    }

    pub async fn set_auto_open(&self) -> Result<()> {
        self.write(&SessionKey::AutoOpenApplication, &true).await
    }

    pub async fn take_auto_open(&self) -> Result<bool> {
        Ok(self
            .take::<bool>(&SessionKey::AutoOpenApplication)
            .await?
            .unwrap_or(false))
    }

    pub async fn clear_resume_signals(&self) -> Result<()> {
        self.remove(&SessionKey::ReturnToApplication).await?;
        self.remove(&SessionKey::ResumeStep).await?;
        self.remove(&SessionKey::AutoOpenApplication).await?;
        debug!("Cleared resume signals for session {}", self.session_id);
        Ok(())
    }

    // --- Credentials ---

    pub async fn auth_token(&self) -> Result<Option<String>> {
        self.read(&SessionKey::AuthToken).await
    }

    pub async fn auth_user(&self) -> Result<Option<UserProfile>> {
        self.read(&SessionKey::AuthUser).await
    }

    pub async fn store_credentials(&self, token: &str, user: &UserProfile) -> Result<()> {
        self.write(&SessionKey::AuthToken, &token).await?;
        self.write(&SessionKey::AuthUser, user).await
    }

    pub async fn clear_credentials(&self) -> Result<()> {
        self.remove(&SessionKey::AuthToken).await?;
        self.remove(&SessionKey::AuthUser).await
    }
}
