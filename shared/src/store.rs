//! Preferences table access.
//!
//! One row per user, keyed by the identity provider subject. Writes are
//! unconditional upserts: the last writer wins and no version is checked.

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

use crate::models::PreferencesRecord;
use crate::Result;

/// Storage port for preferences rows.
#[async_trait]
pub trait PreferencesStore: Send + Sync {
    /// Fetch the row for `user_id`, if one was ever written.
    async fn get(&self, user_id: &str) -> Result<Option<PreferencesRecord>>;

    /// Replace the row for `user_id`, stamping a fresh `updated_at`.
    async fn put(&self, user_id: &str, preferences: Map<String, Value>) -> Result<PreferencesRecord>;

    /// Rows for `user_id` written at or after `since` (secondary index path).
    async fn list_updated_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PreferencesRecord>>;
}

/// Write timestamp at the precision Postgres `timestamptz` keeps.
fn write_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Postgres-backed store.
pub struct PgPreferencesStore {
    pool: PgPool,
    table: String,
}

type PreferencesRow = (String, Json<Map<String, Value>>, DateTime<Utc>);

fn record_from_row((user_id, Json(preferences), updated_at): PreferencesRow) -> PreferencesRecord {
    PreferencesRecord {
        user_id,
        preferences,
        updated_at: Some(updated_at),
    }
}

impl PgPreferencesStore {
    /// `table` must already be a validated identifier (see [`crate::Config`]).
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    /// Create the table and its `(user_id, updated_at)` index if missing.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                user_id TEXT PRIMARY KEY NOT NULL,
                preferences JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            table = self.table
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {table}_user_updated_idx ON {table} (user_id, updated_at)",
            table = self.table
        ))
        .execute(&self.pool)
        .await?;

        info!("Ensured preferences table {}", self.table);
        Ok(())
    }
}

#[async_trait]
impl PreferencesStore for PgPreferencesStore {
    async fn get(&self, user_id: &str) -> Result<Option<PreferencesRecord>> {
        let row: Option<PreferencesRow> = sqlx::query_as(&format!(
            "SELECT user_id, preferences, updated_at FROM {} WHERE user_id = $1",
            self.table
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(record_from_row))
    }

    async fn put(&self, user_id: &str, preferences: Map<String, Value>) -> Result<PreferencesRecord> {
        let updated_at = write_timestamp();

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (user_id, preferences, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET
                preferences = EXCLUDED.preferences,
                updated_at = EXCLUDED.updated_at
            "#,
            self.table
        ))
        .bind(user_id)
        .bind(Json(&preferences))
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        Ok(PreferencesRecord {
            user_id: user_id.to_string(),
            preferences,
            updated_at: Some(updated_at),
        })
    }

    async fn list_updated_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PreferencesRecord>> {
        let rows: Vec<PreferencesRow> = sqlx::query_as(&format!(
            r#"
            SELECT user_id, preferences, updated_at FROM {}
            WHERE user_id = $1 AND updated_at >= $2
            ORDER BY updated_at DESC
            "#,
            self.table
        ))
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(record_from_row).collect())
    }
}

/// In-process store, used by tests and local runs.
#[derive(Default)]
pub struct MemoryPreferencesStore {
    rows: RwLock<HashMap<String, PreferencesRecord>>,
}

impl MemoryPreferencesStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferencesStore for MemoryPreferencesStore {
    async fn get(&self, user_id: &str) -> Result<Option<PreferencesRecord>> {
        Ok(self.rows.read().await.get(user_id).cloned())
    }

    async fn put(&self, user_id: &str, preferences: Map<String, Value>) -> Result<PreferencesRecord> {
        let record = PreferencesRecord {
            user_id: user_id.to_string(),
            preferences,
            updated_at: Some(write_timestamp()),
        };
        self.rows
            .write()
            .await
            .insert(user_id.to_string(), record.clone());
        Ok(record)
    }

    async fn list_updated_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PreferencesRecord>> {
        Ok(self
            .rows
            .read()
            .await
            .get(user_id)
            .filter(|record| record.updated_at.is_some_and(|at| at >= since))
            .cloned()
            .into_iter()
            .collect())
    }
}
