use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use sqlx::{migrate::MigrateDatabase, Pool, Row, Sqlite, SqlitePool};

use crate::modules::progression::KeyValueStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOutcome {
    Completed,
    Cancelled,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOutcome::Completed => "completed",
            SessionOutcome::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "completed" => Ok(SessionOutcome::Completed),
            "cancelled" => Ok(SessionOutcome::Cancelled),
            other => Err(format!("Unknown session outcome: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub workout_id: String,
    pub workout_name: String,
    pub duration_secs: u32,
    pub elapsed_secs: u32,
    pub xp_awarded: u32,
    pub outcome: SessionOutcome,
    pub level_after: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

pub struct ProgressDatabase {
    pub pool: Pool<Sqlite>,
}

impl ProgressDatabase {
    pub async fn new(db_path: &str) -> Result<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(db_path).await.unwrap_or(false) {
            Sqlite::create_database(db_path)
                .await
                .with_context(|| format!("Failed to create database at {}", db_path))?;
        }

        let pool = SqlitePool::connect(db_path)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool };
        db.initialize_schema().await?;
        Ok(db)
    }

    async fn initialize_schema(&self) -> Result<()> {
        let schema = r#"
        -- One row per persisted progression field
        CREATE TABLE IF NOT EXISTS progression (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );

        -- Finished workout sessions
        CREATE TABLE IF NOT EXISTS session_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            workout_id TEXT NOT NULL,
            workout_name TEXT NOT NULL,
            duration_secs INTEGER NOT NULL,
            elapsed_secs INTEGER NOT NULL,
            xp_awarded INTEGER NOT NULL DEFAULT 0,
            outcome TEXT NOT NULL,
            level_after INTEGER NOT NULL,
            started_at TIMESTAMP NOT NULL,
            ended_at TIMESTAMP NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_history_ended ON session_history(ended_at);
        "#;

        sqlx::raw_sql(schema)
            .execute(&self.pool)
            .await
            .context("Failed to create schema")?;

        Ok(())
    }

    pub async fn load_progression(&self) -> Result<HashMap<String, String>> {
        let rows = sqlx::query("SELECT key, value FROM progression")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch progression")?;

        let mut entries = HashMap::new();
        for row in rows {
            let key: String = row.try_get("key")?;
            let value: String = row.try_get("value")?;
            entries.insert(key, value);
        }
        Ok(entries)
    }

    /// Upsert every entry in one transaction.
    pub async fn save_progression(&self, entries: &[(&'static str, String)]) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        for (key, value) in entries {
            sqlx::query(
                r#"
                INSERT INTO progression (key, value)
                VALUES (?1, ?2)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(*key)
            .bind(value)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to store {}", key))?;
        }
        tx.commit().await.context("Failed to commit progression")?;
        Ok(())
    }

    pub async fn record_session(&self, record: &SessionRecord) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO session_history
            (workout_id, workout_name, duration_secs, elapsed_secs, xp_awarded, outcome, level_after, started_at, ended_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&record.workout_id)
        .bind(&record.workout_name)
        .bind(record.duration_secs as i64)
        .bind(record.elapsed_secs as i64)
        .bind(record.xp_awarded as i64)
        .bind(record.outcome.as_str())
        .bind(record.level_after as i64)
        .bind(record.started_at)
        .bind(record.ended_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert session")?;

        Ok(result.last_insert_rowid())
    }

    /// Newest first.
    pub async fn recent_sessions(&self, limit: u32) -> Result<Vec<SessionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT workout_id, workout_name, duration_secs, elapsed_secs, xp_awarded,
                   outcome, level_after, started_at, ended_at
            FROM session_history
            ORDER BY ended_at DESC, id DESC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch session history")?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let outcome: String = row.try_get("outcome")?;
            let outcome = outcome.parse::<SessionOutcome>().map_err(|e| anyhow!(e))?;
            records.push(SessionRecord {
                workout_id: row.try_get("workout_id")?,
                workout_name: row.try_get("workout_name")?,
                duration_secs: row.try_get::<i64, _>("duration_secs")? as u32,
                elapsed_secs: row.try_get::<i64, _>("elapsed_secs")? as u32,
                xp_awarded: row.try_get::<i64, _>("xp_awarded")? as u32,
                outcome,
                level_after: row.try_get::<i64, _>("level_after")? as u32,
                started_at: row.try_get("started_at")?,
                ended_at: row.try_get("ended_at")?,
            });
        }
        Ok(records)
    }
}

impl KeyValueStore for ProgressDatabase {
    fn load_entries(&self) -> BoxFuture<'_, Result<HashMap<String, String>>> {
        Box::pin(self.load_progression())
    }

    fn save_entries<'a>(&'a self, entries: &'a [(&'static str, String)]) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.save_progression(entries))
    }
}
