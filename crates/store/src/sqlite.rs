//! SQLite run and memory storage.
//!
//! Runs are stored one row per run with the full [`RunRecord`] as a JSON
//! column; identity and time columns exist only for lookup and ordering.
//! Profiles are one JSON row per identity, merged inside a transaction so
//! concurrent runs for the same caller do not lose updates. Judge feedback
//! is append-only, one row per answer, keyed to the run it grades.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use pipeline::{
    CandidateSlot, Identity, JudgeFeedback, MemoryProfile, MemoryStore, RunId, RunRecord, RunStore,
    StoreError, Timestamp, TraitDelta,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

fn backend(context: &str) -> impl FnOnce(sqlx::Error) -> StoreError + '_ {
    move |e| StoreError::Backend(format!("{context}: {e}"))
}

fn serialization(e: serde_json::Error) -> StoreError {
    StoreError::Serialization(e.to_string())
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if missing) the database at `path` and ensures the schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the directory, connection or schema
    /// cannot be created.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Backend(format!("failed to create database directory: {e}"))
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(backend("invalid SQLite path"))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(backend("failed to connect to SQLite"))?;

        let store = Self { pool };
        store.init_schema().await?;

        info!(path = %path.display(), "SQLite store initialized");
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                run_id TEXT PRIMARY KEY,
                identity_kind TEXT NOT NULL,
                identity_id TEXT NOT NULL,
                mode TEXT NOT NULL,
                record TEXT NOT NULL,
                created_at_us INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(backend("failed to create runs table"))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_runs_identity
                ON runs(identity_kind, identity_id, created_at_us)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(backend("failed to create runs index"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS memory_profiles (
                identity_kind TEXT NOT NULL,
                identity_id TEXT NOT NULL,
                profile TEXT NOT NULL,
                updated_at_us INTEGER NOT NULL,
                PRIMARY KEY (identity_kind, identity_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(backend("failed to create memory_profiles table"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS judge_feedback (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id TEXT NOT NULL REFERENCES runs(run_id),
                judge_winner INTEGER NOT NULL,
                user_choice INTEGER NOT NULL,
                agreement INTEGER NOT NULL,
                judge_defaulted INTEGER NOT NULL,
                recorded_at_us INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(backend("failed to create judge_feedback table"))?;

        debug!("SQLite schema initialized");
        Ok(())
    }
}

#[async_trait]
impl RunStore for SqliteStore {
    async fn save(&self, record: &RunRecord) -> Result<(), StoreError> {
        let data = serde_json::to_string(record).map_err(serialization)?;

        sqlx::query(
            r#"
            INSERT INTO runs (run_id, identity_kind, identity_id, mode, record, created_at_us)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.run_id.to_string())
        .bind(record.identity.kind())
        .bind(record.identity.as_str())
        .bind(record.mode.as_str())
        .bind(&data)
        .bind(record.created_at.as_datetime().timestamp_micros())
        .execute(&self.pool)
        .await
        .map_err(backend("failed to save run"))?;

        debug!(run_id = %record.run_id, identity = %record.identity, "run saved");
        Ok(())
    }

    async fn recent(
        &self,
        identity: &Identity,
        limit: usize,
    ) -> Result<Vec<RunRecord>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT record FROM runs
            WHERE identity_kind = ? AND identity_id = ?
            ORDER BY created_at_us DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(identity.kind())
        .bind(identity.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(backend("failed to list runs"))?;

        rows.into_iter()
            .map(|(data,)| serde_json::from_str(&data).map_err(serialization))
            .collect()
    }

    async fn record_feedback(
        &self,
        run_id: RunId,
        user_choice: CandidateSlot,
    ) -> Result<JudgeFeedback, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT record FROM runs WHERE run_id = ?")
            .bind(run_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend("failed to load run"))?;
        let (data,) = row.ok_or(StoreError::RunNotFound(run_id))?;
        let record: RunRecord = serde_json::from_str(&data).map_err(serialization)?;

        let feedback = JudgeFeedback::for_run(&record, user_choice, Timestamp::now())?;

        sqlx::query(
            r#"
            INSERT INTO judge_feedback
                (run_id, judge_winner, user_choice, agreement, judge_defaulted, recorded_at_us)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run_id.to_string())
        .bind(i64::from(feedback.judge_winner.number()))
        .bind(i64::from(feedback.user_choice.number()))
        .bind(feedback.agreement)
        .bind(feedback.judge_defaulted)
        .bind(feedback.recorded_at.as_datetime().timestamp_micros())
        .execute(&self.pool)
        .await
        .map_err(backend("failed to save feedback"))?;

        debug!(
            run_id = %run_id,
            agreement = feedback.agreement,
            "judge feedback recorded"
        );
        Ok(feedback)
    }
}

#[async_trait]
impl MemoryStore for SqliteStore {
    async fn load_traits(&self, identity: &Identity) -> Result<Option<MemoryProfile>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT profile FROM memory_profiles WHERE identity_kind = ? AND identity_id = ?",
        )
        .bind(identity.kind())
        .bind(identity.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend("failed to load profile"))?;

        row.map(|(data,)| serde_json::from_str(&data).map_err(serialization))
            .transpose()
    }

    async fn merge_traits(
        &self,
        identity: &Identity,
        delta: &TraitDelta,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(backend("failed to begin transaction"))?;

        let row: Option<(String,)> = sqlx::query_as(
            "SELECT profile FROM memory_profiles WHERE identity_kind = ? AND identity_id = ?",
        )
        .bind(identity.kind())
        .bind(identity.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend("failed to load profile"))?;

        let current: MemoryProfile = match row {
            Some((data,)) => serde_json::from_str(&data).map_err(serialization)?,
            None => MemoryProfile::default(),
        };
        let merged = current.merge(delta);
        let data = serde_json::to_string(&merged).map_err(serialization)?;
        let now = Timestamp::now().as_datetime().timestamp_micros();

        sqlx::query(
            r#"
            INSERT INTO memory_profiles (identity_kind, identity_id, profile, updated_at_us)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(identity_kind, identity_id) DO UPDATE SET
                profile = excluded.profile,
                updated_at_us = excluded.updated_at_us
            "#,
        )
        .bind(identity.kind())
        .bind(identity.as_str())
        .bind(&data)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(backend("failed to save profile"))?;

        tx.commit().await.map_err(backend("failed to commit profile"))?;

        debug!(identity = %identity, runs = merged.runs_count, "profile merged");
        Ok(())
    }
}
