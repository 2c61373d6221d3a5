// ABOUTME: Keyed persistence for in-flight OAuth state records
// ABOUTME: Provides SQLite-backed and in-memory stores with atomic consume semantics

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    error::{AuthError, AuthResult},
    oauth::types::OAuthState,
};

/// Keyed store for in-flight OAuth state records.
///
/// Implementations must make `remove` atomic per state token: when several
/// callers race to consume the same token, at most one observes `Some`.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Insert a new record. The state token must not already exist.
    async fn insert(&self, record: &OAuthState) -> AuthResult<()>;

    /// Fetch a record without consuming it.
    async fn get(&self, state: &str) -> AuthResult<Option<OAuthState>>;

    /// Atomically delete and return the record for this token.
    async fn remove(&self, state: &str) -> AuthResult<Option<OAuthState>>;

    /// Delete every record that expired before `cutoff`, returning the count.
    async fn remove_expired_before(&self, cutoff: DateTime<Utc>) -> AuthResult<u64>;
}

const STATE_COLUMNS: &str =
    "state, id, code_verifier, provider, redirect_uri, source, metadata, created_at, expires_at";

/// SQLite-backed state store
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    /// Create a new store on an existing connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the backing table when no migration pipeline owns the schema.
    pub async fn ensure_schema(&self) -> AuthResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS oauth_states (
                state TEXT PRIMARY KEY,
                id TEXT NOT NULL,
                code_verifier TEXT,
                provider TEXT NOT NULL,
                redirect_uri TEXT NOT NULL,
                source TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_oauth_states_expires_at ON oauth_states (expires_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_record(row: &SqliteRow) -> AuthResult<OAuthState> {
        let provider: String = row.try_get("provider")?;
        let source: String = row.try_get("source")?;
        let metadata: String = row.try_get("metadata")?;
        let created_at: i64 = row.try_get("created_at")?;
        let expires_at: i64 = row.try_get("expires_at")?;

        Ok(OAuthState {
            id: row.try_get("id")?,
            state: row.try_get("state")?,
            code_verifier: row.try_get("code_verifier")?,
            provider: provider.parse()?,
            redirect_uri: row.try_get("redirect_uri")?,
            source: source.parse()?,
            metadata: serde_json::from_str(&metadata)?,
            created_at: timestamp_to_datetime(created_at)?,
            expires_at: timestamp_to_datetime(expires_at)?,
        })
    }
}

fn timestamp_to_datetime(secs: i64) -> AuthResult<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| AuthError::Storage(format!("Invalid timestamp in state row: {}", secs)))
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn insert(&self, record: &OAuthState) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO oauth_states (
                state, id, code_verifier, provider, redirect_uri, source,
                metadata, created_at, expires_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.state)
        .bind(&record.id)
        .bind(&record.code_verifier)
        .bind(record.provider.to_string())
        .bind(&record.redirect_uri)
        .bind(record.source.to_string())
        .bind(serde_json::to_string(&record.metadata)?)
        .bind(record.created_at.timestamp())
        .bind(record.expires_at.timestamp())
        .execute(&self.pool)
        .await?;

        debug!("Stored OAuth state for provider {}", record.provider);
        Ok(())
    }

    async fn get(&self, state: &str) -> AuthResult<Option<OAuthState>> {
        let row = sqlx::query(&format!(
            "SELECT {STATE_COLUMNS} FROM oauth_states WHERE state = ?"
        ))
        .bind(state)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn remove(&self, state: &str) -> AuthResult<Option<OAuthState>> {
        // Single-statement delete-and-return keeps the consume atomic: the
        // losing side of a race gets no row back.
        let row = sqlx::query(&format!(
            "DELETE FROM oauth_states WHERE state = ? RETURNING {STATE_COLUMNS}"
        ))
        .bind(state)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn remove_expired_before(&self, cutoff: DateTime<Utc>) -> AuthResult<u64> {
        let result = sqlx::query("DELETE FROM oauth_states WHERE expires_at < ?")
            .bind(cutoff.timestamp())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// In-memory state store for tests and single-process deployments
#[derive(Default)]
pub struct MemoryStateStore {
    records: RwLock<HashMap<String, OAuthState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn insert(&self, record: &OAuthState) -> AuthResult<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.state) {
            return Err(AuthError::Storage(
                "State token already exists".to_string(),
            ));
        }
        records.insert(record.state.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, state: &str) -> AuthResult<Option<OAuthState>> {
        Ok(self.records.read().await.get(state).cloned())
    }

    async fn remove(&self, state: &str) -> AuthResult<Option<OAuthState>> {
        // HashMap::remove under the write lock is the winner-takes-all point.
        Ok(self.records.write().await.remove(state))
    }

    async fn remove_expired_before(&self, cutoff: DateTime<Utc>) -> AuthResult<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| record.expires_at >= cutoff);
        Ok((before - records.len()) as u64)
    }
}
