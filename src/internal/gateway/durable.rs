//! Durable, externally-keyed persistence on the gateway side.
//!
//! Two tables: the one-shot submission mappings and the terminal result
//! records. A row in `job_results` is terminal by construction, so the
//! upsert is `ON CONFLICT DO NOTHING`: racing polls that both observed a
//! terminal backend response cannot corrupt state, the later write no-ops.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::internal::checks::result::CheckResult;

const CREATE_MAPPINGS: &str = "\
CREATE TABLE IF NOT EXISTS job_mappings (
    external_id TEXT PRIMARY KEY,
    backend_id TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)";

const CREATE_RESULTS: &str = "\
CREATE TABLE IF NOT EXISTS job_results (
    external_id TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    results_json TEXT,
    detail TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)";

/// Status of a persisted record. Only terminal states are ever stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    Done,
    Error,
    Lost,
}

impl TerminalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalStatus::Done => "done",
            TerminalStatus::Error => "error",
            TerminalStatus::Lost => "lost",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "done" => Some(TerminalStatus::Done),
            "error" => Some(TerminalStatus::Error),
            "lost" => Some(TerminalStatus::Lost),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DurableRecord {
    pub external_id: Uuid,
    pub status: TerminalStatus,
    pub results: Option<Vec<CheckResult>>,
    pub detail: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DurableError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("corrupt record for {external_id}: {reason}")]
    Corrupt { external_id: Uuid, reason: String },
}

#[derive(Clone)]
pub struct GatewayStore {
    pool: SqlitePool,
}

impl GatewayStore {
    /// Open (or create) the gateway database and run the idempotent DDL.
    pub async fn connect(url: &str) -> Result<Self, DurableError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;
        Self::init(pool).await
    }

    /// In-memory store for tests. A single connection keeps every query on
    /// the same ephemeral database.
    pub async fn in_memory() -> Result<Self, DurableError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Self, DurableError> {
        sqlx::query(CREATE_MAPPINGS).execute(&pool).await?;
        sqlx::query(CREATE_RESULTS).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Record the external→backend id mapping. Called exactly once per
    /// submission; the mapping is read-only afterward.
    pub async fn insert_mapping(&self, external: Uuid, backend: Uuid) -> Result<(), DurableError> {
        sqlx::query("INSERT INTO job_mappings (external_id, backend_id) VALUES (?1, ?2)")
            .bind(external.to_string())
            .bind(backend.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mapping(&self, external: Uuid) -> Result<Option<Uuid>, DurableError> {
        let row = sqlx::query("SELECT backend_id FROM job_mappings WHERE external_id = ?1")
            .bind(external.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let raw: String = row.get("backend_id");
                let backend = raw.parse().map_err(|_| DurableError::Corrupt {
                    external_id: external,
                    reason: format!("backend_id '{}' is not a uuid", raw),
                })?;
                Ok(Some(backend))
            }
            None => Ok(None),
        }
    }

    pub async fn terminal(&self, external: Uuid) -> Result<Option<DurableRecord>, DurableError> {
        let row = sqlx::query(
            "SELECT status, results_json, detail FROM job_results WHERE external_id = ?1",
        )
        .bind(external.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };

        let status_raw: String = row.get("status");
        let status = TerminalStatus::parse(&status_raw).ok_or_else(|| DurableError::Corrupt {
            external_id: external,
            reason: format!("status '{}' is not terminal", status_raw),
        })?;

        let results = match row.get::<Option<String>, _>("results_json") {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        };

        Ok(Some(DurableRecord {
            external_id: external,
            status,
            results,
            detail: row.get("detail"),
        }))
    }

    /// Persist a terminal record. Returns whether this call actually wrote:
    /// a record already present stays untouched, making re-writes from
    /// racing polls no-ops.
    pub async fn upsert_terminal(&self, record: &DurableRecord) -> Result<bool, DurableError> {
        let results_json = match &record.results {
            Some(results) => Some(serde_json::to_string(results)?),
            None => None,
        };

        let outcome = sqlx::query(
            "INSERT INTO job_results (external_id, status, results_json, detail) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(external_id) DO NOTHING",
        )
        .bind(record.external_id.to_string())
        .bind(record.status.as_str())
        .bind(results_json)
        .bind(&record.detail)
        .execute(&self.pool)
        .await?;

        Ok(outcome.rows_affected() > 0)
    }
}
