//! SQLite outcome store
//!
//! One row per outcome in a single `outcomes` table. Triggers reject
//! UPDATE and DELETE so the table stays append-only even for writers that
//! bypass this type. `seq` fixes append order across restarts.

use super::OutcomeStore;
use crate::attestation::{format_timestamp, Attestation};
use crate::error::{Error, Result};
use crate::outcome::{Outcome, OutcomeStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS outcomes (
  seq INTEGER PRIMARY KEY AUTOINCREMENT,
  request_id TEXT NOT NULL UNIQUE,
  status TEXT NOT NULL CHECK (status IN ('success', 'error', 'timeout')),
  result_json TEXT NOT NULL,
  traces_json TEXT,
  input_hash TEXT,
  output_hash TEXT,
  latency_ms INTEGER NOT NULL,
  cost_cents REAL NOT NULL,
  break_glass INTEGER NOT NULL CHECK (break_glass IN (0, 1)),
  digest TEXT NOT NULL,
  prev_digest TEXT NOT NULL,
  attested_at TEXT NOT NULL,
  policy_fingerprint TEXT NOT NULL,
  code_version TEXT NOT NULL,
  created_at TEXT NOT NULL
);
CREATE TRIGGER IF NOT EXISTS trg_outcomes_no_update
BEFORE UPDATE ON outcomes
BEGIN
  SELECT RAISE(FAIL, 'outcomes is append-only');
END;
CREATE TRIGGER IF NOT EXISTS trg_outcomes_no_delete
BEFORE DELETE ON outcomes
BEGIN
  SELECT RAISE(FAIL, 'outcomes is append-only');
END;
"#;

const SELECT_COLUMNS: &str = "request_id, status, result_json, traces_json, input_hash, \
     output_hash, latency_ms, cost_cents, break_glass, digest, prev_digest, attested_at, \
     policy_fingerprint, code_version, created_at";

/// Outcome store backed by a SQLite database
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url` and apply the schema.
    ///
    /// Accepts `sqlite::memory:` for a private in-process database.
    pub async fn connect(url: &str) -> Result<Self> {
        let in_memory = url.contains(":memory:");
        if !in_memory {
            ensure_parent_dir(url)?;
        }

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| Error::Config(format!("Invalid database URL {}: {}", url, e)))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        // Every connection to `:memory:` is its own database, so pin one.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(unavailable)?;
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(unavailable)?;

        tracing::debug!(in_memory, "SQLite outcome store ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl OutcomeStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(&self, outcome: &Outcome) -> Result<()> {
        let result_json = serde_json::to_string(&outcome.result)?;
        let traces_json = outcome
            .traces
            .as_ref()
            .map(|t| serde_json::to_string(t))
            .transpose()?;
        let latency_ms = i64::try_from(outcome.latency_ms).unwrap_or(i64::MAX);

        let inserted = sqlx::query(
            "INSERT INTO outcomes (request_id, status, result_json, traces_json, input_hash, \
             output_hash, latency_ms, cost_cents, break_glass, digest, prev_digest, \
             attested_at, policy_fingerprint, code_version, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        )
        .bind(&outcome.request_id)
        .bind(outcome.status.as_str())
        .bind(result_json)
        .bind(traces_json)
        .bind(outcome.input_hash.as_deref())
        .bind(outcome.output_hash.as_deref())
        .bind(latency_ms)
        .bind(outcome.cost_cents)
        .bind(outcome.break_glass)
        .bind(&outcome.attestation.digest)
        .bind(&outcome.attestation.prev_digest)
        .bind(format_timestamp(&outcome.attestation.timestamp))
        .bind(&outcome.attestation.policy_fingerprint)
        .bind(&outcome.attestation.code_version)
        .bind(format_timestamp(&outcome.created_at))
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(Error::DuplicateRequest(outcome.request_id.clone()))
            }
            Err(e) => Err(unavailable(e)),
        }
    }

    async fn get(&self, request_id: &str) -> Result<Outcome> {
        let sql = format!(
            "SELECT {} FROM outcomes WHERE request_id = ?1",
            SELECT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        match row {
            Some(row) => outcome_from_row(&row),
            None => Err(Error::NotFound(request_id.to_string())),
        }
    }

    async fn list(&self) -> Result<Vec<Outcome>> {
        let sql = format!("SELECT {} FROM outcomes ORDER BY seq ASC", SELECT_COLUMNS);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;
        rows.iter().map(outcome_from_row).collect()
    }

    async fn latest_digest(&self) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT digest FROM outcomes ORDER BY seq DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)
    }

    async fn len(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM outcomes")
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn unavailable(err: sqlx::Error) -> Error {
    Error::StorageUnavailable(err.to_string())
}

fn corrupt(column: &str, detail: impl std::fmt::Display) -> Error {
    Error::StorageUnavailable(format!("corrupt {} column: {}", column, detail))
}

fn ensure_parent_dir(url: &str) -> Result<()> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    let path = path.split('?').next().unwrap_or(path);
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn parse_time(column: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| corrupt(column, e))
}

fn outcome_from_row(row: &SqliteRow) -> Result<Outcome> {
    let status: String = row.try_get("status").map_err(unavailable)?;
    let status = OutcomeStatus::from_str(&status).map_err(|e| corrupt("status", e))?;

    let result_json: String = row.try_get("result_json").map_err(unavailable)?;
    let traces_json: Option<String> = row.try_get("traces_json").map_err(unavailable)?;
    let traces = traces_json
        .as_deref()
        .map(|t| serde_json::from_str::<serde_json::Value>(t))
        .transpose()?;

    let latency_ms: i64 = row.try_get("latency_ms").map_err(unavailable)?;
    let attested_at: String = row.try_get("attested_at").map_err(unavailable)?;
    let created_at: String = row.try_get("created_at").map_err(unavailable)?;

    Ok(Outcome {
        request_id: row.try_get("request_id").map_err(unavailable)?,
        status,
        result: serde_json::from_str(&result_json)?,
        traces,
        input_hash: row.try_get("input_hash").map_err(unavailable)?,
        output_hash: row.try_get("output_hash").map_err(unavailable)?,
        latency_ms: u64::try_from(latency_ms).unwrap_or(0),
        cost_cents: row.try_get("cost_cents").map_err(unavailable)?,
        break_glass: row.try_get("break_glass").map_err(unavailable)?,
        attestation: Attestation {
            digest: row.try_get("digest").map_err(unavailable)?,
            prev_digest: row.try_get("prev_digest").map_err(unavailable)?,
            timestamp: parse_time("attested_at", &attested_at)?,
            policy_fingerprint: row.try_get("policy_fingerprint").map_err(unavailable)?,
            code_version: row.try_get("code_version").map_err(unavailable)?,
        },
        created_at: parse_time("created_at", &created_at)?,
    })
}
