//! SQLite Database
//!
//! Embedded database for the dialer's durable client state using rusqlite with
//! r2d2 connection pooling:
//!
//! - `settings` - key/value pairs (the last dialed number lives here)
//! - `call_logs` - outbox of recorded call attempts and their upload status

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, TransactionBehavior};

use crate::models::call::{CallAttempt, CallChannel, CallOutcome};
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::database_path;

/// Settings key of the last dialed number
pub const LAST_DIALED_NUMBER_KEY: &str = "last_dialed_number";

/// Upload status of a call log row
///
/// `Uploading` rows are owned by an upload worker; only `Pending` rows may be
/// claimed for another upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Pending,
    Uploading,
    Synced,
}

impl SyncStatus {
    fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Uploading => "uploading",
            SyncStatus::Synced => "synced",
        }
    }
}

/// Raw call log row from the database
#[derive(Debug, Clone)]
pub struct CallLogRow {
    pub id: String,
    pub contact_id: Option<i64>,
    pub contact_name: String,
    pub phone_number: String,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub duration_secs: Option<i64>,
    pub outcome: String,
    pub channel: Option<String>,
    pub error_kind: Option<String>,
    pub sync_status: String,
    pub sync_error: Option<String>,
}

impl CallLogRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            contact_id: row.get(1)?,
            contact_name: row.get(2)?,
            phone_number: row.get(3)?,
            started_at: row.get(4)?,
            ended_at: row.get(5)?,
            duration_secs: row.get(6)?,
            outcome: row.get(7)?,
            channel: row.get(8)?,
            error_kind: row.get(9)?,
            sync_status: row.get(10)?,
            sync_error: row.get(11)?,
        })
    }

    /// Convert the raw row back into a `CallAttempt`
    pub fn into_attempt(self) -> AppResult<CallAttempt> {
        let outcome = CallOutcome::parse(&self.outcome)
            .ok_or_else(|| AppError::database(format!("Unknown call outcome: {}", self.outcome)))?;
        let channel = match self.channel.as_deref() {
            Some(c) => Some(
                CallChannel::parse(c)
                    .ok_or_else(|| AppError::database(format!("Unknown call channel: {}", c)))?,
            ),
            None => None,
        };
        let error_kind = match self.error_kind {
            Some(kind) => Some(serde_json::from_value(serde_json::Value::String(kind))?),
            None => None,
        };

        Ok(CallAttempt {
            id: self.id,
            contact_id: self.contact_id,
            contact_name: self.contact_name,
            phone_number: self.phone_number,
            started_at: parse_timestamp(&self.started_at)?,
            ended_at: self.ended_at.as_deref().map(parse_timestamp).transpose()?,
            duration_secs: self.duration_secs,
            outcome,
            channel,
            error_kind,
        })
    }
}

fn parse_timestamp(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::database(format!("Invalid timestamp '{}': {}", value, e)))
}

const CALL_LOG_COLUMNS: &str = "id, contact_id, contact_name, phone_number, started_at, ended_at,
     duration_secs, outcome, channel, error_kind, sync_status, sync_error";

/// Type alias for the connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Database service for managing SQLite operations
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create an in-memory database for testing.
    pub fn new_in_memory() -> AppResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    /// Create a new database instance with connection pooling
    pub fn new() -> AppResult<Self> {
        Self::open(&database_path()?)
    }

    /// Open (or create) the database file at `db_path`
    pub fn open(db_path: &Path) -> AppResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;

        Ok(db)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> AppResult<()> {
        let conn = self.get_connection()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS call_logs (
                id TEXT PRIMARY KEY,
                contact_id INTEGER,
                contact_name TEXT NOT NULL,
                phone_number TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                duration_secs INTEGER,
                outcome TEXT NOT NULL,
                channel TEXT,
                error_kind TEXT,
                sync_status TEXT NOT NULL DEFAULT 'pending',
                sync_error TEXT,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_call_logs_started_at ON call_logs(started_at DESC)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_call_logs_sync_status ON call_logs(sync_status)",
            [],
        )?;

        // No worker survives a restart
        let interrupted = conn.execute(
            "UPDATE call_logs SET sync_status = ?1 WHERE sync_status = ?2",
            params![SyncStatus::Pending.as_str(), SyncStatus::Uploading.as_str()],
        )?;
        if interrupted > 0 {
            tracing::info!("Returned {} interrupted call log upload(s) to pending", interrupted);
        }

        Ok(())
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> AppResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    /// Check if the database is reachable
    pub fn is_healthy(&self) -> bool {
        if let Ok(conn) = self.pool.get() {
            conn.query_row("SELECT 1", [], |_| Ok(())).is_ok()
        } else {
            false
        }
    }

    // ========================================================================
    // Settings Operations
    // ========================================================================

    /// Get a setting value by key
    pub fn get_setting(&self, key: &str) -> AppResult<Option<String>> {
        let conn = self.get_connection()?;
        let result = conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::database(e.to_string())),
        }
    }

    /// Set a setting value, overwriting any previous value
    pub fn set_setting(&self, key: &str, value: &str) -> AppResult<()> {
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = CURRENT_TIMESTAMP",
            params![key, value],
        )?;
        Ok(())
    }

    // ========================================================================
    // Call Log Operations
    // ========================================================================

    /// Insert a recorded call attempt into the outbox. The row starts as
    /// `uploading`: the caller queues its upload right away.
    pub fn insert_call_log(&self, attempt: &CallAttempt) -> AppResult<()> {
        let error_kind = match attempt.error_kind {
            Some(kind) => serde_json::to_value(kind)?.as_str().map(str::to_string),
            None => None,
        };

        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO call_logs (id, contact_id, contact_name, phone_number, started_at,
                ended_at, duration_secs, outcome, channel, error_kind, sync_status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                attempt.id,
                attempt.contact_id,
                attempt.contact_name,
                attempt.phone_number,
                attempt.started_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
                attempt
                    .ended_at
                    .map(|t| t.to_rfc3339_opts(SecondsFormat::Nanos, true)),
                attempt.duration_secs,
                attempt.outcome.as_str(),
                attempt.channel.map(|c| c.as_str()),
                error_kind,
                SyncStatus::Uploading.as_str(),
            ],
        )?;
        Ok(())
    }

    /// Get a single call log by id
    pub fn get_call_log(&self, id: &str) -> AppResult<Option<CallLogRow>> {
        let conn = self.get_connection()?;
        let result = conn.query_row(
            &format!("SELECT {} FROM call_logs WHERE id = ?1", CALL_LOG_COLUMNS),
            params![id],
            CallLogRow::from_row,
        );

        match result {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::database(e.to_string())),
        }
    }

    /// List the most recent call logs, newest first
    pub fn list_call_logs(&self, limit: usize) -> AppResult<Vec<CallLogRow>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM call_logs ORDER BY started_at DESC, rowid DESC LIMIT ?1",
            CALL_LOG_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![limit as i64], CallLogRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Claim every `pending` call log for upload, oldest first. Claimed rows
    /// move to `uploading`, so a second claim never returns them again.
    pub fn claim_pending_call_logs(&self) -> AppResult<Vec<CallLogRow>> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let rows = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM call_logs WHERE sync_status = ?1 ORDER BY started_at ASC, rowid ASC",
                CALL_LOG_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![SyncStatus::Pending.as_str()], CallLogRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        tx.execute(
            "UPDATE call_logs SET sync_status = ?1 WHERE sync_status = ?2",
            params![SyncStatus::Uploading.as_str(), SyncStatus::Pending.as_str()],
        )?;
        tx.commit()?;
        Ok(rows)
    }

    /// Number of call logs the backend has not accepted yet
    pub fn count_unsynced_call_logs(&self) -> AppResult<usize> {
        let conn = self.get_connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM call_logs WHERE sync_status != ?1",
            params![SyncStatus::Synced.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Mark a call log as accepted by the backend
    pub fn mark_call_log_synced(&self, id: &str) -> AppResult<()> {
        let conn = self.get_connection()?;
        conn.execute(
            "UPDATE call_logs SET sync_status = ?1, sync_error = NULL WHERE id = ?2",
            params![SyncStatus::Synced.as_str(), id],
        )?;
        Ok(())
    }

    /// Return a call log to `pending` and remember why the upload failed
    pub fn mark_call_log_sync_failed(&self, id: &str, error: &str) -> AppResult<()> {
        let conn = self.get_connection()?;
        conn.execute(
            "UPDATE call_logs SET sync_status = ?1, sync_error = ?2 WHERE id = ?3",
            params![SyncStatus::Pending.as_str(), error, id],
        )?;
        Ok(())
    }
}
