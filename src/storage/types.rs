use std::fmt;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process has the database locked
    #[error("The database is locked by another process. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        // SQLITE_CANTOPEN (14): unable to open database file
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A configured feed endpoint that the scheduler keeps fresh.
///
/// All timestamps are unix seconds (UTC). `sync_interval_minutes` is a
/// per-source override of the global scheduler interval; `None` means the
/// global value applies.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub feed_url: String,
    pub homepage_url: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
    pub sync_interval_minutes: Option<i64>,
    pub last_synced_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields required to register a new source
#[derive(Debug, Clone)]
pub struct NewSource {
    pub name: String,
    pub feed_url: String,
    pub homepage_url: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
    pub sync_interval_minutes: Option<i64>,
}

/// A syndicated item extracted from a feed and persisted.
///
/// `guid` and `hash_signature` are each globally unique across all sources;
/// either one matching an existing row blocks insertion.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Entry {
    pub id: i64,
    pub source_id: i64,
    pub guid: String,
    pub title: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub link: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<i64>,
    pub fetched_at: i64,
    pub hash_signature: String,
}

/// An entry staged for insertion by the materializer
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub source_id: i64,
    pub guid: String,
    pub title: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub link: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<i64>,
    pub fetched_at: i64,
    pub hash_signature: String,
}

/// Outcome of one refresh attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Success,
    Error,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::Success => "success",
            FetchStatus::Error => "error",
        }
    }

    pub(crate) fn from_db(value: &str) -> Self {
        match value {
            "success" => FetchStatus::Success,
            _ => FetchStatus::Error,
        }
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of one refresh attempt, written exactly once per
/// orchestrator invocation whether the refresh succeeded or failed.
#[derive(Debug, Clone)]
pub struct FetchLog {
    pub id: i64,
    pub source_id: i64,
    pub status: FetchStatus,
    pub started_at: i64,
    pub finished_at: i64,
    pub error_message: Option<String>,
    pub entries_fetched: i64,
}

/// Internal row type for FetchLog queries (used by sqlx FromRow).
/// Converts to FetchLog via into_log() with status decoding.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FetchLogRow {
    pub id: i64,
    pub source_id: i64,
    pub status: String,
    pub started_at: i64,
    pub finished_at: i64,
    pub error_message: Option<String>,
    pub entries_fetched: i64,
}

impl FetchLogRow {
    pub(crate) fn into_log(self) -> FetchLog {
        FetchLog {
            id: self.id,
            source_id: self.source_id,
            status: FetchStatus::from_db(&self.status),
            started_at: self.started_at,
            finished_at: self.finished_at,
            error_message: self.error_message,
            entries_fetched: self.entries_fetched,
        }
    }
}
