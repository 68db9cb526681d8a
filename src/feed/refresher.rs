//! Single-source refresh orchestration.
//!
//! One invocation runs fetch → parse → dedup → persist for exactly one source
//! and records exactly one fetch log, whatever happens along the way. Pipeline
//! failures never escape as errors: they become an error-status log and a
//! normal return value. Only caller-input problems (unknown or inactive
//! source) surface as [`RefreshError`], and those occur before any log is
//! written.

use anyhow::Result;
use chrono::Utc;
use std::time::Duration;
use thiserror::Error;

use crate::feed::dedup::materialize_entries;
use crate::feed::fetcher::{fetch_feed, FetchError};
use crate::feed::parser::{parse_entries, ParseError};
use crate::storage::{Database, FetchLog, FetchStatus, Source};

/// Message recorded when the pipeline fails for a reason that is neither a
/// fetch nor a parse error. Internal details go to the log output only.
const INTERNAL_ERROR_MESSAGE: &str = "internal error during refresh";

/// Caller-input errors on a manual refresh. Raised before any fetch log is
/// written; not retried automatically.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("source {0} not found")]
    NotFound(i64),
    #[error("source {0} is inactive and cannot be refreshed")]
    Inactive(i64),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Per-refresh settings handed down from configuration
#[derive(Debug, Clone)]
pub struct RefreshOptions {
    pub http_timeout: Duration,
    pub user_agent: String,
}

/// The refreshed source state plus the fetch log for this attempt
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub source: Source,
    pub log: FetchLog,
}

enum PipelineError {
    Fetch(FetchError),
    Parse(ParseError),
    Internal(anyhow::Error),
}

/// Refresh one source end to end.
///
/// Side effects: exactly one fetch-log insert on every path; zero or more
/// entry inserts and one `last_synced_at` update on the success path only.
pub async fn refresh_source(
    db: &Database,
    client: &reqwest::Client,
    options: &RefreshOptions,
    source_id: i64,
) -> Result<RefreshOutcome, RefreshError> {
    let source = db
        .get_source(source_id)
        .await?
        .ok_or(RefreshError::NotFound(source_id))?;
    if !source.is_active {
        return Err(RefreshError::Inactive(source_id));
    }

    let started_at = Utc::now().timestamp();

    let (status, error_message, entries_fetched) =
        match run_pipeline(db, client, options, &source).await {
            Ok(inserted) => {
                tracing::info!(
                    source_id = source.id,
                    entries = inserted,
                    "Source refreshed"
                );
                (FetchStatus::Success, None, inserted as i64)
            }
            Err(PipelineError::Fetch(e)) => {
                tracing::error!(source_id = source.id, error = %e, "Feed fetch failed");
                (FetchStatus::Error, Some(e.to_string()), 0)
            }
            Err(PipelineError::Parse(e)) => {
                tracing::error!(source_id = source.id, error = %e, "Feed parse failed");
                (FetchStatus::Error, Some(e.to_string()), 0)
            }
            Err(PipelineError::Internal(e)) => {
                // Full detail to the log only; the recorded message stays generic
                tracing::error!(
                    source_id = source.id,
                    error = %e,
                    "Unexpected failure during refresh"
                );
                (FetchStatus::Error, Some(INTERNAL_ERROR_MESSAGE.to_string()), 0)
            }
        };

    let finished_at = Utc::now().timestamp();
    let log = db
        .create_fetch_log(
            source.id,
            status,
            started_at,
            finished_at,
            error_message.as_deref(),
            entries_fetched,
        )
        .await?;

    if status == FetchStatus::Success {
        db.update_last_synced(source.id, finished_at).await?;
    }

    let refreshed = db
        .get_source(source.id)
        .await?
        .ok_or(RefreshError::NotFound(source.id))?;

    Ok(RefreshOutcome {
        source: refreshed,
        log,
    })
}

async fn run_pipeline(
    db: &Database,
    client: &reqwest::Client,
    options: &RefreshOptions,
    source: &Source,
) -> Result<usize, PipelineError> {
    let feed_text = fetch_feed(
        client,
        &source.feed_url,
        options.http_timeout,
        &options.user_agent,
    )
    .await
    .map_err(PipelineError::Fetch)?;

    let candidates = parse_entries(&feed_text).map_err(PipelineError::Parse)?;

    let staged = materialize_entries(db, source, candidates, Utc::now().timestamp())
        .await
        .map_err(PipelineError::Internal)?;

    db.bulk_insert_entries(&staged)
        .await
        .map_err(PipelineError::Internal)
}
