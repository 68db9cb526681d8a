//! Autonomous refresh scheduling.
//!
//! One long-lived background task periodically fans out to a bounded set of
//! concurrent refreshes for every due source, then fans back in and sleeps for
//! the configured interval. The scheduler is an explicit instance with
//! injected configuration and store handle; its lifecycle is owned by the
//! hosting process.

use anyhow::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::feed::refresher::{refresh_source, RefreshOptions};
use crate::storage::{Database, FetchStatus, Source};

/// Pause after an iteration-level failure before retrying the loop
const ERROR_BACKOFF: Duration = Duration::from_secs(60);

/// Scheduler settings handed down from configuration
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Global interval between iterations, and the default due threshold for
    /// sources without a per-source override.
    pub sync_interval_minutes: u64,
    /// Bounded width of the concurrent fan-out per iteration.
    pub max_concurrent_fetches: usize,
    /// Timeout for each feed fetch.
    pub http_timeout: Duration,
    /// User-Agent header sent with feed requests.
    pub user_agent: String,
}

/// Periodically refreshes due sources until stopped.
///
/// `start` and `stop` are idempotent. Stopping cancels the inter-iteration
/// sleep and waits for any in-flight refresh fan-out to drain before
/// returning, so store state is never left mid-write by a shutdown.
pub struct Scheduler {
    db: Database,
    client: reqwest::Client,
    options: SchedulerOptions,
    task: Option<JoinHandle<()>>,
    shutdown: Option<watch::Sender<bool>>,
}

impl Scheduler {
    pub fn new(db: Database, client: reqwest::Client, options: SchedulerOptions) -> Self {
        Self {
            db,
            client,
            options,
            task: None,
            shutdown: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Spawn the background loop. A no-op (with a warning) if already running.
    pub fn start(&mut self) {
        if self.task.is_some() {
            tracing::warn!("Scheduler is already running");
            return;
        }

        tracing::info!(
            interval_minutes = self.options.sync_interval_minutes,
            max_concurrent = self.options.max_concurrent_fetches,
            "Starting refresh scheduler"
        );

        let (tx, rx) = watch::channel(false);
        let db = self.db.clone();
        let client = self.client.clone();
        let options = self.options.clone();

        self.shutdown = Some(tx);
        self.task = Some(tokio::spawn(run_loop(db, client, options, rx)));
    }

    /// Stop the background loop and wait for in-flight work to finish.
    /// A no-op if the scheduler is not running.
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };

        if let Some(tx) = self.shutdown.take() {
            // Receiver may already be gone if the loop exited on its own
            let _ = tx.send(true);
        }

        if task.await.is_err() {
            tracing::error!("Scheduler task panicked before shutdown");
        }
        tracing::info!("Scheduler stopped");
    }
}

async fn run_loop(
    db: Database,
    client: reqwest::Client,
    options: SchedulerOptions,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let pause = match run_iteration(&db, &client, &options).await {
            Ok(()) => Duration::from_secs(options.sync_interval_minutes * 60),
            Err(e) => {
                tracing::error!(error = %e, "Scheduler iteration failed, backing off");
                ERROR_BACKOFF
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = shutdown.changed() => {
                tracing::debug!("Scheduler loop received shutdown");
                break;
            }
        }
    }
}

/// One scheduler iteration: list active sources, refresh every due one with
/// bounded concurrency. Individual failures are logged and never abort the
/// siblings or the loop.
async fn run_iteration(
    db: &Database,
    client: &reqwest::Client,
    options: &SchedulerOptions,
) -> Result<()> {
    let sources = db.list_active_sources().await?;
    let now = Utc::now().timestamp();

    let due: Vec<Source> = sources
        .into_iter()
        .filter(|s| is_due(s, now, options.sync_interval_minutes))
        .collect();

    if due.is_empty() {
        tracing::debug!("No sources due for refresh");
        return Ok(());
    }

    tracing::info!(due = due.len(), "Refreshing due sources");

    let refresh_options = RefreshOptions {
        http_timeout: options.http_timeout,
        user_agent: options.user_agent.clone(),
    };

    let results: Vec<(i64, _)> = stream::iter(due)
        .map(|source| {
            // Each task gets its own store handle; queries inside check out
            // independent pool connections, so sessions are never shared
            // across concurrent refreshes.
            let db = db.clone();
            let client = client.clone();
            let refresh_options = refresh_options.clone();

            async move {
                let result = refresh_source(&db, &client, &refresh_options, source.id).await;
                (source.id, result)
            }
        })
        .buffer_unordered(options.max_concurrent_fetches)
        .collect()
        .await;

    for (source_id, result) in results {
        match result {
            Ok(outcome) if outcome.log.status == FetchStatus::Success => {
                tracing::debug!(
                    source_id,
                    entries = outcome.log.entries_fetched,
                    "Scheduled refresh succeeded"
                );
            }
            Ok(outcome) => {
                tracing::warn!(
                    source_id,
                    error = outcome.log.error_message.as_deref().unwrap_or("unknown"),
                    "Scheduled refresh recorded an error"
                );
            }
            Err(e) => {
                tracing::error!(source_id, error = %e, "Scheduled refresh failed");
            }
        }
    }

    Ok(())
}

/// A source is due when it has never synced, or when its last sync is
/// strictly older than now minus its interval. The per-source interval
/// override wins over the global value when set.
fn is_due(source: &Source, now: i64, global_interval_minutes: u64) -> bool {
    let interval_minutes = source
        .sync_interval_minutes
        .unwrap_or(global_interval_minutes as i64);
    let threshold = now - interval_minutes * 60;

    match source.last_synced_at {
        None => true,
        Some(last_synced) => last_synced < threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NewSource;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item><guid>sched-1</guid><title>Scheduled</title></item>
</channel></rss>"#;

    fn source_fixture(last_synced_at: Option<i64>, interval: Option<i64>) -> Source {
        Source {
            id: 1,
            name: "Test".to_string(),
            feed_url: "https://example.com/feed".to_string(),
            homepage_url: None,
            description: None,
            is_active: true,
            sync_interval_minutes: interval,
            last_synced_at,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn test_options(interval_minutes: u64) -> SchedulerOptions {
        SchedulerOptions {
            sync_interval_minutes: interval_minutes,
            max_concurrent_fetches: 3,
            http_timeout: Duration::from_secs(5),
            user_agent: "feedwell/test".to_string(),
        }
    }

    #[test]
    fn test_never_synced_source_is_always_due() {
        let source = source_fixture(None, None);
        assert!(is_due(&source, 1_000_000, 10));
    }

    #[test]
    fn test_source_synced_exactly_at_threshold_is_not_due() {
        let now = 1_000_000;
        let source = source_fixture(Some(now - 10 * 60), None);
        assert!(!is_due(&source, now, 10));
    }

    #[test]
    fn test_source_synced_before_threshold_is_due() {
        let now = 1_000_000;
        let source = source_fixture(Some(now - 10 * 60 - 1), None);
        assert!(is_due(&source, now, 10));
    }

    #[test]
    fn test_recently_synced_source_is_not_due() {
        let now = 1_000_000;
        let source = source_fixture(Some(now - 60), None);
        assert!(!is_due(&source, now, 10));
    }

    #[test]
    fn test_per_source_interval_overrides_global() {
        let now = 1_000_000;
        // Synced 30 minutes ago: due under the global 10, but the source
        // carries a 60-minute override
        let source = source_fixture(Some(now - 30 * 60), Some(60));
        assert!(!is_due(&source, now, 10));

        // And the reverse: a 5-minute override makes it due despite a lazy
        // global interval
        let source = source_fixture(Some(now - 30 * 60), Some(5));
        assert!(is_due(&source, now, 120));
    }

    #[tokio::test]
    async fn test_iteration_refreshes_due_sources_only() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let db = Database::open(":memory:").await.unwrap();
        let due = db
            .create_source(NewSource {
                name: "Due".to_string(),
                feed_url: format!("{}/due.xml", mock_server.uri()),
                homepage_url: None,
                description: None,
                is_active: true,
                sync_interval_minutes: None,
            })
            .await
            .unwrap();
        let fresh = db
            .create_source(NewSource {
                name: "Fresh".to_string(),
                feed_url: format!("{}/fresh.xml", mock_server.uri()),
                homepage_url: None,
                description: None,
                is_active: true,
                sync_interval_minutes: None,
            })
            .await
            .unwrap();
        db.update_last_synced(fresh.id, Utc::now().timestamp())
            .await
            .unwrap();

        let client = reqwest::Client::new();
        run_iteration(&db, &client, &test_options(10)).await.unwrap();

        // Never-synced source refreshed, recently-synced one untouched
        assert_eq!(db.fetch_logs_for_source(due.id).await.unwrap().len(), 1);
        assert!(db.fetch_logs_for_source(fresh.id).await.unwrap().is_empty());
        assert_eq!(db.count_entries_for_source(due.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failing_source_does_not_abort_siblings() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let db = Database::open(":memory:").await.unwrap();
        let broken = db
            .create_source(NewSource {
                name: "Broken".to_string(),
                // Nothing listens here, so the fetch fails fast
                feed_url: "http://127.0.0.1:1/feed".to_string(),
                homepage_url: None,
                description: None,
                is_active: true,
                sync_interval_minutes: None,
            })
            .await
            .unwrap();
        let healthy = db
            .create_source(NewSource {
                name: "Healthy".to_string(),
                feed_url: format!("{}/feed.xml", mock_server.uri()),
                homepage_url: None,
                description: None,
                is_active: true,
                sync_interval_minutes: None,
            })
            .await
            .unwrap();

        let client = reqwest::Client::new();
        run_iteration(&db, &client, &test_options(10)).await.unwrap();

        let broken_logs = db.fetch_logs_for_source(broken.id).await.unwrap();
        assert_eq!(broken_logs.len(), 1);
        assert_eq!(broken_logs[0].status, FetchStatus::Error);

        let healthy_logs = db.fetch_logs_for_source(healthy.id).await.unwrap();
        assert_eq!(healthy_logs.len(), 1);
        assert_eq!(healthy_logs[0].status, FetchStatus::Success);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        let mut scheduler = Scheduler::new(db, reqwest::Client::new(), test_options(10));

        scheduler.start();
        assert!(scheduler.is_running());
        // Second start is a warning-level no-op
        scheduler.start();
        assert!(scheduler.is_running());

        scheduler.stop().await;
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let db = Database::open(":memory:").await.unwrap();
        let mut scheduler = Scheduler::new(db, reqwest::Client::new(), test_options(10));

        scheduler.stop().await;
        assert!(!scheduler.is_running());
        // And stopping twice is fine too
        scheduler.stop().await;
    }
}
