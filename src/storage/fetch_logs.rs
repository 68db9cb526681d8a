use anyhow::Result;

use super::schema::Database;
use super::types::{FetchLog, FetchLogRow, FetchStatus};

impl Database {
    // ========================================================================
    // Fetch Log Operations
    // ========================================================================

    /// Record the outcome of one refresh attempt.
    ///
    /// A single INSERT, so the write is atomic from the store's perspective.
    /// Logs are never updated or deleted afterwards.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_fetch_log(
        &self,
        source_id: i64,
        status: FetchStatus,
        started_at: i64,
        finished_at: i64,
        error_message: Option<&str>,
        entries_fetched: i64,
    ) -> Result<FetchLog> {
        let result = sqlx::query(
            r#"
            INSERT INTO fetch_logs
                (source_id, status, started_at, finished_at, error_message, entries_fetched)
            VALUES (?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(source_id)
        .bind(status.as_str())
        .bind(started_at)
        .bind(finished_at)
        .bind(error_message)
        .bind(entries_fetched)
        .execute(&self.pool)
        .await?;

        Ok(FetchLog {
            id: result.last_insert_rowid(),
            source_id,
            status,
            started_at,
            finished_at,
            error_message: error_message.map(str::to_string),
            entries_fetched,
        })
    }

    /// All fetch logs for one source, newest first
    pub async fn fetch_logs_for_source(&self, source_id: i64) -> Result<Vec<FetchLog>> {
        let rows = sqlx::query_as::<_, FetchLogRow>(
            r#"
            SELECT id, source_id, status, started_at, finished_at, error_message,
                   entries_fetched
            FROM fetch_logs
            WHERE source_id = ?
            ORDER BY id DESC
        "#,
        )
        .bind(source_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FetchLogRow::into_log).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NewSource;

    async fn db_with_source() -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let source = db
            .create_source(NewSource {
                name: "Example".to_string(),
                feed_url: "https://example.com/feed.xml".to_string(),
                homepage_url: None,
                description: None,
                is_active: true,
                sync_interval_minutes: None,
            })
            .await
            .unwrap();
        (db, source.id)
    }

    #[tokio::test]
    async fn test_create_and_list_fetch_logs() {
        let (db, source_id) = db_with_source().await;

        let success = db
            .create_fetch_log(source_id, FetchStatus::Success, 100, 105, None, 3)
            .await
            .unwrap();
        assert!(success.id > 0);
        assert_eq!(success.status, FetchStatus::Success);

        let failure = db
            .create_fetch_log(
                source_id,
                FetchStatus::Error,
                200,
                201,
                Some("connection refused"),
                0,
            )
            .await
            .unwrap();
        assert_eq!(failure.entries_fetched, 0);

        let logs = db.fetch_logs_for_source(source_id).await.unwrap();
        assert_eq!(logs.len(), 2);
        // Newest first
        assert_eq!(logs[0].status, FetchStatus::Error);
        assert_eq!(logs[0].error_message.as_deref(), Some("connection refused"));
        assert_eq!(logs[1].status, FetchStatus::Success);
        assert_eq!(logs[1].entries_fetched, 3);
    }
}
