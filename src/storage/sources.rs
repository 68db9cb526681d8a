use anyhow::Result;
use chrono::Utc;

use super::schema::Database;
use super::types::{NewSource, Source};

impl Database {
    // ========================================================================
    // Source Operations
    // ========================================================================

    /// Register a new source and return the stored row
    pub async fn create_source(&self, new: NewSource) -> Result<Source> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO sources
                (name, feed_url, homepage_url, description, is_active,
                 sync_interval_minutes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(&new.name)
        .bind(&new.feed_url)
        .bind(&new.homepage_url)
        .bind(&new.description)
        .bind(new.is_active)
        .bind(new.sync_interval_minutes)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get_source(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("source {} vanished after insert", id))
    }

    /// Get all sources, ordered by id
    pub async fn list_sources(&self) -> Result<Vec<Source>> {
        let sources = sqlx::query_as::<_, Source>(
            r#"
            SELECT id, name, feed_url, homepage_url, description, is_active,
                   sync_interval_minutes, last_synced_at, created_at, updated_at
            FROM sources
            ORDER BY id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(sources)
    }

    /// Get the sources eligible for scheduled refresh
    pub async fn list_active_sources(&self) -> Result<Vec<Source>> {
        let sources = sqlx::query_as::<_, Source>(
            r#"
            SELECT id, name, feed_url, homepage_url, description, is_active,
                   sync_interval_minutes, last_synced_at, created_at, updated_at
            FROM sources
            WHERE is_active = 1
            ORDER BY id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(sources)
    }

    /// Get a single source by id
    pub async fn get_source(&self, source_id: i64) -> Result<Option<Source>> {
        let source = sqlx::query_as::<_, Source>(
            r#"
            SELECT id, name, feed_url, homepage_url, description, is_active,
                   sync_interval_minutes, last_synced_at, created_at, updated_at
            FROM sources
            WHERE id = ?
        "#,
        )
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(source)
    }

    /// Get a single source by its feed URL
    pub async fn get_source_by_feed_url(&self, feed_url: &str) -> Result<Option<Source>> {
        let source = sqlx::query_as::<_, Source>(
            r#"
            SELECT id, name, feed_url, homepage_url, description, is_active,
                   sync_interval_minutes, last_synced_at, created_at, updated_at
            FROM sources
            WHERE feed_url = ?
        "#,
        )
        .bind(feed_url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(source)
    }

    /// Record a successful sync at the given unix timestamp
    pub async fn update_last_synced(&self, source_id: i64, timestamp: i64) -> Result<()> {
        sqlx::query("UPDATE sources SET last_synced_at = ?, updated_at = ? WHERE id = ?")
            .bind(timestamp)
            .bind(timestamp)
            .bind(source_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Enable or disable a source
    pub async fn set_source_active(&self, source_id: i64, is_active: bool) -> Result<()> {
        let now = Utc::now().timestamp();
        sqlx::query("UPDATE sources SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(is_active)
            .bind(now)
            .bind(source_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
