use anyhow::Result;

use super::schema::Database;
use super::types::{Entry, NewEntry};

impl Database {
    // ========================================================================
    // Entry Operations
    // ========================================================================

    /// True if any source already has an entry with this GUID
    pub async fn entry_exists_by_guid(&self, guid: &str) -> Result<bool> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entries WHERE guid = ?")
            .bind(guid)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// True if any source already has an entry with this hash signature
    pub async fn entry_exists_by_signature(&self, signature: &str) -> Result<bool> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM entries WHERE hash_signature = ?")
                .bind(signature)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    /// Insert staged entries in one transaction, returning how many landed.
    ///
    /// The unique constraints on `guid` and `hash_signature` are the backstop
    /// against races between concurrent refreshes: a conflicting row is
    /// silently skipped rather than failing the batch.
    pub async fn bulk_insert_entries(&self, entries: &[NewEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for entry in entries {
            let result = sqlx::query(
                r#"
                INSERT INTO entries
                    (source_id, guid, title, summary, content, link, author,
                     published_at, fetched_at, hash_signature)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT DO NOTHING
            "#,
            )
            .bind(entry.source_id)
            .bind(&entry.guid)
            .bind(&entry.title)
            .bind(&entry.summary)
            .bind(&entry.content)
            .bind(&entry.link)
            .bind(&entry.author)
            .bind(entry.published_at)
            .bind(entry.fetched_at)
            .bind(&entry.hash_signature)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                inserted += 1;
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Latest entries across all sources, newest published first (nulls last)
    pub async fn latest_entries(&self, limit: i64) -> Result<Vec<Entry>> {
        let entries = sqlx::query_as::<_, Entry>(
            r#"
            SELECT id, source_id, guid, title, summary, content, link, author,
                   published_at, fetched_at, hash_signature
            FROM entries
            ORDER BY published_at IS NULL, published_at DESC, id DESC
            LIMIT ?
        "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Number of stored entries for one source
    pub async fn count_entries_for_source(&self, source_id: i64) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM entries WHERE source_id = ?")
                .bind(source_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
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

    fn test_entry(source_id: i64, guid: &str, signature: &str) -> NewEntry {
        NewEntry {
            source_id,
            guid: guid.to_string(),
            title: format!("Entry {}", guid),
            summary: Some("summary".to_string()),
            content: None,
            link: Some(format!("https://example.com/{}", guid)),
            author: None,
            published_at: Some(1_704_067_200),
            fetched_at: 1_704_070_000,
            hash_signature: signature.to_string(),
        }
    }

    #[tokio::test]
    async fn test_bulk_insert_counts_new_rows() {
        let (db, source_id) = db_with_source().await;

        let batch = vec![
            test_entry(source_id, "a", "sig-a"),
            test_entry(source_id, "b", "sig-b"),
        ];
        assert_eq!(db.bulk_insert_entries(&batch).await.unwrap(), 2);
        assert_eq!(db.count_entries_for_source(source_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_conflicting_guid_skipped_not_failed() {
        let (db, source_id) = db_with_source().await;

        db.bulk_insert_entries(&[test_entry(source_id, "a", "sig-a")])
            .await
            .unwrap();
        // Same guid, different signature: the unique guid constraint wins
        let inserted = db
            .bulk_insert_entries(&[test_entry(source_id, "a", "sig-other")])
            .await
            .unwrap();
        assert_eq!(inserted, 0);
        assert_eq!(db.count_entries_for_source(source_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_exists_checks() {
        let (db, source_id) = db_with_source().await;
        db.bulk_insert_entries(&[test_entry(source_id, "a", "sig-a")])
            .await
            .unwrap();

        assert!(db.entry_exists_by_guid("a").await.unwrap());
        assert!(!db.entry_exists_by_guid("b").await.unwrap());
        assert!(db.entry_exists_by_signature("sig-a").await.unwrap());
        assert!(!db.entry_exists_by_signature("sig-b").await.unwrap());
    }

    #[tokio::test]
    async fn test_latest_entries_orders_nulls_last() {
        let (db, source_id) = db_with_source().await;

        let mut dated = test_entry(source_id, "dated", "sig-dated");
        dated.published_at = Some(1_704_067_200);
        let mut undated = test_entry(source_id, "undated", "sig-undated");
        undated.published_at = None;

        db.bulk_insert_entries(&[undated, dated]).await.unwrap();

        let entries = db.latest_entries(10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].guid, "dated");
        assert_eq!(entries[1].guid, "undated");
    }
}
