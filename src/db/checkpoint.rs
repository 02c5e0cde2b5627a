//! Import checkpoint: which catalog items have been completed.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::{CheckpointRow, Database};

impl Database {
    /// Record that item `index` of the catalog with `fingerprint` is done
    ///
    /// Recording the same item twice refreshes its timestamp.
    pub async fn record_completed(&self, fingerprint: &str, index: usize, sku: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO import_checkpoint (fingerprint, item_index, sku, completed_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(fingerprint, item_index) DO UPDATE SET sku = excluded.sku, completed_at = excluded.completed_at
            "#,
        )
        .bind(fingerprint)
        .bind(index as i64)
        .bind(sku)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to record checkpoint: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Number of leading items (0, 1, 2, ...) completed without a gap
    ///
    /// Workers finish out of order, so items past the first gap may be done
    /// too; they are skipped as already imported when the run resumes.
    pub async fn completed_prefix_len(&self, fingerprint: &str) -> Result<usize> {
        let indices: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT item_index FROM import_checkpoint
            WHERE fingerprint = ?
            ORDER BY item_index ASC
            "#,
        )
        .bind(fingerprint)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to read checkpoint: {}",
                e
            )))
        })?;

        let prefix = indices
            .iter()
            .enumerate()
            .take_while(|(expected, index)| **index == *expected as i64)
            .count();

        Ok(prefix)
    }

    /// All completed items for `fingerprint`, ordered by index
    pub async fn checkpoint_entries(&self, fingerprint: &str) -> Result<Vec<CheckpointRow>> {
        let rows = sqlx::query_as::<_, CheckpointRow>(
            r#"
            SELECT fingerprint, item_index, sku, completed_at
            FROM import_checkpoint
            WHERE fingerprint = ?
            ORDER BY item_index ASC
            "#,
        )
        .bind(fingerprint)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list checkpoint entries: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Forget every completed item of `fingerprint`
    pub async fn clear_checkpoint(&self, fingerprint: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM import_checkpoint WHERE fingerprint = ?")
            .bind(fingerprint)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to clear checkpoint: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected())
    }
}
