//! Runtime state tracking: status of the last run.

use crate::error::DatabaseError;
use crate::types::RunStatus;
use crate::{Error, Result};

use super::Database;

const LAST_RUN_STATUS: &str = "last_run_status";

impl Database {
    /// Status recorded by the previous run, if any
    ///
    /// A value of [`RunStatus::Running`] at startup means the previous
    /// process died without reporting an outcome.
    pub async fn last_run_status(&self) -> Result<Option<RunStatus>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM runtime_state WHERE key = ?")
                .bind(LAST_RUN_STATUS)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to read run status: {}",
                        e
                    )))
                })?;

        Ok(value.as_deref().and_then(RunStatus::parse))
    }

    /// Mark a run as started
    pub async fn set_run_started(&self) -> Result<()> {
        self.set_run_status(RunStatus::Running).await
    }

    /// Mark the current run as completed
    pub async fn set_run_finished(&self) -> Result<()> {
        self.set_run_status(RunStatus::Finished).await
    }

    /// Mark the current run as failed
    pub async fn set_run_failed(&self) -> Result<()> {
        self.set_run_status(RunStatus::Failed).await
    }

    async fn set_run_status(&self, status: RunStatus) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO runtime_state (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(LAST_RUN_STATUS)
        .bind(status.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to set run status: {}",
                e
            )))
        })?;

        Ok(())
    }
}
