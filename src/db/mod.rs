//! Database layer for catalog-sync
//!
//! Persists import progress in SQLite so an interrupted run can resume where
//! it stopped.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`checkpoint`] - Completed import items per catalog fingerprint
//! - [`state`] - Runtime state (status of the last run)

use sqlx::{FromRow, sqlite::SqlitePool};

mod checkpoint;
mod migrations;
mod state;

/// Completed import item as stored in the checkpoint table
#[derive(Debug, Clone, FromRow)]
pub struct CheckpointRow {
    /// SHA-256 of the catalog file the item belongs to
    pub fingerprint: String,
    /// Absolute index of the item in the flattened catalog
    pub item_index: i64,
    /// Product SKU
    pub sku: String,
    /// Unix timestamp when the item was completed
    pub completed_at: i64,
}

/// Checkpoint database handle
pub struct Database {
    pool: SqlitePool,
}
