//! Core types for catalog-sync

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::client::EntityKind;

/// Phase of a sync run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// Not started yet
    Idle,
    /// Deleting existing remote products, categories and product types
    Resetting,
    /// Creating or reusing the category tree
    BuildingTaxonomy,
    /// Importing products
    Importing,
    /// Finished successfully
    Done,
    /// Aborted by an error
    Failed,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Resetting => "resetting",
            SyncPhase::BuildingTaxonomy => "building_taxonomy",
            SyncPhase::Importing => "importing",
            SyncPhase::Done => "done",
            SyncPhase::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Run status persisted in the checkpoint database
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// A run started and has not reported an outcome
    Running,
    /// The last run completed
    Finished,
    /// The last run failed
    Failed,
}

impl RunStatus {
    /// Value stored in `runtime_state`
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Finished => "finished",
            RunStatus::Failed => "failed",
        }
    }

    /// Parse a stored value; unknown values map to `None`
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "running" => Some(RunStatus::Running),
            "finished" => Some(RunStatus::Finished),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

/// Event emitted during a sync run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// The run moved to a new phase
    PhaseChanged {
        /// New phase
        phase: SyncPhase,
    },

    /// One bulk delete batch finished
    EntitiesDeleted {
        /// Entity family
        #[serde(with = "entity_kind_serde")]
        kind: EntityKind,
        /// Entities actually deleted in this batch
        count: usize,
    },

    /// A category was created or reused
    CategoryReady {
        /// Joined category path
        path: String,
        /// Remote id
        id: String,
        /// Whether it already existed remotely
        reused: bool,
    },

    /// A catalog item was processed
    ItemCompleted {
        /// Absolute index in the flattened catalog
        index: usize,
        /// Product SKU
        sku: String,
        /// Whether the product already existed and was skipped
        skipped: bool,
        /// Items processed so far in this run
        completed: usize,
        /// Items in this run's window
        total: usize,
    },

    /// The run completed
    Finished {
        /// Final report
        report: SyncReport,
    },

    /// The run failed
    Failed {
        /// Phase in which the error occurred
        phase: SyncPhase,
        /// Error message
        error: String,
    },
}

/// Outcome of the reset phase
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetReport {
    /// Products deleted
    pub products_deleted: usize,
    /// Categories deleted, summed over all cycles
    pub categories_deleted: usize,
    /// Fetch-delete cycles needed to drain the category tree
    pub category_cycles: usize,
    /// Product types deleted
    pub product_types_deleted: usize,
}

/// Outcome of the import phase
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    /// Items in the processed window
    pub total: usize,
    /// Products created
    pub imported: usize,
    /// Products skipped because their SKU already existed
    pub skipped: usize,
}

/// Outcome of a full sync run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Reset results (`None` when reset was skipped)
    pub reset: Option<ResetReport>,
    /// Categories created during the taxonomy phase
    pub categories_created: usize,
    /// Categories that already existed and were reused
    pub categories_reused: usize,
    /// Offset the import window started at
    pub offset: usize,
    /// Import results
    pub import: ImportReport,
    /// Wall-clock duration of the run
    #[serde(with = "crate::config::duration_millis_serde")]
    pub elapsed: Duration,
}

mod entity_kind_serde {
    use crate::client::EntityKind;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(kind: &EntityKind, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&kind.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<EntityKind, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        match value.as_str() {
            "product" => Ok(EntityKind::Product),
            "category" => Ok(EntityKind::Category),
            "product type" => Ok(EntityKind::ProductType),
            other => Err(serde::de::Error::custom(format!(
                "unknown entity kind: {other}"
            ))),
        }
    }
}
