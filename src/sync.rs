//! Orchestration of a full sync run.
//!
//! ```text
//! Idle → (Resetting) → BuildingTaxonomy → Importing → Done
//!                   any error → Failed
//! ```

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::catalog::LoadedCatalog;
use crate::client::CatalogClient;
use crate::client::models::Channel;
use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::import::{CheckpointSink, ImportScheduler, resolve_items, select_window};
use crate::reset::ResetPhase;
use crate::taxonomy::TaxonomyBuilder;
use crate::types::{RunStatus, SyncEvent, SyncPhase, SyncReport};

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Runs reset, taxonomy and import against the remote catalog
pub struct CatalogSync {
    config: Config,
    client: CatalogClient,
    db: Option<Arc<Database>>,
    event_tx: broadcast::Sender<SyncEvent>,
    phase_tx: watch::Sender<SyncPhase>,
}

impl CatalogSync {
    /// Create a sync talking HTTP to the configured endpoint
    pub async fn new(config: Config) -> Result<Self> {
        let client = CatalogClient::http(&config.api, config.retry.clone())?;
        Self::with_client(config, client).await
    }

    /// Create a sync using an existing client (any [`Transport`](crate::client::Transport))
    ///
    /// Opens the checkpoint database when checkpoints are enabled.
    pub async fn with_client(config: Config, client: CatalogClient) -> Result<Self> {
        let db = if config.checkpoint.enabled {
            Some(Arc::new(
                Database::new(&config.checkpoint.database_path).await?,
            ))
        } else {
            None
        };

        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (phase_tx, _phase_rx) = watch::channel(SyncPhase::Idle);

        Ok(Self {
            config,
            client,
            db,
            event_tx,
            phase_tx,
        })
    }

    /// Subscribe to run events
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    /// Current phase
    pub fn phase(&self) -> SyncPhase {
        *self.phase_tx.borrow()
    }

    /// Watch phase transitions
    pub fn watch_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase_tx.subscribe()
    }

    /// Token that cancels the run (every phase, worker and remote call)
    pub fn cancellation_token(&self) -> CancellationToken {
        self.client.cancellation_token().clone()
    }

    /// Checkpoint database, when enabled
    pub fn database(&self) -> Option<&Database> {
        self.db.as_deref()
    }

    /// Execute one full run over `catalog`
    pub async fn run(&self, catalog: &LoadedCatalog) -> Result<SyncReport> {
        let started = Instant::now();

        if let Some(db) = &self.db {
            if db.last_run_status().await? == Some(RunStatus::Running) {
                tracing::warn!("Previous run did not finish; resuming from checkpoint");
            }
            db.set_run_started().await?;
        }

        match self.run_and_record(catalog, started).await {
            Ok(report) => {
                self.set_phase(SyncPhase::Done);

                tracing::info!(
                    imported = report.import.imported,
                    skipped = report.import.skipped,
                    total = report.import.total,
                    categories_created = report.categories_created,
                    categories_reused = report.categories_reused,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Catalog sync finished"
                );
                self.event_tx
                    .send(SyncEvent::Finished {
                        report: report.clone(),
                    })
                    .ok();
                Ok(report)
            }
            Err(e) => {
                let failed_in = self.phase();
                self.set_phase(SyncPhase::Failed);

                if let Some(db) = &self.db {
                    if let Err(db_err) = db.set_run_failed().await {
                        tracing::warn!(error = %db_err, "Could not record failed run");
                    }
                }

                tracing::error!(phase = %failed_in, error = %e, "Catalog sync failed");
                self.event_tx
                    .send(SyncEvent::Failed {
                        phase: failed_in,
                        error: e.to_string(),
                    })
                    .ok();
                Err(e)
            }
        }
    }

    /// Run every phase, then persist the finished status
    async fn run_and_record(&self, catalog: &LoadedCatalog, started: Instant) -> Result<SyncReport> {
        let report = self.run_phases(catalog, started).await?;
        if let Some(db) = &self.db {
            db.set_run_finished().await?;
        }
        Ok(report)
    }

    async fn run_phases(&self, catalog: &LoadedCatalog, started: Instant) -> Result<SyncReport> {
        let channel = self.resolve_channel().await?;

        let reset = if self.config.run.skip_reset {
            tracing::info!("Skipping reset");
            None
        } else {
            self.set_phase(SyncPhase::Resetting);
            let report = ResetPhase::new(self.client.clone())
                .with_events(self.event_tx.clone())
                .run()
                .await?;

            if let Some(db) = &self.db {
                let cleared = db.clear_checkpoint(&catalog.fingerprint).await?;
                if cleared > 0 {
                    tracing::info!(cleared, "Cleared import checkpoint after reset");
                }
            }
            Some(report)
        };

        self.set_phase(SyncPhase::BuildingTaxonomy);
        let taxonomy = TaxonomyBuilder::new(self.client.clone(), &self.config.product_type_name)
            .with_events(self.event_tx.clone())
            .build(&catalog.catalog)
            .await?;

        self.set_phase(SyncPhase::Importing);
        let items = catalog.catalog.flatten();
        let offset = self.start_offset(&catalog.fingerprint).await?;
        let window = select_window(&items, offset, self.config.run.limit);
        let queue = resolve_items(window, &taxonomy.map)?;

        tracing::info!(
            catalog_items = items.len(),
            offset,
            window = queue.len(),
            concurrency = self.config.run.concurrency,
            "Import window selected"
        );

        let mut scheduler =
            ImportScheduler::new(self.client.clone(), channel, &taxonomy.product_type_id)
                .with_concurrency(self.config.run.concurrency)
                .with_item_delay(self.config.run.item_delay)
                .with_events(self.event_tx.clone());
        if let Some(db) = &self.db {
            scheduler = scheduler.with_checkpoint(CheckpointSink::new(
                Arc::clone(db),
                catalog.fingerprint.clone(),
            ));
        }
        let import = scheduler.run(queue).await?;

        Ok(SyncReport {
            reset,
            categories_created: taxonomy.created,
            categories_reused: taxonomy.reused,
            offset,
            import,
            elapsed: started.elapsed(),
        })
    }

    async fn resolve_channel(&self) -> Result<Channel> {
        let slug = self.config.channel_slug.as_str();
        let channel = self
            .client
            .channel_by_slug(slug)
            .await?
            .ok_or_else(|| Error::ChannelNotFound {
                slug: slug.to_string(),
            })?;

        tracing::info!(
            slug,
            id = %channel.id,
            currency = %channel.currency_code,
            "Resolved channel"
        );
        Ok(channel)
    }

    /// Explicit offset, else the checkpointed prefix, else 0
    async fn start_offset(&self, fingerprint: &str) -> Result<usize> {
        if let Some(offset) = self.config.run.offset {
            return Ok(offset);
        }
        match &self.db {
            Some(db) => {
                let offset = db.completed_prefix_len(fingerprint).await?;
                if offset > 0 {
                    tracing::info!(offset, "Resuming import from checkpoint");
                }
                Ok(offset)
            }
            None => Ok(0),
        }
    }

    fn set_phase(&self, phase: SyncPhase) {
        self.phase_tx.send_replace(phase);
        tracing::debug!(%phase, "Phase changed");
        self.event_tx.send(SyncEvent::PhaseChanged { phase }).ok();
    }

    /// Close the checkpoint database
    pub async fn close(self) {
        if let Some(db) = self.db {
            match Arc::try_unwrap(db) {
                Ok(db) => db.close().await,
                Err(_) => tracing::debug!("Checkpoint database still shared, leaving pool open"),
            }
        }
    }
}
