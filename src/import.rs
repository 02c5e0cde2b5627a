//! Import phase: a bounded worker pool that upserts products by SKU.
//!
//! Items are resolved against the frozen [`TaxonomyMap`] before any worker
//! starts. Workers pull from one shared queue; each item is dequeued by
//! exactly one worker. The first failure cancels the pool.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

use crate::catalog::{CatalogItem, ProductRecord, join_path};
use crate::client::CatalogClient;
use crate::client::models::{Channel, MetadataItem, ProductInput, VariantInput};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::taxonomy::TaxonomyMap;
use crate::types::{ImportReport, SyncEvent};

/// Completions between two progress log lines
pub const PROGRESS_LOG_INTERVAL: usize = 25;

/// A catalog product ready for import
#[derive(Debug, Clone, PartialEq)]
pub struct ImportQueueItem {
    /// Absolute index in the flattened catalog
    pub index: usize,
    /// The product
    pub record: ProductRecord,
    /// Remote id of the product's category
    pub category_id: String,
}

/// `items[offset .. min(offset + limit, len)]`; an offset past the end is empty
pub fn select_window<T>(items: &[T], offset: usize, limit: Option<usize>) -> &[T] {
    let start = offset.min(items.len());
    let end = match limit {
        Some(limit) => start.saturating_add(limit).min(items.len()),
        None => items.len(),
    };
    &items[start..end]
}

/// Resolve each item's category path to a remote id
///
/// The record's own category path decides; a product nested under a different
/// node is imported into its declared category with a warning. A path missing
/// from the map is fatal: the catalog and the taxonomy disagree.
pub fn resolve_items(items: &[CatalogItem], taxonomy: &TaxonomyMap) -> Result<Vec<ImportQueueItem>> {
    items
        .iter()
        .map(|item| {
            let path = item.record.joined_path();
            if !item.is_filed_under_declared_path() {
                tracing::warn!(
                    sku = %item.record.sku,
                    category_path = %path,
                    found_under = %join_path(&item.tree_path),
                    "Product declares a category other than the one it is nested under"
                );
            }
            match taxonomy.resolve(&path) {
                Some(id) => Ok(ImportQueueItem {
                    index: item.index,
                    record: item.record.clone(),
                    category_id: id.to_string(),
                }),
                None => Err(Error::MissingCategoryMapping {
                    sku: item.record.sku.clone(),
                    path,
                }),
            }
        })
        .collect()
}

/// Where completed items are recorded
#[derive(Clone)]
pub struct CheckpointSink {
    db: Arc<Database>,
    fingerprint: String,
}

impl CheckpointSink {
    /// Record into `db` under the catalog `fingerprint`
    pub fn new(db: Arc<Database>, fingerprint: impl Into<String>) -> Self {
        Self {
            db,
            fingerprint: fingerprint.into(),
        }
    }

    async fn record(&self, item: &ImportQueueItem) -> Result<()> {
        self.db
            .record_completed(&self.fingerprint, item.index, &item.record.sku)
            .await
    }
}

/// Drives the import worker pool
pub struct ImportScheduler {
    client: CatalogClient,
    channel: Channel,
    product_type_id: String,
    concurrency: usize,
    item_delay: Duration,
    checkpoint: Option<CheckpointSink>,
    event_tx: Option<broadcast::Sender<SyncEvent>>,
}

/// State shared by all workers of one run
struct WorkerShared {
    queue: Mutex<VecDeque<ImportQueueItem>>,
    abort: CancellationToken,
    total: usize,
    completed: AtomicUsize,
    imported: AtomicUsize,
    skipped: AtomicUsize,
}

/// Per-run copy of the scheduler settings handed to each worker
struct Worker {
    client: CatalogClient,
    channel: Channel,
    product_type_id: String,
    item_delay: Duration,
    checkpoint: Option<CheckpointSink>,
    event_tx: Option<broadcast::Sender<SyncEvent>>,
}

impl ImportScheduler {
    /// Import into `channel` using the product type `product_type_id`
    pub fn new(client: CatalogClient, channel: Channel, product_type_id: impl Into<String>) -> Self {
        Self {
            client,
            channel,
            product_type_id: product_type_id.into(),
            concurrency: 1,
            item_delay: Duration::ZERO,
            checkpoint: None,
            event_tx: None,
        }
    }

    /// Number of workers (at least one)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Pause after each item
    pub fn with_item_delay(mut self, delay: Duration) -> Self {
        self.item_delay = delay;
        self
    }

    /// Record completed items
    pub fn with_checkpoint(mut self, sink: CheckpointSink) -> Self {
        self.checkpoint = Some(sink);
        self
    }

    /// Broadcast an [`SyncEvent::ItemCompleted`] per item
    pub fn with_events(mut self, event_tx: broadcast::Sender<SyncEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Import `items` and return the counts
    ///
    /// Fails fast: the first error stops every worker and is returned.
    pub async fn run(&self, items: Vec<ImportQueueItem>) -> Result<ImportReport> {
        let total = items.len();
        if total == 0 {
            tracing::info!("Nothing to import");
            return Ok(ImportReport::default());
        }

        let abort = self.client.cancellation_token().child_token();
        let shared = Arc::new(WorkerShared {
            queue: Mutex::new(items.into()),
            abort: abort.clone(),
            total,
            completed: AtomicUsize::new(0),
            imported: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
        });
        let worker = Arc::new(Worker {
            client: self.client.with_cancellation(abort),
            channel: self.channel.clone(),
            product_type_id: self.product_type_id.clone(),
            item_delay: self.item_delay,
            checkpoint: self.checkpoint.clone(),
            event_tx: self.event_tx.clone(),
        });

        let workers = self.concurrency.min(total);
        tracing::info!(total, workers, "Starting import");

        let handles: Vec<_> = (0..workers)
            .map(|worker_id| {
                let shared = Arc::clone(&shared);
                let worker = Arc::clone(&worker);
                tokio::spawn(async move {
                    // Dropped without disarming only when the worker unwinds
                    let stop_others = shared.abort.clone().drop_guard();
                    let result = worker.run(worker_id, &shared).await;
                    let _ = stop_others.disarm();
                    result
                })
            })
            .collect();

        let mut first_error: Option<Error> = None;
        for joined in futures::future::join_all(handles).await {
            let result = joined
                .unwrap_or_else(|e| Err(Error::Other(format!("import worker panicked: {e}"))));
            if let Err(e) = result {
                // Workers stopped by the abort report Cancelled; keep the real cause
                let replace = match &first_error {
                    None => true,
                    Some(existing) => existing.is_cancelled() && !e.is_cancelled(),
                };
                if replace {
                    first_error = Some(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        let report = ImportReport {
            total,
            imported: shared.imported.load(Ordering::SeqCst),
            skipped: shared.skipped.load(Ordering::SeqCst),
        };
        tracing::info!(
            total = report.total,
            imported = report.imported,
            skipped = report.skipped,
            "Import complete"
        );
        Ok(report)
    }
}

impl Worker {
    async fn run(&self, worker_id: usize, shared: &WorkerShared) -> Result<()> {
        loop {
            if shared.abort.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let next = {
                let mut queue = shared.queue.lock().await;
                queue.pop_front()
            };
            let Some(item) = next else {
                return Ok(());
            };

            let skipped = match self.process_item(&item).await {
                Ok(skipped) => skipped,
                Err(e) => {
                    if !e.is_cancelled() {
                        tracing::error!(
                            worker = worker_id,
                            index = item.index,
                            sku = %item.record.sku,
                            error = %e,
                            "Import failed, stopping workers"
                        );
                    }
                    shared.abort.cancel();
                    return Err(e);
                }
            };

            if let Some(checkpoint) = &self.checkpoint {
                if let Err(e) = checkpoint.record(&item).await {
                    shared.abort.cancel();
                    return Err(e);
                }
            }

            if skipped {
                shared.skipped.fetch_add(1, Ordering::SeqCst);
            } else {
                shared.imported.fetch_add(1, Ordering::SeqCst);
            }
            let completed = shared.completed.fetch_add(1, Ordering::SeqCst) + 1;

            if completed % PROGRESS_LOG_INTERVAL == 0 || completed == shared.total {
                tracing::info!(
                    worker = worker_id,
                    completed,
                    total = shared.total,
                    "Import progress"
                );
            }

            if let Some(tx) = &self.event_tx {
                tx.send(SyncEvent::ItemCompleted {
                    index: item.index,
                    sku: item.record.sku.clone(),
                    skipped,
                    completed,
                    total: shared.total,
                })
                .ok();
            }

            if !self.item_delay.is_zero() {
                tokio::select! {
                    _ = shared.abort.cancelled() => {}
                    _ = tokio::time::sleep(self.item_delay) => {}
                }
            }
        }
    }

    /// Upsert one product; returns `true` when its SKU already existed
    async fn process_item(&self, item: &ImportQueueItem) -> Result<bool> {
        let record = &item.record;
        let sku = record.sku.as_str();

        if let Some(existing) = self.client.variant_by_sku(sku).await? {
            tracing::debug!(sku, variant = %existing.id, "SKU already imported, skipping");
            return Ok(true);
        }

        let metadata = product_metadata(record);

        let product_id = self
            .client
            .create_product(
                &ProductInput {
                    name: &record.name,
                    slug: &record.slug,
                    product_type: &self.product_type_id,
                    category: &item.category_id,
                    metadata: &metadata,
                },
                sku,
            )
            .await?;

        let variant_id = self
            .client
            .create_variant(
                &VariantInput {
                    product: &product_id,
                    sku,
                    name: &record.name,
                    track_inventory: false,
                    attributes: Vec::new(),
                    metadata: &metadata,
                },
                sku,
            )
            .await?;

        self.client
            .update_product_channel_listing(&product_id, &self.channel.id, sku)
            .await?;

        if !record
            .price
            .currency
            .eq_ignore_ascii_case(&self.channel.currency_code)
        {
            tracing::warn!(
                sku,
                price_currency = %record.price.currency,
                channel_currency = %self.channel.currency_code,
                "Price currency differs from channel currency; amount is used as-is"
            );
        }

        self.client
            .update_variant_channel_listing(
                &variant_id,
                &self.channel.id,
                &record.price.amount_string(),
                sku,
            )
            .await?;

        tracing::debug!(sku, product = %product_id, variant = %variant_id, "Imported product");
        Ok(false)
    }
}

/// Metadata attached to both the product and its variant
pub fn product_metadata(record: &ProductRecord) -> Vec<MetadataItem> {
    let mut metadata = vec![
        MetadataItem::new("unit", &record.unit),
        MetadataItem::new("category_path", record.joined_path()),
    ];
    if let Some(comment) = &record.comment {
        metadata.push(MetadataItem::new("comment", comment));
    }
    metadata
}
