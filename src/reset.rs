//! Reset phase: wipe remote products, categories and product types.
//!
//! Entities are listed page by page, then deleted in chunks. Every kind is
//! re-listed and deleted until the listing comes back empty: a bulk delete
//! that trips over an already-deleted id may leave the rest of its batch
//! alive, and deleting a category may promote its children to roots instead
//! of removing the subtree.

use std::sync::LazyLock;

use regex::Regex;
use tokio::sync::broadcast;

use crate::client::{CatalogClient, EntityKind};
use crate::error::{Error, RemoteErrorDetail, Result, join_messages};
use crate::types::{ResetReport, SyncEvent};

/// Maximum ids per bulk delete mutation
pub const DELETE_CHUNK_SIZE: usize = 50;

/// Fetch-delete cycles after which entities that keep reappearing are an error
pub const MAX_DELETE_CYCLES: usize = 100;

/// Message fallback for services that report missing entities without a code
static NOT_FOUND_MESSAGE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(not found|does not exist|no longer exists|couldn't resolve|could not resolve)")
        .ok()
});

/// Whether an error entry says the target entity is already gone
pub fn is_not_found(detail: &RemoteErrorDetail) -> bool {
    match detail.code.as_deref() {
        Some(code) if code.eq_ignore_ascii_case("NOT_FOUND") => true,
        _ => NOT_FOUND_MESSAGE
            .as_ref()
            .is_some_and(|re| re.is_match(&detail.message)),
    }
}

/// Deletes every existing remote entity before the catalog is rebuilt
pub struct ResetPhase {
    client: CatalogClient,
    event_tx: Option<broadcast::Sender<SyncEvent>>,
}

impl ResetPhase {
    /// Create a reset phase using `client`
    pub fn new(client: CatalogClient) -> Self {
        Self {
            client,
            event_tx: None,
        }
    }

    /// Broadcast an [`SyncEvent::EntitiesDeleted`] per deleted batch
    pub fn with_events(mut self, event_tx: broadcast::Sender<SyncEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Delete products, then categories, then product types, each until drained
    pub async fn run(&self) -> Result<ResetReport> {
        tracing::info!("Reset: deleting existing products");
        let (products_deleted, _) = self.delete_until_empty(EntityKind::Product).await?;

        tracing::info!("Reset: deleting existing categories");
        let (categories_deleted, category_cycles) = self.delete_categories_until_empty().await?;

        tracing::info!("Reset: deleting existing product types");
        let (product_types_deleted, _) = self.delete_until_empty(EntityKind::ProductType).await?;

        let report = ResetReport {
            products_deleted,
            categories_deleted,
            category_cycles,
            product_types_deleted,
        };

        tracing::info!(
            products = report.products_deleted,
            categories = report.categories_deleted,
            category_cycles = report.category_cycles,
            product_types = report.product_types_deleted,
            "Reset complete"
        );

        Ok(report)
    }

    /// List every id of `kind`, following cursors until the last page
    ///
    /// For categories only root categories are listed.
    pub async fn fetch_all_ids(&self, kind: EntityKind) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            self.client.ensure_not_cancelled()?;

            let page = self.client.fetch_id_page(kind, cursor.as_deref()).await?;
            pages += 1;
            ids.extend(page.ids);

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        tracing::debug!(%kind, count = ids.len(), pages, "Listed remote ids");
        Ok(ids)
    }

    /// Delete `ids` in chunks of [`DELETE_CHUNK_SIZE`], returning the number deleted
    ///
    /// Errors saying an entity no longer exists are tolerated; any other error
    /// aborts.
    pub async fn bulk_delete(&self, kind: EntityKind, ids: &[String]) -> Result<usize> {
        let mut deleted = 0;

        for chunk in ids.chunks(DELETE_CHUNK_SIZE) {
            self.client.ensure_not_cancelled()?;

            let count = match self.client.bulk_delete(kind, chunk).await {
                Ok(payload) => {
                    let (gone, fatal): (Vec<_>, Vec<_>) =
                        payload.errors.into_iter().partition(is_not_found);

                    if !fatal.is_empty() {
                        return Err(Error::Rejected {
                            operation: kind.delete_operation().name.to_string(),
                            subject: format!("batch of {} {kind} ids", chunk.len()),
                            message: join_messages(&fatal),
                            details: fatal,
                        });
                    }
                    if !gone.is_empty() {
                        tracing::debug!(
                            %kind,
                            missing = gone.len(),
                            "Some entities were already deleted"
                        );
                    }
                    payload.count
                }
                Err(Error::RemoteBusiness { details, .. })
                    if !details.is_empty() && details.iter().all(is_not_found) =>
                {
                    tracing::debug!(
                        %kind,
                        batch = chunk.len(),
                        "Batch targets entities that no longer exist"
                    );
                    0
                }
                Err(e) => return Err(e),
            };

            deleted += count;
            tracing::debug!(%kind, batch = chunk.len(), count, "Deleted batch");

            if let Some(tx) = &self.event_tx {
                tx.send(SyncEvent::EntitiesDeleted { kind, count }).ok();
            }
        }

        Ok(deleted)
    }

    /// Repeat "list root categories, delete them" until the listing is empty
    ///
    /// Returns the total deleted and the number of fetch-delete cycles.
    pub async fn delete_categories_until_empty(&self) -> Result<(usize, usize)> {
        self.delete_until_empty(EntityKind::Category).await
    }

    /// Repeat "list every id of `kind`, delete them" until the listing is empty
    ///
    /// Gives up with [`Error::Protocol`] after [`MAX_DELETE_CYCLES`] cycles.
    pub async fn delete_until_empty(&self, kind: EntityKind) -> Result<(usize, usize)> {
        let mut deleted = 0;
        let mut cycles = 0;

        loop {
            let ids = self.fetch_all_ids(kind).await?;
            if ids.is_empty() {
                break;
            }
            if cycles >= MAX_DELETE_CYCLES {
                return Err(Error::Protocol(format!(
                    "{kind} entities still present after {cycles} delete cycles ({} remaining)",
                    ids.len()
                )));
            }

            cycles += 1;
            let count = self.bulk_delete(kind, &ids).await?;
            deleted += count;

            tracing::debug!(%kind, cycle = cycles, listed = ids.len(), deleted = count, "Delete cycle");
        }

        Ok((deleted, cycles))
    }
}
