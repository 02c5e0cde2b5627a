//! # catalog-sync
//!
//! Resumable synchronization of a curated, hierarchical product catalog into a
//! remote commerce service reachable only through a paginated, rate-limited
//! GraphQL API.
//!
//! A run has three phases:
//! - **Reset** - delete existing products, categories and product types
//! - **Taxonomy** - create (or reuse) the product type and the category tree
//! - **Import** - upsert every product by SKU with a bounded worker pool
//!
//! ## Quick Start
//!
//! ```no_run
//! use catalog_sync::{CatalogSync, Config, catalog, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let loaded = catalog::load(&config.catalog_path).await?;
//!
//!     let sync = CatalogSync::new(config).await?;
//!
//!     // Subscribe to events
//!     let mut events = sync.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = run_with_shutdown(&sync, &loaded).await?;
//!     println!("imported {} products", report.import.imported);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Catalog document model
pub mod catalog;
/// Remote catalog client
pub mod client;
/// Configuration types
pub mod config;
/// Checkpoint persistence layer
pub mod db;
/// Error types
pub mod error;
/// Import worker pool
pub mod import;
/// Reset phase
pub mod reset;
/// Retry logic with linear backoff
pub mod retry;
/// Run orchestration
pub mod sync;
/// Category tree and product type
pub mod taxonomy;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use catalog::{CatalogConfig, CategoryNode, LoadedCatalog, Price, ProductRecord};
pub use client::{CatalogClient, EntityKind, HttpTransport, Operation, Transport};
pub use config::{ApiConfig, CheckpointConfig, Config, RetryConfig, RunConfig};
pub use db::Database;
pub use error::{DatabaseError, Error, RemoteErrorDetail, Result};
pub use sync::CatalogSync;
pub use taxonomy::{Taxonomy, TaxonomyMap};
pub use types::{ImportReport, ResetReport, RunStatus, SyncEvent, SyncPhase, SyncReport};

/// Run a sync with graceful signal handling.
///
/// A termination signal cancels the run's token: workers stop between items,
/// in-flight remote calls and backoff waits are abandoned, and the run returns
/// [`Error::Cancelled`].
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(sync: &CatalogSync, catalog: &LoadedCatalog) -> Result<SyncReport> {
    let token = sync.cancellation_token();
    let listener = tokio::spawn(async move {
        wait_for_signal().await;
        tracing::warn!("Shutdown requested, cancelling sync");
        token.cancel();
    });

    let result = sync.run(catalog).await;
    listener.abort();
    result
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
