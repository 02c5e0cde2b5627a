//! `catalog-sync` command: one sync run configured from the environment.

use std::process::ExitCode;

use catalog_sync::{CatalogSync, Config, catalog, run_with_shutdown};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env before the filter reads RUST_LOG
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "catalog-sync failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> catalog_sync::Result<()> {
    let config = Config::from_env()?;
    let loaded = catalog::load(&config.catalog_path).await?;

    let sync = CatalogSync::new(config).await?;
    let result = run_with_shutdown(&sync, &loaded).await;
    sync.close().await;

    let report = result?;
    tracing::info!(
        imported = report.import.imported,
        skipped = report.import.skipped,
        offset = report.offset,
        "Done"
    );
    Ok(())
}
