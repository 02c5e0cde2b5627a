//! Common test utilities for catalog-sync integration tests

#[allow(dead_code)]
pub mod fake_remote;

#[allow(unused_imports)]
pub use fake_remote::*;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use catalog_sync::catalog::{CatalogConfig, CategoryNode, LoadedCatalog, Price, ProductRecord};
use catalog_sync::{CatalogClient, Config, RetryConfig};

/// Retry policy with millisecond waits so retry tests stay fast
#[allow(dead_code)]
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 5,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(20),
        jitter: false,
    }
}

/// Client talking to `remote`
#[allow(dead_code)]
pub fn client_for(remote: &Arc<FakeRemote>) -> CatalogClient {
    CatalogClient::new(remote.clone(), fast_retry())
}

/// Config for runs against the fake; checkpoints go to `db_path` when given
#[allow(dead_code)]
pub fn test_config(db_path: Option<&Path>) -> Config {
    let mut config = Config::new("http://catalog.invalid/graphql/", "test-token");
    config.retry = fast_retry();
    match db_path {
        Some(path) => {
            config.checkpoint.enabled = true;
            config.checkpoint.database_path = path.to_path_buf();
        }
        None => config.checkpoint.enabled = false,
    }
    config
}

#[allow(dead_code)]
pub fn product(sku: &str, name: &str, path: &[&str], amount: f64) -> ProductRecord {
    ProductRecord {
        sku: sku.to_string(),
        name: name.to_string(),
        slug: sku.to_lowercase(),
        unit: "pcs".to_string(),
        category_path: path.iter().map(|s| s.to_string()).collect(),
        price: Price {
            amount,
            currency: "USD".to_string(),
        },
        comment: None,
    }
}

#[allow(dead_code)]
pub fn category(
    name: &str,
    slug: &str,
    subcategories: Vec<CategoryNode>,
    products: Vec<ProductRecord>,
) -> CategoryNode {
    CategoryNode {
        name: name.to_string(),
        slug: slug.to_string(),
        subcategories,
        products,
    }
}

/// One "Electronics" category holding the "Phone" product (SKU A1, 100 USD)
#[allow(dead_code)]
pub fn electronics_catalog() -> CatalogConfig {
    CatalogConfig {
        categories: vec![category(
            "Electronics",
            "electronics",
            vec![],
            vec![product("A1", "Phone", &["Electronics"], 100.0)],
        )],
    }
}

/// `count` products spread over a two-level tree
///
/// Products alternate between "Home" and "Home > Kitchen" so the flattened
/// order differs from the creation order of SKUs.
#[allow(dead_code)]
pub fn catalog_with_products(count: usize) -> CatalogConfig {
    let mut home = Vec::new();
    let mut kitchen = Vec::new();
    for n in 0..count {
        let sku = format!("SKU-{n:04}");
        if n % 2 == 0 {
            home.push(product(&sku, &format!("Item {n}"), &["Home"], 1.0 + n as f64));
        } else {
            kitchen.push(product(
                &sku,
                &format!("Item {n}"),
                &["Home", "Kitchen"],
                1.0 + n as f64,
            ));
        }
    }

    CatalogConfig {
        categories: vec![category(
            "Home",
            "home",
            vec![category("Kitchen", "kitchen", vec![], kitchen)],
            home,
        )],
    }
}

/// Wrap a catalog as if it had been loaded from disk
#[allow(dead_code)]
pub fn loaded(catalog: CatalogConfig) -> LoadedCatalog {
    let bytes = serde_json::to_vec(&catalog).unwrap();
    LoadedCatalog {
        fingerprint: catalog_sync::catalog::fingerprint(&bytes),
        catalog,
    }
}
