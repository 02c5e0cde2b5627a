//! Curated catalog document: loading, validation and flattening.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Separator between category path segments in [`TaxonomyMap`](crate::taxonomy::TaxonomyMap) keys
pub const PATH_SEPARATOR: &str = " > ";

/// Root of the catalog document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Top-level categories
    #[serde(default)]
    pub categories: Vec<CategoryNode>,
}

/// A category with its children and the products filed directly under it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryNode {
    /// Display name
    pub name: String,
    /// Slug (the remote idempotency key for categories)
    pub slug: String,
    /// Child categories
    #[serde(default)]
    pub subcategories: Vec<CategoryNode>,
    /// Products listed under this category
    #[serde(default)]
    pub products: Vec<ProductRecord>,
}

/// One product of the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    /// Externally assigned stock keeping unit (idempotency key)
    pub sku: String,
    /// Display name
    pub name: String,
    /// Product slug
    pub slug: String,
    /// Unit of measure ("pcs", "kg", ...)
    #[serde(default)]
    pub unit: String,
    /// Names of the categories leading to the product's category
    #[serde(default)]
    pub category_path: Vec<String>,
    /// List price
    pub price: Price,
    /// Free-form note copied into metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ProductRecord {
    /// The category path joined into a taxonomy key
    pub fn joined_path(&self) -> String {
        join_path(&self.category_path)
    }
}

/// Price in a given currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in major units
    pub amount: f64,
    /// ISO currency code
    pub currency: String,
}

impl Price {
    /// Amount as sent to the remote service
    pub fn amount_string(&self) -> String {
        self.amount.to_string()
    }
}

/// A product together with its position in the flattened catalog
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogItem {
    /// Absolute index in pre-order
    pub index: usize,
    /// Names of the categories the product was found under
    pub tree_path: Vec<String>,
    /// The product
    pub record: ProductRecord,
}

impl CatalogItem {
    /// Whether the product's declared category path names the node it sits under
    pub fn is_filed_under_declared_path(&self) -> bool {
        self.tree_path == self.record.category_path
    }
}

/// A catalog read from disk, with the fingerprint of its bytes
#[derive(Debug, Clone)]
pub struct LoadedCatalog {
    /// Parsed document
    pub catalog: CatalogConfig,
    /// Hex SHA-256 of the file contents
    pub fingerprint: String,
}

/// Join category path segments with [`PATH_SEPARATOR`]
pub fn join_path<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(PATH_SEPARATOR)
}

/// Hex SHA-256 of `bytes`
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Read, parse and validate the catalog at `path`
pub async fn load(path: &Path) -> Result<LoadedCatalog> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        Error::Catalog(format!("cannot read catalog {}: {e}", path.display()))
    })?;

    let catalog = CatalogConfig::from_slice(&bytes)?;

    tracing::info!(
        path = %path.display(),
        categories = catalog.categories.len(),
        products = catalog.product_count(),
        "Catalog loaded"
    );

    Ok(LoadedCatalog {
        catalog,
        fingerprint: fingerprint(&bytes),
    })
}

impl CatalogConfig {
    /// Parse and validate a catalog document
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let catalog: CatalogConfig = serde_json::from_slice(bytes)
            .map_err(|e| Error::Catalog(format!("malformed catalog JSON: {e}")))?;
        catalog.validate()?;

        let duplicates = catalog.duplicate_skus();
        if !duplicates.is_empty() {
            tracing::warn!(
                skus = ?duplicates,
                "Catalog lists the same SKU more than once; later occurrences will be skipped as already imported"
            );
        }

        Ok(catalog)
    }

    /// Reject categories and products with empty identifying fields
    pub fn validate(&self) -> Result<()> {
        let mut stack: Vec<(&CategoryNode, String)> = self
            .categories
            .iter()
            .rev()
            .map(|node| (node, node.name.clone()))
            .collect();

        while let Some((node, path)) = stack.pop() {
            if node.name.trim().is_empty() {
                return Err(Error::Catalog(format!("category under \"{path}\" has no name")));
            }
            if node.slug.trim().is_empty() {
                return Err(Error::Catalog(format!("category \"{path}\" has no slug")));
            }

            for (position, product) in node.products.iter().enumerate() {
                if product.sku.trim().is_empty() {
                    return Err(Error::Catalog(format!(
                        "product #{position} in \"{path}\" has no sku"
                    )));
                }
                if product.name.trim().is_empty() || product.slug.trim().is_empty() {
                    return Err(Error::Catalog(format!(
                        "product {} in \"{path}\" needs both a name and a slug",
                        product.sku
                    )));
                }
            }

            for child in node.subcategories.iter().rev() {
                stack.push((child, format!("{path}{PATH_SEPARATOR}{}", child.name)));
            }
        }

        Ok(())
    }

    /// Total number of products in the tree
    pub fn product_count(&self) -> usize {
        let mut count = 0;
        let mut stack: Vec<&CategoryNode> = self.categories.iter().collect();
        while let Some(node) = stack.pop() {
            count += node.products.len();
            stack.extend(node.subcategories.iter());
        }
        count
    }

    /// SKUs that occur more than once, in order of first repetition
    pub fn duplicate_skus(&self) -> Vec<String> {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        let mut duplicates = Vec::new();

        let mut stack: Vec<&CategoryNode> = self.categories.iter().rev().collect();
        while let Some(node) = stack.pop() {
            for product in &node.products {
                let count = seen.entry(product.sku.as_str()).or_insert(0);
                *count += 1;
                if *count == 2 {
                    duplicates.push(product.sku.clone());
                }
            }
            stack.extend(node.subcategories.iter().rev());
        }

        duplicates
    }

    /// Every product in depth-first pre-order, tagged with its tree path and index
    ///
    /// A category's own products come before those of its subcategories.
    pub fn flatten(&self) -> Vec<CatalogItem> {
        let mut items = Vec::new();
        let mut stack: Vec<(&CategoryNode, Vec<String>)> = self
            .categories
            .iter()
            .rev()
            .map(|node| (node, vec![node.name.clone()]))
            .collect();

        while let Some((node, path)) = stack.pop() {
            for product in &node.products {
                items.push(CatalogItem {
                    index: items.len(),
                    tree_path: path.clone(),
                    record: product.clone(),
                });
            }

            for child in node.subcategories.iter().rev() {
                let mut child_path = path.clone();
                child_path.push(child.name.clone());
                stack.push((child, child_path));
            }
        }

        items
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn product(sku: &str, path: &[&str]) -> ProductRecord {
        ProductRecord {
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            slug: sku.to_lowercase(),
            unit: "pcs".to_string(),
            category_path: path.iter().map(|s| s.to_string()).collect(),
            price: Price {
                amount: 10.0,
                currency: "USD".to_string(),
            },
            comment: None,
        }
    }

    fn category(name: &str, subcategories: Vec<CategoryNode>, products: Vec<ProductRecord>) -> CategoryNode {
        CategoryNode {
            name: name.to_string(),
            slug: name.to_lowercase(),
            subcategories,
            products,
        }
    }

    #[test]
    fn parses_camel_case_document_with_defaults() {
        let json = br#"{
            "categories": [{
                "name": "Electronics",
                "slug": "electronics",
                "subcategories": [{
                    "name": "Phones",
                    "slug": "phones",
                    "products": [{
                        "sku": "PH-1",
                        "name": "Phone",
                        "slug": "phone",
                        "unit": "pcs",
                        "categoryPath": ["Electronics", "Phones"],
                        "price": { "amount": 199.99, "currency": "USD" },
                        "comment": "refurbished"
                    }]
                }]
            }]
        }"#;

        let catalog = CatalogConfig::from_slice(json).expect("valid catalog");

        let phones = &catalog.categories[0].subcategories[0];
        assert!(catalog.categories[0].products.is_empty());
        assert!(phones.subcategories.is_empty());
        assert_eq!(phones.products[0].joined_path(), "Electronics > Phones");
        assert_eq!(phones.products[0].price.amount_string(), "199.99");
        assert_eq!(phones.products[0].comment.as_deref(), Some("refurbished"));
    }

    #[test]
    fn flatten_is_pre_order_with_absolute_indices() {
        let catalog = CatalogConfig {
            categories: vec![
                category(
                    "A",
                    vec![
                        category("A1", vec![], vec![product("a1-1", &["A", "A1"])]),
                        category("A2", vec![], vec![product("a2-1", &["A", "A2"])]),
                    ],
                    vec![product("a-1", &["A"]), product("a-2", &["A"])],
                ),
                category("B", vec![], vec![product("b-1", &["B"])]),
            ],
        };

        let items = catalog.flatten();
        let skus: Vec<&str> = items.iter().map(|i| i.record.sku.as_str()).collect();

        assert_eq!(skus, ["a-1", "a-2", "a1-1", "a2-1", "b-1"]);
        assert_eq!(
            items.iter().map(|i| i.index).collect::<Vec<_>>(),
            [0, 1, 2, 3, 4]
        );
        assert_eq!(items[2].tree_path, ["A", "A1"]);
        assert!(items.iter().all(CatalogItem::is_filed_under_declared_path));
        assert_eq!(catalog.product_count(), 5);
    }

    #[test]
    fn empty_slug_is_rejected() {
        let mut node = category("Phones", vec![], vec![]);
        node.slug = " ".to_string();
        let catalog = CatalogConfig {
            categories: vec![category("Electronics", vec![node], vec![])],
        };

        let err = catalog.validate().unwrap_err();
        assert!(
            err.to_string().contains("Electronics > Phones"),
            "unexpected message: {err}"
        );
    }

    #[test]
    fn empty_sku_is_rejected() {
        let catalog = CatalogConfig {
            categories: vec![category("A", vec![], vec![product("", &["A"])])],
        };

        assert!(matches!(catalog.validate(), Err(Error::Catalog(_))));
    }

    #[test]
    fn duplicate_skus_are_reported_once_each() {
        let catalog = CatalogConfig {
            categories: vec![
                category("A", vec![], vec![product("X", &["A"]), product("Y", &["A"])]),
                category(
                    "B",
                    vec![],
                    vec![product("X", &["B"]), product("X", &["B"]), product("Y", &["B"])],
                ),
            ],
        };

        assert_eq!(catalog.duplicate_skus(), ["X", "Y"]);
    }

    #[test]
    fn malformed_json_is_a_catalog_error() {
        let err = CatalogConfig::from_slice(b"{ not json").unwrap_err();
        assert!(matches!(err, Error::Catalog(_)));
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let hash = fingerprint(b"{}");
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, fingerprint(b"{ }"));
    }

    #[tokio::test]
    async fn load_reads_file_and_fingerprints_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let body = br#"{"categories":[{"name":"A","slug":"a"}]}"#;
        tokio::fs::write(&path, body).await.unwrap();

        let loaded = load(&path).await.expect("load should succeed");

        assert_eq!(loaded.catalog.categories.len(), 1);
        assert_eq!(loaded.fingerprint, fingerprint(body));
    }

    #[tokio::test]
    async fn missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("absent.json")).await.unwrap_err();
        assert!(matches!(err, Error::Catalog(_)));
    }
}
