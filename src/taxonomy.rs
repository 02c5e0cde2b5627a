//! Taxonomy phase: the product type and the category tree.
//!
//! Categories are matched by slug, so running the phase against a tree that
//! already exists reuses every category and creates nothing.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use tokio::sync::broadcast;

use crate::catalog::{CatalogConfig, CategoryNode, PATH_SEPARATOR};
use crate::client::CatalogClient;
use crate::error::{Error, Result};
use crate::types::SyncEvent;

/// Category path (joined with [`PATH_SEPARATOR`]) to remote category id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxonomyMap {
    entries: BTreeMap<String, String>,
}

impl TaxonomyMap {
    /// Empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path -> id`
    ///
    /// Re-inserting a path with the same id is a no-op; with a different id it
    /// is a data-integrity error.
    pub fn insert(&mut self, path: impl Into<String>, id: impl Into<String>) -> Result<()> {
        let id = id.into();
        match self.entries.entry(path.into()) {
            Entry::Vacant(slot) => {
                slot.insert(id);
                Ok(())
            }
            Entry::Occupied(existing) if *existing.get() == id => Ok(()),
            Entry::Occupied(existing) => Err(Error::Catalog(format!(
                "category path \"{}\" maps to both {} and {id}",
                existing.key(),
                existing.get()
            ))),
        }
    }

    /// Remote id for a joined path
    pub fn resolve(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    /// Number of paths
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(path, id)` pairs in path order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Result of the taxonomy phase
#[derive(Debug, Clone)]
pub struct Taxonomy {
    /// Id of the product type all products are created with
    pub product_type_id: String,
    /// Whether the product type already existed
    pub product_type_reused: bool,
    /// Every category path of the catalog
    pub map: TaxonomyMap,
    /// Categories created in this run
    pub created: usize,
    /// Categories that already existed
    pub reused: usize,
}

/// Builds the product type and category tree remotely
pub struct TaxonomyBuilder {
    client: CatalogClient,
    product_type_name: String,
    event_tx: Option<broadcast::Sender<SyncEvent>>,
}

impl TaxonomyBuilder {
    /// Create a builder using `client` and the canonical product type name
    pub fn new(client: CatalogClient, product_type_name: impl Into<String>) -> Self {
        Self {
            client,
            product_type_name: product_type_name.into(),
            event_tx: None,
        }
    }

    /// Broadcast a [`SyncEvent::CategoryReady`] per category
    pub fn with_events(mut self, event_tx: broadcast::Sender<SyncEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Ensure the product type and every category of `catalog` exist
    pub async fn build(&self, catalog: &CatalogConfig) -> Result<Taxonomy> {
        let (product_type_id, product_type_reused) = self.ensure_product_type().await?;

        let mut map = TaxonomyMap::new();
        let mut created = 0;
        let mut reused = 0;

        // Pre-order: a parent is always created before its children
        let mut stack: Vec<(&CategoryNode, Option<String>, String)> = catalog
            .categories
            .iter()
            .rev()
            .map(|node| (node, None, node.name.clone()))
            .collect();

        while let Some((node, parent_id, path)) = stack.pop() {
            self.client.ensure_not_cancelled()?;

            let (id, existed) = self.create_category(node, parent_id.as_deref(), &path).await?;
            map.insert(path.clone(), id.clone())?;
            if existed {
                reused += 1;
            } else {
                created += 1;
            }

            for child in node.subcategories.iter().rev() {
                let child_path = format!("{path}{PATH_SEPARATOR}{}", child.name);
                stack.push((child, Some(id.clone()), child_path));
            }
        }

        tracing::info!(
            categories = map.len(),
            created,
            reused,
            "Category tree ready"
        );

        Ok(Taxonomy {
            product_type_id,
            product_type_reused,
            map,
            created,
            reused,
        })
    }

    /// Reuse the product type with the canonical name, or create it
    ///
    /// Returns the id and whether it already existed.
    pub async fn ensure_product_type(&self) -> Result<(String, bool)> {
        let name = self.product_type_name.as_str();

        let existing = self.client.product_types_named(name).await?;
        if let Some(found) = existing.into_iter().find(|t| t.name == name) {
            tracing::info!(id = %found.id, name, "Reusing product type");
            return Ok((found.id, true));
        }

        let slug = format!("{}-{}", slugify(name), chrono::Utc::now().timestamp());
        let id = self.client.create_product_type(name, &slug).await?;
        tracing::info!(id = %id, name, slug = %slug, "Created product type");

        Ok((id, false))
    }

    /// Reuse the category with `node.slug`, or create it under `parent_id`
    ///
    /// `path` is the joined path of `node`. Returns the id and whether the
    /// category already existed.
    pub async fn create_category(
        &self,
        node: &CategoryNode,
        parent_id: Option<&str>,
        path: &str,
    ) -> Result<(String, bool)> {
        let existing = self
            .client
            .category_by_slug(&node.slug)
            .await
            .map_err(|e| name_category(e, path))?;

        let (id, existed) = match existing {
            Some(category) => {
                tracing::debug!(path, id = %category.id, "Reusing category");
                (category.id, true)
            }
            None => {
                let id = self
                    .client
                    .create_category(&node.name, &node.slug, parent_id)
                    .await
                    .map_err(|e| name_category(e, path))?;
                tracing::debug!(path, id = %id, "Created category");
                (id, false)
            }
        };

        if let Some(tx) = &self.event_tx {
            tx.send(SyncEvent::CategoryReady {
                path: path.to_string(),
                id: id.clone(),
                reused: existed,
            })
            .ok();
        }

        Ok((id, existed))
    }
}

/// Attach the category path to remote errors so the failure names its category
fn name_category(err: Error, path: &str) -> Error {
    match err {
        Error::RemoteBusiness {
            operation,
            message,
            details,
        }
        | Error::Rejected {
            operation,
            message,
            details,
            ..
        } => Error::Rejected {
            operation,
            subject: format!("category \"{path}\""),
            message,
            details,
        },
        Error::MissingId { operation, .. } => Error::MissingId {
            operation,
            subject: format!("category \"{path}\""),
        },
        other => other,
    }
}

/// Lowercase ASCII slug with runs of other characters collapsed to `-`
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        slug.push_str("product-type");
    }
    slug
}
