//! In-memory stand-in for the remote commerce service.
//!
//! Implements [`Transport`] by interpreting each operation by name against a
//! small entity store. Supports fault injection per operation, call
//! recording, artificial latency and two category delete behaviors
//! (cascade, or promote children to roots).

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use catalog_sync::client::{GraphqlError, GraphqlRequest, GraphqlResponse, Transport};
use catalog_sync::{Error, RemoteErrorDetail, Result};
use serde_json::{Value, json};

/// A failure to inject into the next call of an operation
#[derive(Debug, Clone)]
pub enum Fault {
    /// Transport-level connection failure
    Connection,
    /// HTTP 429
    RateLimited,
    /// Top-level GraphQL errors
    GraphqlErrors(Vec<GraphqlError>),
    /// Mutation payload errors (the mutation itself does nothing)
    PayloadErrors(Vec<RemoteErrorDetail>),
}

#[derive(Debug, Clone)]
pub struct FakeCategory {
    pub name: String,
    pub slug: String,
    pub parent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FakeProduct {
    pub name: String,
    pub slug: String,
    pub product_type: String,
    pub category: String,
    pub metadata: Vec<(String, String)>,
    pub published_in: Vec<PublishedListing>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedListing {
    pub channel_id: String,
    pub is_published: bool,
    pub visible_in_listings: bool,
    pub available_for_purchase: bool,
}

#[derive(Debug, Clone)]
pub struct FakeVariant {
    pub product: String,
    pub sku: String,
    pub name: String,
    pub track_inventory: bool,
    pub metadata: Vec<(String, String)>,
    pub prices: Vec<PriceListing>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceListing {
    pub channel_id: String,
    pub price: String,
    pub cost_price: String,
}

#[derive(Debug, Clone)]
pub struct FakeChannel {
    pub id: String,
    pub slug: String,
    pub currency_code: String,
}

#[derive(Default)]
struct Store {
    next_id: u64,
    categories: BTreeMap<String, FakeCategory>,
    products: BTreeMap<String, FakeProduct>,
    variants: BTreeMap<String, FakeVariant>,
    product_types: BTreeMap<String, (String, String)>,
    channels: Vec<FakeChannel>,
    faults: HashMap<String, VecDeque<Option<Fault>>>,
    panic_on: Option<(String, usize)>,
    calls: Vec<String>,
}

impl Store {
    fn new_id(&mut self, kind: &str) -> String {
        self.next_id += 1;
        format!("{kind}:{}", self.next_id)
    }
}

/// In-memory remote service
pub struct FakeRemote {
    store: Mutex<Store>,
    promote_children_on_delete: bool,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for FakeRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRemote {
    /// Empty remote with a `default-channel` in USD
    pub fn new() -> Self {
        let remote = Self {
            store: Mutex::new(Store::default()),
            promote_children_on_delete: false,
            latency: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        };
        remote.add_channel("default-channel", "USD");
        remote
    }

    /// Deleting a category re-parents its children to the root instead of cascading
    pub fn promoting_children(mut self) -> Self {
        self.promote_children_on_delete = true;
        self
    }

    /// Sleep this long inside every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn store(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap()
    }

    // --- seeding -------------------------------------------------------

    pub fn add_channel(&self, slug: &str, currency: &str) -> String {
        let mut store = self.store();
        let id = store.new_id("Channel");
        store.channels.push(FakeChannel {
            id: id.clone(),
            slug: slug.to_string(),
            currency_code: currency.to_string(),
        });
        id
    }

    pub fn seed_category(&self, name: &str, slug: &str, parent: Option<&str>) -> String {
        let mut store = self.store();
        let id = store.new_id("Category");
        store.categories.insert(
            id.clone(),
            FakeCategory {
                name: name.to_string(),
                slug: slug.to_string(),
                parent: parent.map(str::to_string),
            },
        );
        id
    }

    pub fn seed_product_type(&self, name: &str) -> String {
        let mut store = self.store();
        let id = store.new_id("ProductType");
        let slug = name.to_lowercase().replace(' ', "-");
        store
            .product_types
            .insert(id.clone(), (name.to_string(), slug));
        id
    }

    /// Seed `count` products (each with one variant) in a fresh category
    pub fn seed_products(&self, count: usize) {
        let category = self.seed_category("Seeded", "seeded", None);
        let product_type = self.seed_product_type("Seeded Type");
        let mut store = self.store();
        for n in 0..count {
            let product_id = store.new_id("Product");
            store.products.insert(
                product_id.clone(),
                FakeProduct {
                    name: format!("Seeded {n}"),
                    slug: format!("seeded-{n}"),
                    product_type: product_type.clone(),
                    category: category.clone(),
                    metadata: Vec::new(),
                    published_in: Vec::new(),
                },
            );
            let variant_id = store.new_id("ProductVariant");
            store.variants.insert(
                variant_id,
                FakeVariant {
                    product: product_id,
                    sku: format!("SEED-{n}"),
                    name: format!("Seeded {n}"),
                    track_inventory: false,
                    metadata: Vec::new(),
                    prices: Vec::new(),
                },
            );
        }
    }

    // --- fault injection -----------------------------------------------

    /// Make the next `times` calls of `operation` fail with `fault`
    pub fn fail_next(&self, operation: &str, fault: Fault, times: usize) {
        let mut store = self.store();
        let queue = store.faults.entry(operation.to_string()).or_default();
        for _ in 0..times {
            queue.push_back(Some(fault.clone()));
        }
    }

    /// Let `successes` calls of `operation` through, then fail the next one
    pub fn fail_after(&self, operation: &str, successes: usize, fault: Fault) {
        let mut store = self.store();
        let queue = store.faults.entry(operation.to_string()).or_default();
        for _ in 0..successes {
            queue.push_back(None);
        }
        queue.push_back(Some(fault));
    }

    /// Let `successes` calls of `operation` through, then panic inside the next one
    pub fn panic_after(&self, operation: &str, successes: usize) {
        self.store().panic_on = Some((operation.to_string(), successes));
    }

    fn should_panic(&self, operation: &str) -> bool {
        let mut store = self.store();
        let Some((op, remaining)) = store.panic_on.as_mut() else {
            return false;
        };
        if op.as_str() != operation {
            return false;
        }
        if *remaining > 0 {
            *remaining -= 1;
            return false;
        }
        store.panic_on = None;
        true
    }

    // --- inspection ----------------------------------------------------

    pub fn calls(&self, operation: &str) -> usize {
        self.store().calls.iter().filter(|c| *c == operation).count()
    }

    pub fn total_calls(&self) -> usize {
        self.store().calls.len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn product_count(&self) -> usize {
        self.store().products.len()
    }

    pub fn variant_count(&self) -> usize {
        self.store().variants.len()
    }

    pub fn category_count(&self) -> usize {
        self.store().categories.len()
    }

    pub fn product_type_count(&self) -> usize {
        self.store().product_types.len()
    }

    pub fn categories(&self) -> Vec<(String, FakeCategory)> {
        self.store()
            .categories
            .iter()
            .map(|(id, c)| (id.clone(), c.clone()))
            .collect()
    }

    pub fn products(&self) -> Vec<(String, FakeProduct)> {
        self.store()
            .products
            .iter()
            .map(|(id, p)| (id.clone(), p.clone()))
            .collect()
    }

    pub fn variants(&self) -> Vec<(String, FakeVariant)> {
        self.store()
            .variants
            .iter()
            .map(|(id, v)| (id.clone(), v.clone()))
            .collect()
    }

    pub fn skus(&self) -> Vec<String> {
        let mut skus: Vec<String> = self
            .store()
            .variants
            .values()
            .map(|v| v.sku.clone())
            .collect();
        skus.sort();
        skus
    }

    pub fn channel_id(&self, slug: &str) -> Option<String> {
        self.store()
            .channels
            .iter()
            .find(|c| c.slug == slug)
            .map(|c| c.id.clone())
    }

    // --- dispatch ------------------------------------------------------

    fn handle(&self, operation: &str, vars: &Value) -> Result<GraphqlResponse> {
        let mut store = self.store();
        store.calls.push(operation.to_string());

        if let Some(Some(fault)) = store.faults.get_mut(operation).and_then(VecDeque::pop_front) {
            match fault {
                Fault::Connection => {
                    return Err(Error::Connection("connection refused".to_string()));
                }
                Fault::RateLimited => {
                    return Err(Error::RateLimited {
                        operation: operation.to_string(),
                    });
                }
                Fault::GraphqlErrors(errors) => return Ok(GraphqlResponse::with_errors(errors)),
                Fault::PayloadErrors(errors) => {
                    let field = payload_field(operation);
                    return Ok(GraphqlResponse::ok(json!({
                        field: { "count": 0, "errors": errors }
                    })));
                }
            }
        }

        let data = match operation {
            "Products" => {
                let ids: Vec<String> = store.products.keys().cloned().collect();
                paginate(&ids, vars, "products", |id| json!({ "id": id }))
            }
            "RootCategories" => {
                let ids: Vec<String> = store
                    .categories
                    .iter()
                    .filter(|(_, c)| c.parent.is_none())
                    .map(|(id, _)| id.clone())
                    .collect();
                paginate(&ids, vars, "categories", |id| json!({ "id": id }))
            }
            "ProductTypes" => {
                let ids: Vec<String> = store.product_types.keys().cloned().collect();
                paginate(&ids, vars, "productTypes", |id| json!({ "id": id }))
            }
            "Channel" => {
                let slug = str_var(vars, "slug");
                let channel = store.channels.iter().find(|c| c.slug == slug).map(|c| {
                    json!({ "id": c.id, "slug": c.slug, "currencyCode": c.currency_code })
                });
                json!({ "channel": channel })
            }
            "ExistingProductTypes" => {
                let search = str_var(vars, "name").to_lowercase();
                let edges: Vec<Value> = store
                    .product_types
                    .iter()
                    .filter(|(_, (name, _))| name.to_lowercase().contains(&search))
                    .map(|(id, (name, _))| json!({ "node": { "id": id, "name": name } }))
                    .collect();
                json!({
                    "productTypes": {
                        "edges": edges,
                        "pageInfo": { "hasNextPage": false, "endCursor": null }
                    }
                })
            }
            "CategoryBySlug" => {
                let slug = str_var(vars, "slug");
                let category = store
                    .categories
                    .iter()
                    .find(|(_, c)| c.slug == slug)
                    .map(|(id, c)| json!({ "id": id, "name": c.name, "slug": c.slug }));
                json!({ "category": category })
            }
            "VariantBySku" => {
                let sku = str_var(vars, "sku");
                let variant = store
                    .variants
                    .iter()
                    .find(|(_, v)| v.sku == sku)
                    .map(|(id, v)| json!({ "id": id, "sku": v.sku }));
                json!({ "productVariant": variant })
            }
            "ProductBulkDelete" => {
                let (count, errors) = delete_ids(&mut store.products, vars);
                let remaining: Vec<String> = store.products.keys().cloned().collect();
                store
                    .variants
                    .retain(|_, v| remaining.contains(&v.product));
                json!({ "productBulkDelete": { "count": count, "errors": errors } })
            }
            "CategoryBulkDelete" => {
                let ids = id_list(vars);
                let mut count = 0;
                let mut errors = Vec::new();
                for id in ids {
                    if store.categories.remove(&id).is_none() {
                        errors.push(not_found(&id));
                        continue;
                    }
                    count += 1;
                    if self.promote_children_on_delete {
                        for child in store.categories.values_mut() {
                            if child.parent.as_deref() == Some(id.as_str()) {
                                child.parent = None;
                            }
                        }
                    } else {
                        remove_descendants(&mut store.categories, &id);
                    }
                }
                json!({ "categoryBulkDelete": { "count": count, "errors": errors } })
            }
            "ProductTypeBulkDelete" => {
                let (count, errors) = delete_ids(&mut store.product_types, vars);
                json!({ "productTypeBulkDelete": { "count": count, "errors": errors } })
            }
            "ProductTypeCreate" => {
                let name = str_var(&vars["input"], "name");
                let slug = str_var(&vars["input"], "slug");
                if store.product_types.values().any(|(_, s)| *s == slug) {
                    mutation_error("productTypeCreate", "slug", "Slug already exists", "UNIQUE")
                } else {
                    let id = store.new_id("ProductType");
                    store.product_types.insert(id.clone(), (name.clone(), slug));
                    json!({
                        "productTypeCreate": {
                            "productType": { "id": id, "name": name },
                            "errors": []
                        }
                    })
                }
            }
            "CategoryCreate" => {
                let name = str_var(&vars["input"], "name");
                let slug = str_var(&vars["input"], "slug");
                let parent = vars["parent"].as_str().map(str::to_string);

                if store.categories.values().any(|c| c.slug == slug) {
                    mutation_error("categoryCreate", "slug", "Category with this Slug already exists.", "UNIQUE")
                } else if parent
                    .as_ref()
                    .is_some_and(|p| !store.categories.contains_key(p))
                {
                    mutation_error("categoryCreate", "parent", "Couldn't resolve id", "NOT_FOUND")
                } else {
                    let id = store.new_id("Category");
                    store.categories.insert(
                        id.clone(),
                        FakeCategory {
                            name: name.clone(),
                            slug: slug.clone(),
                            parent,
                        },
                    );
                    json!({
                        "categoryCreate": {
                            "category": { "id": id, "name": name, "slug": slug },
                            "errors": []
                        }
                    })
                }
            }
            "ProductCreate" => {
                let input = &vars["input"];
                let category = str_var(input, "category");
                let product_type = str_var(input, "productType");

                if !store.categories.contains_key(&category) {
                    mutation_error("productCreate", "category", "Couldn't resolve id", "NOT_FOUND")
                } else if !store.product_types.contains_key(&product_type) {
                    mutation_error("productCreate", "productType", "Couldn't resolve id", "NOT_FOUND")
                } else {
                    let id = store.new_id("Product");
                    let name = str_var(input, "name");
                    store.products.insert(
                        id.clone(),
                        FakeProduct {
                            name: name.clone(),
                            slug: str_var(input, "slug"),
                            product_type,
                            category,
                            metadata: metadata_var(input),
                            published_in: Vec::new(),
                        },
                    );
                    json!({
                        "productCreate": { "product": { "id": id, "name": name }, "errors": [] }
                    })
                }
            }
            "ProductVariantCreate" => {
                let input = &vars["input"];
                let sku = str_var(input, "sku");
                let product = str_var(input, "product");

                if store.variants.values().any(|v| v.sku == sku) {
                    mutation_error("productVariantCreate", "sku", "Product with this SKU already exists.", "UNIQUE")
                } else if !store.products.contains_key(&product) {
                    mutation_error("productVariantCreate", "product", "Couldn't resolve id", "NOT_FOUND")
                } else {
                    let id = store.new_id("ProductVariant");
                    store.variants.insert(
                        id.clone(),
                        FakeVariant {
                            product,
                            sku: sku.clone(),
                            name: str_var(input, "name"),
                            track_inventory: input["trackInventory"].as_bool().unwrap_or(true),
                            metadata: metadata_var(input),
                            prices: Vec::new(),
                        },
                    );
                    json!({
                        "productVariantCreate": {
                            "productVariant": { "id": id, "sku": sku },
                            "errors": []
                        }
                    })
                }
            }
            "ProductChannelListingUpdate" => {
                let id = str_var(vars, "id");
                let updates = vars["input"]["updateChannels"]
                    .as_array()
                    .cloned()
                    .unwrap_or_default();
                match store.products.get_mut(&id) {
                    Some(product) => {
                        for update in updates {
                            product.published_in.push(PublishedListing {
                                channel_id: str_var(&update, "channelId"),
                                is_published: update["isPublished"].as_bool().unwrap_or(false),
                                visible_in_listings: update["visibleInListings"]
                                    .as_bool()
                                    .unwrap_or(false),
                                available_for_purchase: update["isAvailableForPurchase"]
                                    .as_bool()
                                    .unwrap_or(false),
                            });
                        }
                        json!({
                            "productChannelListingUpdate": { "product": { "id": id }, "errors": [] }
                        })
                    }
                    None => mutation_error(
                        "productChannelListingUpdate",
                        "id",
                        "Couldn't resolve id",
                        "NOT_FOUND",
                    ),
                }
            }
            "ProductVariantChannelListingUpdate" => {
                let id = str_var(vars, "id");
                let listings = vars["input"].as_array().cloned().unwrap_or_default();
                match store.variants.get_mut(&id) {
                    Some(variant) => {
                        for listing in listings {
                            variant.prices.push(PriceListing {
                                channel_id: str_var(&listing, "channelId"),
                                price: str_var(&listing, "price"),
                                cost_price: str_var(&listing, "costPrice"),
                            });
                        }
                        json!({
                            "productVariantChannelListingUpdate": {
                                "variant": { "id": id },
                                "errors": []
                            }
                        })
                    }
                    None => mutation_error(
                        "productVariantChannelListingUpdate",
                        "id",
                        "Couldn't resolve id",
                        "NOT_FOUND",
                    ),
                }
            }
            other => {
                return Ok(GraphqlResponse::with_errors(vec![GraphqlError::new(format!(
                    "Unknown operation {other}"
                ))]));
            }
        };

        Ok(GraphqlResponse::ok(data))
    }
}

#[async_trait]
impl Transport for FakeRemote {
    async fn send(&self, request: &GraphqlRequest<'_>) -> Result<GraphqlResponse> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.should_panic(request.operation_name) {
            panic!("injected panic in {}", request.operation_name);
        }
        let response = self.handle(request.operation_name, request.variables);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}

fn payload_field(operation: &str) -> String {
    let mut chars = operation.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn str_var(vars: &Value, key: &str) -> String {
    vars[key].as_str().unwrap_or_default().to_string()
}

fn id_list(vars: &Value) -> Vec<String> {
    vars["ids"]
        .as_array()
        .map(|ids| {
            ids.iter()
                .filter_map(|id| id.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn metadata_var(input: &Value) -> Vec<(String, String)> {
    input["metadata"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|item| (str_var(item, "key"), str_var(item, "value")))
                .collect()
        })
        .unwrap_or_default()
}

fn not_found(id: &str) -> Value {
    json!({ "field": "ids", "message": format!("Couldn't resolve id: {id}"), "code": "NOT_FOUND" })
}

fn mutation_error(field: &str, input_field: &str, message: &str, code: &str) -> Value {
    json!({ field: { "errors": [{ "field": input_field, "message": message, "code": code }] } })
}

fn delete_ids<V>(entities: &mut BTreeMap<String, V>, vars: &Value) -> (usize, Vec<Value>) {
    let mut count = 0;
    let mut errors = Vec::new();
    for id in id_list(vars) {
        if entities.remove(&id).is_some() {
            count += 1;
        } else {
            errors.push(not_found(&id));
        }
    }
    (count, errors)
}

fn remove_descendants(categories: &mut BTreeMap<String, FakeCategory>, root: &str) {
    let mut stack = vec![root.to_string()];
    while let Some(parent) = stack.pop() {
        let children: Vec<String> = categories
            .iter()
            .filter(|(_, c)| c.parent.as_deref() == Some(parent.as_str()))
            .map(|(id, _)| id.clone())
            .collect();
        for child in children {
            categories.remove(&child);
            stack.push(child);
        }
    }
}

/// Cursor pagination over `ids` with the client's page size; the cursor is the next offset
fn paginate(ids: &[String], vars: &Value, field: &str, node: impl Fn(&str) -> Value) -> Value {
    const PAGE: usize = catalog_sync::client::operations::PAGE_SIZE;

    let start: usize = vars["after"]
        .as_str()
        .and_then(|c| c.parse().ok())
        .unwrap_or(0);
    let end = (start + PAGE).min(ids.len());
    let page: &[String] = ids.get(start..end).unwrap_or_default();
    let has_next = end < ids.len();
    let end_cursor = has_next.then(|| end.to_string());

    let edges: Vec<Value> = page.iter().map(|id| json!({ "node": node(id) })).collect();
    json!({
        field: {
            "edges": edges,
            "pageInfo": {
                "hasNextPage": has_next,
                "endCursor": end_cursor,
            }
        }
    })
}
