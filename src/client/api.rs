//! Typed helpers over [`CatalogClient::execute`].
//!
//! Each helper builds the variables for one operation, plucks its root field
//! out of `data` and turns payload-level `errors` into [`Error::Rejected`].

use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::CatalogClient;
use super::models::{
    BulkDeletePayload, Channel, Connection, IdNode, ProductInput, ProductTypeNode, RemoteCategory,
    RemoteVariant, VariantInput,
};
use super::operations::{self, EntityKind, Operation};
use crate::error::{Error, RemoteErrorDetail, Result, join_messages};

/// One page of ids from a paginated listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdPage {
    /// Ids on this page
    pub ids: Vec<String>,
    /// Cursor for the next page, `None` on the last page
    pub next_cursor: Option<String>,
}

impl CatalogClient {
    /// Fetch one page of ids of `kind`, starting after `after`
    pub async fn fetch_id_page(&self, kind: EntityKind, after: Option<&str>) -> Result<IdPage> {
        let operation = kind.list_operation();
        let data = self.execute(&operation, json!({ "after": after })).await?;
        let connection: Connection<IdNode> = take_field(&operation, data, kind.list_field())?;

        let next_cursor = if connection.page_info.has_next_page {
            match connection.page_info.end_cursor.clone() {
                Some(cursor) => Some(cursor),
                None => {
                    return Err(Error::Protocol(format!(
                        "{} reported another page without an end cursor",
                        operation.name
                    )));
                }
            }
        } else {
            None
        };

        Ok(IdPage {
            ids: connection.into_nodes().into_iter().map(|n| n.id).collect(),
            next_cursor,
        })
    }

    /// Bulk-delete `ids` of `kind`, returning the raw payload
    ///
    /// Payload errors are returned to the caller instead of being raised,
    /// because some of them (already deleted entities) are expected.
    pub async fn bulk_delete(&self, kind: EntityKind, ids: &[String]) -> Result<BulkDeletePayload> {
        let operation = kind.delete_operation();
        let data = self.execute(&operation, json!({ "ids": ids })).await?;
        take_field(&operation, data, kind.delete_field())
    }

    /// Look up a sales channel by slug
    pub async fn channel_by_slug(&self, slug: &str) -> Result<Option<Channel>> {
        let data = self
            .execute(&operations::CHANNEL, json!({ "slug": slug }))
            .await?;
        take_optional_field(&operations::CHANNEL, data, "channel")
    }

    /// Product types whose name matches the `name` search filter
    pub async fn product_types_named(&self, name: &str) -> Result<Vec<ProductTypeNode>> {
        let operation = operations::EXISTING_PRODUCT_TYPES;
        let data = self.execute(&operation, json!({ "name": name })).await?;
        let connection: Connection<ProductTypeNode> = take_field(&operation, data, "productTypes")?;
        Ok(connection.into_nodes())
    }

    /// Create a product type without variant attributes, returning its id
    pub async fn create_product_type(&self, name: &str, slug: &str) -> Result<String> {
        let operation = operations::PRODUCT_TYPE_CREATE;
        let variables = json!({
            "input": {
                "name": name,
                "slug": slug,
                "hasVariants": false,
                "isShippingRequired": true,
            }
        });
        let data = self.execute(&operation, variables).await?;
        created_id(&operation, data, "productTypeCreate", "productType", name)
    }

    /// Look up a category by slug
    pub async fn category_by_slug(&self, slug: &str) -> Result<Option<RemoteCategory>> {
        let data = self
            .execute(&operations::CATEGORY_BY_SLUG, json!({ "slug": slug }))
            .await?;
        take_optional_field(&operations::CATEGORY_BY_SLUG, data, "category")
    }

    /// Create a category under `parent` (or at the root), returning its id
    pub async fn create_category(
        &self,
        name: &str,
        slug: &str,
        parent: Option<&str>,
    ) -> Result<String> {
        let operation = operations::CATEGORY_CREATE;
        let variables = json!({
            "input": { "name": name, "slug": slug },
            "parent": parent,
        });
        let data = self.execute(&operation, variables).await?;
        created_id(&operation, data, "categoryCreate", "category", name)
    }

    /// Look up a product variant by SKU
    pub async fn variant_by_sku(&self, sku: &str) -> Result<Option<RemoteVariant>> {
        let data = self
            .execute(&operations::VARIANT_BY_SKU, json!({ "sku": sku }))
            .await?;
        take_optional_field(&operations::VARIANT_BY_SKU, data, "productVariant")
    }

    /// Create a product, returning its id
    pub async fn create_product(&self, input: &ProductInput<'_>, subject: &str) -> Result<String> {
        let operation = operations::PRODUCT_CREATE;
        let data = self
            .execute(&operation, json!({ "input": input }))
            .await?;
        created_id(&operation, data, "productCreate", "product", subject)
    }

    /// Create a product variant, returning its id
    pub async fn create_variant(&self, input: &VariantInput<'_>, subject: &str) -> Result<String> {
        let operation = operations::PRODUCT_VARIANT_CREATE;
        let data = self
            .execute(&operation, json!({ "input": input }))
            .await?;
        created_id(&operation, data, "productVariantCreate", "productVariant", subject)
    }

    /// Publish a product in a channel, visible and available for purchase
    pub async fn update_product_channel_listing(
        &self,
        product_id: &str,
        channel_id: &str,
        subject: &str,
    ) -> Result<()> {
        let operation = operations::PRODUCT_CHANNEL_LISTING_UPDATE;
        let variables = json!({
            "id": product_id,
            "input": {
                "updateChannels": [{
                    "channelId": channel_id,
                    "isPublished": true,
                    "visibleInListings": true,
                    "isAvailableForPurchase": true,
                }]
            }
        });
        let data = self.execute(&operation, variables).await?;
        check_payload(&operation, data, "productChannelListingUpdate", subject).map(drop)
    }

    /// Set a variant's price (and cost price) in a channel
    pub async fn update_variant_channel_listing(
        &self,
        variant_id: &str,
        channel_id: &str,
        amount: &str,
        subject: &str,
    ) -> Result<()> {
        let operation = operations::PRODUCT_VARIANT_CHANNEL_LISTING_UPDATE;
        let variables = json!({
            "id": variant_id,
            "input": [{
                "channelId": channel_id,
                "price": amount,
                "costPrice": amount,
            }]
        });
        let data = self.execute(&operation, variables).await?;
        check_payload(&operation, data, "productVariantChannelListingUpdate", subject).map(drop)
    }
}

/// Remove `field` from `data` and deserialize it
fn take_field<T: DeserializeOwned>(operation: &Operation, mut data: Value, field: &str) -> Result<T> {
    let value = data
        .get_mut(field)
        .map(Value::take)
        .filter(|v| !v.is_null())
        .ok_or_else(|| {
            Error::Protocol(format!("response to {} is missing `{field}`", operation.name))
        })?;

    serde_json::from_value(value).map_err(|e| {
        Error::Protocol(format!(
            "unexpected shape of `{field}` in {}: {e}",
            operation.name
        ))
    })
}

/// Like [`take_field`], but a null or absent field is `None`
fn take_optional_field<T: DeserializeOwned>(
    operation: &Operation,
    mut data: Value,
    field: &str,
) -> Result<Option<T>> {
    match data.get_mut(field).map(Value::take) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
            Error::Protocol(format!(
                "unexpected shape of `{field}` in {}: {e}",
                operation.name
            ))
        }),
    }
}

/// Take the mutation payload under `field` and fail on a non-empty `errors` list
fn check_payload(operation: &Operation, data: Value, field: &str, subject: &str) -> Result<Value> {
    let payload: Value = take_field(operation, data, field)?;

    let details: Vec<RemoteErrorDetail> = match payload.get("errors") {
        None | Some(Value::Null) => Vec::new(),
        Some(errors) => serde_json::from_value(errors.clone()).map_err(|e| {
            Error::Protocol(format!("unexpected errors list in {}: {e}", operation.name))
        })?,
    };

    if !details.is_empty() {
        return Err(Error::Rejected {
            operation: operation.name.to_string(),
            subject: subject.to_string(),
            message: join_messages(&details),
            details,
        });
    }

    Ok(payload)
}

/// Check the payload and extract `<entity>.id` from it
fn created_id(
    operation: &Operation,
    data: Value,
    field: &str,
    entity: &str,
    subject: &str,
) -> Result<String> {
    let payload = check_payload(operation, data, field, subject)?;

    payload
        .get(entity)
        .and_then(|e| e.get("id"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::MissingId {
            operation: operation.name.to_string(),
            subject: subject.to_string(),
        })
}
