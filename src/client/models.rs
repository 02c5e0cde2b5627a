//! Wire types for the GraphQL request/response envelope and the payloads we read.

use crate::error::RemoteErrorDetail;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body posted to the GraphQL endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlRequest<'a> {
    /// GraphQL document
    pub query: &'a str,
    /// Operation name inside the document
    pub operation_name: &'a str,
    /// Operation variables
    pub variables: &'a Value,
}

/// Response envelope returned by the GraphQL endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphqlResponse {
    /// Result data (absent or null on failure)
    #[serde(default)]
    pub data: Option<Value>,
    /// Top-level errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<GraphqlError>>,
}

impl GraphqlResponse {
    /// Successful response carrying `data`
    pub fn ok(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: None,
        }
    }

    /// Failed response carrying only top-level errors
    pub fn with_errors(errors: Vec<GraphqlError>) -> Self {
        Self {
            data: None,
            errors: Some(errors),
        }
    }

    /// Whether the body carries data or at least one error
    pub fn is_graphql_envelope(&self) -> bool {
        self.data.is_some() || self.errors.as_ref().is_some_and(|e| !e.is_empty())
    }
}

/// Top-level GraphQL error entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphqlError {
    /// Human-readable message
    pub message: String,
    /// Vendor extensions (error code lives here)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<GraphqlErrorExtensions>,
}

/// Extensions block of a GraphQL error
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphqlErrorExtensions {
    /// Machine-readable error code
    #[serde(default)]
    pub code: Option<String>,
}

impl GraphqlError {
    /// Error with a message only
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            extensions: None,
        }
    }

    /// Error with a message and `extensions.code`
    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            extensions: Some(GraphqlErrorExtensions {
                code: Some(code.into()),
            }),
        }
    }

    /// The `extensions.code` value, if any
    pub fn code(&self) -> Option<&str> {
        self.extensions.as_ref().and_then(|e| e.code.as_deref())
    }
}

impl From<&GraphqlError> for RemoteErrorDetail {
    fn from(err: &GraphqlError) -> Self {
        RemoteErrorDetail {
            message: err.message.clone(),
            code: err.code().map(str::to_string),
            field: None,
        }
    }
}

/// Relay-style connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    /// Page items
    pub edges: Vec<Edge<T>>,
    /// Cursor information
    pub page_info: PageInfo,
}

impl<T> Connection<T> {
    /// Unwrap the edges into their nodes
    pub fn into_nodes(self) -> Vec<T> {
        self.edges.into_iter().map(|e| e.node).collect()
    }
}

/// Connection edge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge<T> {
    /// The item
    pub node: T,
}

/// Pagination cursor block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Whether another page follows
    pub has_next_page: bool,
    /// Cursor to pass as `after` for the next page
    #[serde(default)]
    pub end_cursor: Option<String>,
}

/// Node carrying only an id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdNode {
    /// Remote id
    pub id: String,
}

/// Sales channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    /// Remote id
    pub id: String,
    /// Channel slug
    pub slug: String,
    /// ISO currency code prices are listed in
    pub currency_code: String,
}

/// Product type as returned by `ExistingProductTypes`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductTypeNode {
    /// Remote id
    pub id: String,
    /// Display name
    pub name: String,
}

/// Category as returned by `CategoryBySlug`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCategory {
    /// Remote id
    pub id: String,
    /// Display name
    pub name: String,
    /// Slug
    pub slug: String,
}

/// Variant as returned by `VariantBySku`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteVariant {
    /// Remote id
    pub id: String,
    /// SKU
    #[serde(default)]
    pub sku: Option<String>,
}

/// Payload of the bulk delete mutations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkDeletePayload {
    /// Number of entities actually deleted
    #[serde(default)]
    pub count: usize,
    /// Per-entity errors
    #[serde(default)]
    pub errors: Vec<RemoteErrorDetail>,
}

/// Private metadata entry attached to products and variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataItem {
    /// Key
    pub key: String,
    /// Value
    pub value: String,
}

impl MetadataItem {
    /// Build an entry
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Input of `ProductCreate`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput<'a> {
    /// Product name
    pub name: &'a str,
    /// Product slug
    pub slug: &'a str,
    /// Product type id
    pub product_type: &'a str,
    /// Category id
    pub category: &'a str,
    /// Metadata entries
    pub metadata: &'a [MetadataItem],
}

/// Input of `ProductVariantCreate`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantInput<'a> {
    /// Parent product id
    pub product: &'a str,
    /// SKU
    pub sku: &'a str,
    /// Variant name
    pub name: &'a str,
    /// Whether stock is tracked
    pub track_inventory: bool,
    /// Variant selection attributes (always empty here)
    pub attributes: Vec<Value>,
    /// Metadata entries
    pub metadata: &'a [MetadataItem],
}
