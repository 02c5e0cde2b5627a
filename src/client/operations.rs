//! GraphQL documents for every query and mutation the sync job issues.

/// An opaque query or mutation descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    /// GraphQL operation name (also used in logs and errors)
    pub name: &'static str,
    /// Full GraphQL document
    pub document: &'static str,
}

/// Page size for every cursor-paginated listing
pub const PAGE_SIZE: usize = 100;

/// `Products` query
pub const PRODUCTS: Operation = Operation {
    name: "Products",
    document: r#"query Products($after: String) {
  products(first: 100, after: $after) {
    edges { node { id } }
    pageInfo { hasNextPage endCursor }
  }
}"#,
};

/// `RootCategories` query
pub const ROOT_CATEGORIES: Operation = Operation {
    name: "RootCategories",
    document: r#"query RootCategories($after: String) {
  categories(first: 100, after: $after, level: 0) {
    edges { node { id } }
    pageInfo { hasNextPage endCursor }
  }
}"#,
};

/// `ProductTypes` query
pub const PRODUCT_TYPES: Operation = Operation {
    name: "ProductTypes",
    document: r#"query ProductTypes($after: String) {
  productTypes(first: 100, after: $after) {
    edges { node { id } }
    pageInfo { hasNextPage endCursor }
  }
}"#,
};

/// `Channel` query
pub const CHANNEL: Operation = Operation {
    name: "Channel",
    document: r#"query Channel($slug: String!) {
  channel(slug: $slug) { id slug currencyCode }
}"#,
};

/// `ExistingProductTypes` query
pub const EXISTING_PRODUCT_TYPES: Operation = Operation {
    name: "ExistingProductTypes",
    document: r#"query ExistingProductTypes($name: String!) {
  productTypes(first: 100, filter: { search: $name }) {
    edges { node { id name } }
    pageInfo { hasNextPage endCursor }
  }
}"#,
};

/// `CategoryBySlug` query
pub const CATEGORY_BY_SLUG: Operation = Operation {
    name: "CategoryBySlug",
    document: r#"query CategoryBySlug($slug: String!) {
  category(slug: $slug) { id name slug }
}"#,
};

/// `VariantBySku` query
pub const VARIANT_BY_SKU: Operation = Operation {
    name: "VariantBySku",
    document: r#"query VariantBySku($sku: String!) {
  productVariant(sku: $sku) { id sku }
}"#,
};

/// `ProductBulkDelete` mutation
pub const PRODUCT_BULK_DELETE: Operation = Operation {
    name: "ProductBulkDelete",
    document: r#"mutation ProductBulkDelete($ids: [ID!]!) {
  productBulkDelete(ids: $ids) {
    count
    errors { field message code }
  }
}"#,
};

/// `CategoryBulkDelete` mutation
pub const CATEGORY_BULK_DELETE: Operation = Operation {
    name: "CategoryBulkDelete",
    document: r#"mutation CategoryBulkDelete($ids: [ID!]!) {
  categoryBulkDelete(ids: $ids) {
    count
    errors { field message code }
  }
}"#,
};

/// `ProductTypeBulkDelete` mutation
pub const PRODUCT_TYPE_BULK_DELETE: Operation = Operation {
    name: "ProductTypeBulkDelete",
    document: r#"mutation ProductTypeBulkDelete($ids: [ID!]!) {
  productTypeBulkDelete(ids: $ids) {
    count
    errors { field message code }
  }
}"#,
};

/// `ProductTypeCreate` mutation
pub const PRODUCT_TYPE_CREATE: Operation = Operation {
    name: "ProductTypeCreate",
    document: r#"mutation ProductTypeCreate($input: ProductTypeInput!) {
  productTypeCreate(input: $input) {
    productType { id name }
    errors { field message code }
  }
}"#,
};

/// `CategoryCreate` mutation
pub const CATEGORY_CREATE: Operation = Operation {
    name: "CategoryCreate",
    document: r#"mutation CategoryCreate($input: CategoryInput!, $parent: ID) {
  categoryCreate(input: $input, parent: $parent) {
    category { id name slug }
    errors { field message code }
  }
}"#,
};

/// `ProductCreate` mutation
pub const PRODUCT_CREATE: Operation = Operation {
    name: "ProductCreate",
    document: r#"mutation ProductCreate($input: ProductCreateInput!) {
  productCreate(input: $input) {
    product { id name }
    errors { field message code }
  }
}"#,
};

/// `ProductVariantCreate` mutation
pub const PRODUCT_VARIANT_CREATE: Operation = Operation {
    name: "ProductVariantCreate",
    document: r#"mutation ProductVariantCreate($input: ProductVariantCreateInput!) {
  productVariantCreate(input: $input) {
    productVariant { id sku }
    errors { field message code }
  }
}"#,
};

/// `ProductChannelListingUpdate` mutation
pub const PRODUCT_CHANNEL_LISTING_UPDATE: Operation = Operation {
    name: "ProductChannelListingUpdate",
    document: r#"mutation ProductChannelListingUpdate($id: ID!, $input: ProductChannelListingUpdateInput!) {
  productChannelListingUpdate(id: $id, input: $input) {
    product { id }
    errors { field message code }
  }
}"#,
};

/// `ProductVariantChannelListingUpdate` mutation
pub const PRODUCT_VARIANT_CHANNEL_LISTING_UPDATE: Operation = Operation {
    name: "ProductVariantChannelListingUpdate",
    document: r#"mutation ProductVariantChannelListingUpdate($id: ID!, $input: [ProductVariantChannelListingAddInput!]!) {
  productVariantChannelListingUpdate(id: $id, input: $input) {
    variant { id }
    errors { field message code }
  }
}"#,
};

/// Remote entity families wiped by the reset phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Products (variants go with them)
    Product,
    /// Categories; listings return only root (level-0) categories
    Category,
    /// Product types
    ProductType,
}

impl EntityKind {
    /// Paginated id listing for this kind
    pub fn list_operation(self) -> Operation {
        match self {
            EntityKind::Product => PRODUCTS,
            EntityKind::Category => ROOT_CATEGORIES,
            EntityKind::ProductType => PRODUCT_TYPES,
        }
    }

    /// Root field of the listing response
    pub fn list_field(self) -> &'static str {
        match self {
            EntityKind::Product => "products",
            EntityKind::Category => "categories",
            EntityKind::ProductType => "productTypes",
        }
    }

    /// Bulk delete mutation for this kind
    pub fn delete_operation(self) -> Operation {
        match self {
            EntityKind::Product => PRODUCT_BULK_DELETE,
            EntityKind::Category => CATEGORY_BULK_DELETE,
            EntityKind::ProductType => PRODUCT_TYPE_BULK_DELETE,
        }
    }

    /// Root field of the bulk delete response
    pub fn delete_field(self) -> &'static str {
        match self {
            EntityKind::Product => "productBulkDelete",
            EntityKind::Category => "categoryBulkDelete",
            EntityKind::ProductType => "productTypeBulkDelete",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            EntityKind::Product => "product",
            EntityKind::Category => "category",
            EntityKind::ProductType => "product type",
        };
        f.write_str(label)
    }
}
