//! Known ERP collections and their proxy endpoints.

use std::fmt;
use std::str::FromStr;

/// A collection name the CLI or a caller could not resolve.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown collection: {0}")]
pub struct UnknownCollection(pub String);

/// A named collection held by the entity cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Products,
    ProductVariants,
    ProductCategories,
    Quants,
    Locations,
    Warehouses,
    Productions,
    StorageCategories,
    DeliveryCarriers,
}

impl Collection {
    pub const ALL: [Collection; 9] = [
        Collection::Products,
        Collection::ProductVariants,
        Collection::ProductCategories,
        Collection::Quants,
        Collection::Locations,
        Collection::Warehouses,
        Collection::Productions,
        Collection::StorageCategories,
        Collection::DeliveryCarriers,
    ];

    /// Cache name, also the key of the list in the proxy's response.
    pub fn name(self) -> &'static str {
        match self {
            Collection::Products => "products",
            Collection::ProductVariants => "productVariants",
            Collection::ProductCategories => "productCategories",
            Collection::Quants => "quants",
            Collection::Locations => "locations",
            Collection::Warehouses => "warehouses",
            Collection::Productions => "productions",
            Collection::StorageCategories => "storageCategories",
            Collection::DeliveryCarriers => "deliveryCarriers",
        }
    }

    /// Proxy path prefix, e.g. `/products`.
    pub fn path(self) -> &'static str {
        match self {
            Collection::Products => "/products",
            Collection::ProductVariants => "/product-variants",
            Collection::ProductCategories => "/product-categories",
            Collection::Quants => "/quants",
            Collection::Locations => "/locations",
            Collection::Warehouses => "/warehouses",
            Collection::Productions => "/productions",
            Collection::StorageCategories => "/storage-categories",
            Collection::DeliveryCarriers => "/delivery-carriers",
        }
    }

    /// Odoo model behind the collection.
    pub fn model(self) -> &'static str {
        match self {
            Collection::Products => "product.template",
            Collection::ProductVariants => "product.product",
            Collection::ProductCategories => "product.category",
            Collection::Quants => "stock.quant",
            Collection::Locations => "stock.location",
            Collection::Warehouses => "stock.warehouse",
            Collection::Productions => "mrp.production",
            Collection::StorageCategories => "stock.storage.category",
            Collection::DeliveryCarriers => "delivery.carrier",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Collection {
    type Err = UnknownCollection;

    /// Accepts singular/plural, kebab-, snake- and camel-case names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "product" | "products" | "template" | "templates" => Ok(Collection::Products),
            "productvariant" | "productvariants" | "variant" | "variants" => {
                Ok(Collection::ProductVariants)
            }
            "productcategory" | "productcategories" | "category" | "categories" => {
                Ok(Collection::ProductCategories)
            }
            "quant" | "quants" | "inventory" => Ok(Collection::Quants),
            "location" | "locations" => Ok(Collection::Locations),
            "warehouse" | "warehouses" => Ok(Collection::Warehouses),
            "production" | "productions" | "mo" | "mos" => Ok(Collection::Productions),
            "storagecategory" | "storagecategories" => Ok(Collection::StorageCategories),
            "deliverycarrier" | "deliverycarriers" | "carrier" | "carriers" | "deliverymethod"
            | "deliverymethods" => Ok(Collection::DeliveryCarriers),
            _ => Err(UnknownCollection(s.to_string())),
        }
    }
}
