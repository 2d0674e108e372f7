//! Read-only product lookup.
//!
//! Catalog management lives outside the engine; carts only need a product's
//! name, current price and whether it can still be sold.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::ids::ProductId;
use crate::money::Money;

/// Product status in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProductStatus {
    #[default]
    Active,
    /// Not sellable; existing orders keep their snapshot.
    Archived,
}

/// The slice of a product the order engine cares about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub status: ProductStatus,
}

impl Product {
    pub fn new(id: ProductId, name: impl Into<String>, price: Money) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            status: ProductStatus::Active,
        }
    }

    pub fn is_sellable(&self) -> bool {
        self.status == ProductStatus::Active && self.price.is_positive()
    }
}

/// In-memory product index.
#[derive(Debug, Default)]
pub struct Catalog {
    products: Mutex<HashMap<ProductId, Product>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ProductId, Product>> {
        self.products.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a product.
    pub fn upsert(&self, product: Product) {
        self.lock().insert(product.id.clone(), product);
    }

    /// Look up a product that can currently be sold.
    pub fn sellable(&self, id: &ProductId) -> Option<Product> {
        self.lock().get(id).filter(|p| p.is_sellable()).cloned()
    }

    pub fn archive(&self, id: &ProductId) -> bool {
        match self.lock().get_mut(id) {
            Some(product) => {
                product.status = ProductStatus::Archived;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;

    #[test]
    fn test_archived_product_not_sellable() {
        let catalog = Catalog::new();
        let id = ProductId::new("prod-1");
        catalog.upsert(Product::new(id.clone(), "Mug", Money::major(100, Currency::INR)));
        assert!(catalog.sellable(&id).is_some());

        assert!(catalog.archive(&id));
        assert!(catalog.sellable(&id).is_none());
    }

    #[test]
    fn test_zero_price_not_sellable() {
        let product = Product::new(ProductId::new("p"), "Free", Money::zero(Currency::INR));
        assert!(!product.is_sellable());
    }
}
