//! Cart and line item types.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::OrderError;
use crate::ids::{ProductId, UserId};
use crate::money::{Currency, Money};

/// Bounds applied to every cart mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLimits {
    pub max_quantity_per_line: i64,
    pub max_lines: usize,
}

impl Default for CartLimits {
    fn default() -> Self {
        Self {
            max_quantity_per_line: 10,
            max_lines: 20,
        }
    }
}

impl CartLimits {
    fn check_quantity(&self, quantity: i64) -> Result<(), OrderError> {
        if quantity <= 0 {
            return Err(OrderError::InvalidQuantity(quantity));
        }
        if quantity > self.max_quantity_per_line {
            return Err(OrderError::QuantityExceedsLimit {
                requested: quantity,
                max: self.max_quantity_per_line,
            });
        }
        Ok(())
    }
}

/// A user's shopping cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cart {
    pub user_id: UserId,
    pub items: Vec<CartItem>,
    pub currency: Currency,
}

impl Cart {
    /// Create an empty cart.
    pub fn new(user_id: UserId, currency: Currency) -> Self {
        Self {
            user_id,
            items: Vec::new(),
            currency,
        }
    }

    /// Add units of a product, merging into an existing line.
    ///
    /// The unit price is captured when the line is first created. Returns
    /// the resulting line quantity.
    pub fn add_item(
        &mut self,
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: i64,
        unit_price: Money,
        limits: &CartLimits,
    ) -> Result<i64, OrderError> {
        if quantity <= 0 {
            return Err(OrderError::InvalidQuantity(quantity));
        }
        if unit_price.currency != self.currency {
            return Err(OrderError::CurrencyMismatch {
                expected: self.currency.code().to_string(),
                got: unit_price.currency.code().to_string(),
            });
        }

        // Check if item already exists
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            let new_quantity = existing
                .quantity
                .checked_add(quantity)
                .ok_or(OrderError::Overflow)?;
            limits.check_quantity(new_quantity)?;
            existing.quantity = new_quantity;
            return Ok(new_quantity);
        }

        limits.check_quantity(quantity)?;
        if self.items.len() >= limits.max_lines {
            return Err(OrderError::CartFull {
                max: limits.max_lines,
            });
        }

        self.items.push(CartItem {
            product_id,
            product_name: product_name.into(),
            quantity,
            unit_price,
        });
        Ok(quantity)
    }

    /// Set a line's quantity; zero removes the line.
    pub fn update_quantity(
        &mut self,
        product_id: &ProductId,
        quantity: i64,
        limits: &CartLimits,
    ) -> Result<(), OrderError> {
        if quantity == 0 {
            return self.remove_item(product_id);
        }
        limits.check_quantity(quantity)?;

        let item = self
            .items
            .iter_mut()
            .find(|i| &i.product_id == product_id)
            .ok_or_else(|| OrderError::ItemNotInCart(product_id.clone()))?;
        item.quantity = quantity;
        Ok(())
    }

    /// Remove a line from the cart.
    pub fn remove_item(&mut self, product_id: &ProductId) -> Result<(), OrderError> {
        let len_before = self.items.len();
        self.items.retain(|i| &i.product_id != product_id);
        if self.items.len() == len_before {
            return Err(OrderError::ItemNotInCart(product_id.clone()));
        }
        Ok(())
    }

    /// Clear all items from the cart.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total item count (sum of quantities).
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn get_item(&self, product_id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| &i.product_id == product_id)
    }

    /// Sum of line totals.
    pub fn subtotal(&self) -> Result<Money, OrderError> {
        let totals = self
            .items
            .iter()
            .map(CartItem::line_total)
            .collect::<Result<Vec<_>, _>>()?;
        Money::try_sum(totals.iter(), self.currency).ok_or(OrderError::Overflow)
    }

    /// Content hash of the cart lines.
    ///
    /// Independent of line order; any change to a product, quantity or
    /// captured price changes the fingerprint.
    pub fn fingerprint(&self) -> String {
        fingerprint_lines(
            self.items
                .iter()
                .map(|i| (&i.product_id, i.quantity, i.unit_price)),
        )
    }
}

/// Hash `(product, quantity, unit price)` triples in product order.
pub fn fingerprint_lines<'a>(
    lines: impl Iterator<Item = (&'a ProductId, i64, Money)>,
) -> String {
    let mut lines: Vec<_> = lines.collect();
    lines.sort_by(|a, b| a.0.cmp(b.0));

    let mut hasher = Sha256::new();
    for (product_id, quantity, price) in lines {
        hasher.update(product_id.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(quantity.to_be_bytes());
        hasher.update(price.minor.to_be_bytes());
        hasher.update(price.currency.code().as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// A line in the cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartItem {
    pub product_id: ProductId,
    /// Product name (denormalized for display).
    pub product_name: String,
    pub quantity: i64,
    /// Price captured when the line was added.
    pub unit_price: Money,
}

impl CartItem {
    /// unit_price * quantity.
    pub fn line_total(&self) -> Result<Money, OrderError> {
        self.unit_price
            .try_multiply(self.quantity)
            .ok_or(OrderError::Overflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart() -> Cart {
        Cart::new(UserId::new("user-1"), Currency::INR)
    }

    fn price(units: i64) -> Money {
        Money::major(units, Currency::INR)
    }

    #[test]
    fn test_add_same_item_increases_quantity() {
        let mut cart = cart();
        let limits = CartLimits::default();
        let id = ProductId::new("p1");

        cart.add_item(id.clone(), "Mug", 1, price(100), &limits).unwrap();
        let qty = cart.add_item(id.clone(), "Mug", 2, price(100), &limits).unwrap();

        assert_eq!(qty, 3);
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_quantity_bounds() {
        let mut cart = cart();
        let limits = CartLimits::default();
        let id = ProductId::new("p1");

        assert!(matches!(
            cart.add_item(id.clone(), "Mug", 0, price(100), &limits),
            Err(OrderError::InvalidQuantity(0))
        ));
        assert!(matches!(
            cart.add_item(id.clone(), "Mug", 11, price(100), &limits),
            Err(OrderError::QuantityExceedsLimit { requested: 11, max: 10 })
        ));

        cart.add_item(id.clone(), "Mug", 8, price(100), &limits).unwrap();
        assert!(cart.add_item(id.clone(), "Mug", 3, price(100), &limits).is_err());
        assert_eq!(cart.get_item(&id).unwrap().quantity, 8);
    }

    #[test]
    fn test_cart_full() {
        let mut cart = cart();
        let limits = CartLimits {
            max_quantity_per_line: 10,
            max_lines: 2,
        };
        cart.add_item(ProductId::new("a"), "A", 1, price(1), &limits).unwrap();
        cart.add_item(ProductId::new("b"), "B", 1, price(1), &limits).unwrap();
        assert!(matches!(
            cart.add_item(ProductId::new("c"), "C", 1, price(1), &limits),
            Err(OrderError::CartFull { max: 2 })
        ));
    }

    #[test]
    fn test_update_to_zero_removes() {
        let mut cart = cart();
        let limits = CartLimits::default();
        let id = ProductId::new("p1");
        cart.add_item(id.clone(), "Mug", 2, price(100), &limits).unwrap();

        cart.update_quantity(&id, 0, &limits).unwrap();
        assert!(cart.is_empty());
        assert!(matches!(
            cart.remove_item(&id),
            Err(OrderError::ItemNotInCart(_))
        ));
    }

    #[test]
    fn test_subtotal() {
        let mut cart = cart();
        let limits = CartLimits::default();
        cart.add_item(ProductId::new("a"), "A", 2, price(100), &limits).unwrap();
        cart.add_item(ProductId::new("b"), "B", 1, price(50), &limits).unwrap();
        assert_eq!(cart.subtotal().unwrap(), price(250));
    }

    #[test]
    fn test_fingerprint_tracks_content_not_order() {
        let limits = CartLimits::default();
        let mut first = cart();
        first.add_item(ProductId::new("a"), "A", 1, price(10), &limits).unwrap();
        first.add_item(ProductId::new("b"), "B", 2, price(20), &limits).unwrap();

        let mut second = cart();
        second.add_item(ProductId::new("b"), "B", 2, price(20), &limits).unwrap();
        second.add_item(ProductId::new("a"), "A", 1, price(10), &limits).unwrap();
        assert_eq!(first.fingerprint(), second.fingerprint());

        second
            .update_quantity(&ProductId::new("a"), 2, &limits)
            .unwrap();
        assert_ne!(first.fingerprint(), second.fingerprint());
    }
}
