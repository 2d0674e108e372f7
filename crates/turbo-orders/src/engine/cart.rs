use tracing::{info, instrument};

use crate::cart::Cart;
use crate::engine::OrderEngine;
use crate::error::OrderError;
use crate::ids::{ProductId, UserId};

impl OrderEngine {
    pub(crate) fn check_available(
        &self,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<(), OrderError> {
        let available = self.stock.available(product_id);
        if available < quantity {
            return Err(OrderError::InsufficientStock {
                product_id: product_id.clone(),
                requested: quantity,
                available,
            });
        }
        Ok(())
    }

    /// Add units of a product to the user's cart.
    ///
    /// The price is captured from the catalog when the line is first added.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub fn add_to_cart(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<Cart, OrderError> {
        let product = self
            .catalog
            .sellable(product_id)
            .ok_or_else(|| OrderError::ProductNotFound(product_id.clone()))?;
        let limits = self.config.cart_limits();

        let cart = self.carts.update(user_id, |cart| {
            let line_quantity =
                cart.add_item(product.id.clone(), &product.name, quantity, product.price, &limits)?;
            self.check_available(product_id, line_quantity)?;
            Ok::<_, OrderError>(cart.clone())
        })?;
        info!(items = cart.item_count(), "added to cart");
        Ok(cart)
    }

    /// Set a line's quantity; zero removes it.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub fn update_cart_item(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<Cart, OrderError> {
        let limits = self.config.cart_limits();
        self.carts.update(user_id, |cart| {
            cart.update_quantity(product_id, quantity, &limits)?;
            if quantity > 0 {
                self.check_available(product_id, quantity)?;
            }
            Ok(cart.clone())
        })
    }

    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub fn remove_cart_item(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<Cart, OrderError> {
        self.carts.update(user_id, |cart| {
            cart.remove_item(product_id)?;
            Ok(cart.clone())
        })
    }

    /// The user's current cart.
    pub fn cart(&self, user_id: &UserId) -> Cart {
        self.carts.snapshot(user_id)
    }
}
