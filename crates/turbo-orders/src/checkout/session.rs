//! Checkout session state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::{fingerprint_lines, Cart, CartItem};
use crate::coupon::AppliedCoupon;
use crate::error::OrderError;
use crate::ids::{AddressId, CheckoutId, OrderId, ProductId, UserId};
use crate::money::Money;

/// Steps of a checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckoutStatus {
    /// Lines snapshotted from the cart.
    Created,
    /// Shipping address chosen.
    AddressSet,
    /// A coupon is applied.
    CouponApplied,
    /// An order was placed from this session.
    Completed,
}

impl CheckoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutStatus::Created => "created",
            CheckoutStatus::AddressSet => "address_set",
            CheckoutStatus::CouponApplied => "coupon_applied",
            CheckoutStatus::Completed => "completed",
        }
    }
}

/// A priced snapshot of a cart on its way to becoming an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutSession {
    pub id: CheckoutId,
    pub user_id: UserId,
    /// Lines copied from the cart; prices and quantities are fixed.
    pub items: Vec<CartItem>,
    pub subtotal: Money,
    pub coupon: Option<AppliedCoupon>,
    pub discount: Money,
    /// Always `subtotal - discount`.
    pub final_amount: Money,
    pub shipping_address_id: Option<AddressId>,
    /// Fingerprint of the cart the lines were copied from.
    pub cart_fingerprint: String,
    pub status: CheckoutStatus,
    /// Gateway order awaiting payment, if any.
    pub pending_order: Option<OrderId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CheckoutSession {
    /// Snapshot a cart.
    pub fn from_cart(cart: &Cart, now: DateTime<Utc>) -> Result<Self, OrderError> {
        if cart.is_empty() {
            return Err(OrderError::EmptyCart);
        }
        let subtotal = cart.subtotal()?;
        Ok(Self {
            id: CheckoutId::generate(),
            user_id: cart.user_id.clone(),
            items: cart.items.clone(),
            subtotal,
            coupon: None,
            discount: Money::zero(subtotal.currency),
            final_amount: subtotal,
            shipping_address_id: None,
            cart_fingerprint: cart.fingerprint(),
            status: CheckoutStatus::Created,
            pending_order: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_completed(&self) -> bool {
        self.status == CheckoutStatus::Completed
    }

    /// Fail once an order has been placed from this session.
    pub fn ensure_open(&self) -> Result<(), OrderError> {
        if self.is_completed() {
            return Err(OrderError::SessionCompleted(self.id.clone()));
        }
        Ok(())
    }

    /// Whether the live cart no longer matches the snapshot.
    pub fn is_stale(&self, live_fingerprint: &str) -> bool {
        self.cart_fingerprint != live_fingerprint
    }

    /// Fingerprint recomputed from the snapshotted lines.
    pub fn lines_fingerprint(&self) -> String {
        fingerprint_lines(
            self.items
                .iter()
                .map(|i| (&i.product_id, i.quantity, i.unit_price)),
        )
    }

    /// `(product, quantity)` pairs for stock operations.
    pub fn stock_lines(&self) -> Vec<(ProductId, i64)> {
        self.items
            .iter()
            .map(|i| (i.product_id.clone(), i.quantity))
            .collect()
    }

    pub fn set_address(
        &mut self,
        address_id: AddressId,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        self.ensure_open()?;
        self.shipping_address_id = Some(address_id);
        if self.coupon.is_none() {
            self.status = CheckoutStatus::AddressSet;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Attach a coupon evaluated against this session's subtotal.
    pub fn apply_coupon(
        &mut self,
        applied: AppliedCoupon,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        self.ensure_open()?;
        if let Some(existing) = &self.coupon {
            return Err(OrderError::CouponAlreadyApplied(existing.code.clone()));
        }
        self.discount = applied.amount;
        self.coupon = Some(applied);
        self.status = CheckoutStatus::CouponApplied;
        self.updated_at = now;
        self.reprice()
    }

    /// Detach the coupon and restore the undiscounted total.
    pub fn remove_coupon(&mut self, now: DateTime<Utc>) -> Result<AppliedCoupon, OrderError> {
        self.ensure_open()?;
        let removed = self
            .coupon
            .take()
            .ok_or_else(|| OrderError::CouponNotApplied(self.id.clone()))?;
        self.discount = Money::zero(self.subtotal.currency);
        self.status = if self.shipping_address_id.is_some() {
            CheckoutStatus::AddressSet
        } else {
            CheckoutStatus::Created
        };
        self.updated_at = now;
        self.reprice()?;
        Ok(removed)
    }

    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = CheckoutStatus::Completed;
        self.pending_order = None;
        self.updated_at = now;
    }

    fn reprice(&mut self) -> Result<(), OrderError> {
        if self.discount > self.subtotal {
            self.discount = self.subtotal;
        }
        self.final_amount = self
            .subtotal
            .try_subtract(&self.discount)
            .ok_or(OrderError::Overflow)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::CartLimits;
    use crate::ids::CouponId;
    use crate::money::Currency;

    fn rupees(units: i64) -> Money {
        Money::major(units, Currency::INR)
    }

    fn session() -> CheckoutSession {
        let mut cart = Cart::new(UserId::new("u"), Currency::INR);
        cart.add_item(ProductId::new("p"), "Lamp", 2, rupees(100), &CartLimits::default())
            .unwrap();
        CheckoutSession::from_cart(&cart, Utc::now()).unwrap()
    }

    fn save10(amount: Money) -> AppliedCoupon {
        AppliedCoupon {
            coupon_id: CouponId::new("c"),
            code: "SAVE10".into(),
            discount_percent: 10,
            amount,
        }
    }

    #[test]
    fn test_empty_cart_rejected() {
        let cart = Cart::new(UserId::new("u"), Currency::INR);
        assert!(matches!(
            CheckoutSession::from_cart(&cart, Utc::now()),
            Err(OrderError::EmptyCart)
        ));
    }

    #[test]
    fn test_coupon_apply_and_remove() {
        let mut s = session();
        assert_eq!(s.final_amount, rupees(200));

        s.apply_coupon(save10(rupees(20)), Utc::now()).unwrap();
        assert_eq!(s.status, CheckoutStatus::CouponApplied);
        assert_eq!(s.final_amount, rupees(180));

        assert!(matches!(
            s.apply_coupon(save10(rupees(20)), Utc::now()),
            Err(OrderError::CouponAlreadyApplied(_))
        ));

        s.remove_coupon(Utc::now()).unwrap();
        assert_eq!(s.status, CheckoutStatus::Created);
        assert_eq!(s.final_amount, s.subtotal);
        assert!(matches!(
            s.remove_coupon(Utc::now()),
            Err(OrderError::CouponNotApplied(_))
        ));
    }

    #[test]
    fn test_address_keeps_coupon_status() {
        let mut s = session();
        s.apply_coupon(save10(rupees(20)), Utc::now()).unwrap();
        s.set_address(AddressId::new("a"), Utc::now()).unwrap();
        assert_eq!(s.status, CheckoutStatus::CouponApplied);

        s.remove_coupon(Utc::now()).unwrap();
        assert_eq!(s.status, CheckoutStatus::AddressSet);
    }

    #[test]
    fn test_completed_session_is_frozen() {
        let mut s = session();
        s.complete(Utc::now());
        assert!(matches!(
            s.set_address(AddressId::new("a"), Utc::now()),
            Err(OrderError::SessionCompleted(_))
        ));
        assert!(matches!(
            s.apply_coupon(save10(rupees(20)), Utc::now()),
            Err(OrderError::SessionCompleted(_))
        ));
    }

    #[test]
    fn test_snapshot_fingerprint_matches_cart() {
        let s = session();
        assert_eq!(s.lines_fingerprint(), s.cart_fingerprint);
        assert!(!s.is_stale(&s.cart_fingerprint.clone()));
        assert!(s.is_stale("other"));
    }
}
