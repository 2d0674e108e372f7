use tracing::{info, instrument, warn};

use crate::address::Address;
use crate::checkout::CheckoutSession;
use crate::engine::OrderEngine;
use crate::error::OrderError;
use crate::ids::{AddressId, UserId};

impl OrderEngine {
    /// Save a shipping address for the user.
    #[instrument(skip(self, address), fields(user_id = %user_id))]
    pub fn add_address(
        &self,
        user_id: &UserId,
        mut address: Address,
    ) -> Result<AddressId, OrderError> {
        address.user_id = user_id.clone();
        self.addresses.add(address)
    }

    /// Snapshot the user's cart into a new checkout session.
    ///
    /// Replaces any session the user already had, unless that session
    /// still has a gateway order awaiting payment.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn create_checkout(&self, user_id: &UserId) -> Result<CheckoutSession, OrderError> {
        let cart = self.carts.snapshot(user_id);
        let session = CheckoutSession::from_cart(&cart, self.now())?;
        for item in &session.items {
            self.check_available(&item.product_id, item.quantity)?;
        }

        let mut checkouts = self.checkouts.lock();
        if let Ok(current) = checkouts.active(user_id) {
            if let Some(pending) = &current.pending_order {
                warn!(pending_order = %pending, "checkout blocked by open payment");
                return Err(OrderError::PaymentPending(pending.clone()));
            }
        }
        let superseded = checkouts.activate(session.clone());
        drop(checkouts);
        if let Some(previous) = superseded {
            info!(previous = %previous, "previous checkout superseded");
        }
        info!(
            checkout_id = %session.id,
            subtotal = %session.subtotal,
            "checkout created"
        );
        Ok(session)
    }

    #[instrument(skip(self), fields(user_id = %user_id, address_id = %address_id))]
    pub fn set_address(
        &self,
        user_id: &UserId,
        address_id: &AddressId,
    ) -> Result<CheckoutSession, OrderError> {
        let address = self.addresses.owned_by(address_id, user_id)?;
        let now = self.now();
        let mut checkouts = self.checkouts.lock();
        let session = checkouts.active_mut(user_id)?;
        session.set_address(address.id, now)?;
        Ok(session.clone())
    }

    /// Apply a coupon to the active session.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn apply_coupon(&self, user_id: &UserId, code: &str) -> Result<CheckoutSession, OrderError> {
        let now = self.now();
        let mut checkouts = self.checkouts.lock();
        let session = checkouts.active_mut(user_id)?;
        session.ensure_open()?;
        if let Some(existing) = &session.coupon {
            return Err(OrderError::CouponAlreadyApplied(existing.code.clone()));
        }

        let applied = self
            .coupons
            .evaluate(code, session.subtotal, user_id, now)
            .inspect_err(|e| warn!(code, error = %e, "coupon rejected"))?;
        session.apply_coupon(applied, now)?;
        info!(
            checkout_id = %session.id,
            discount = %session.discount,
            final_amount = %session.final_amount,
            "coupon applied"
        );
        Ok(session.clone())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn remove_coupon(&self, user_id: &UserId) -> Result<CheckoutSession, OrderError> {
        let now = self.now();
        let mut checkouts = self.checkouts.lock();
        let session = checkouts.active_mut(user_id)?;
        let removed = session.remove_coupon(now)?;
        info!(checkout_id = %session.id, code = %removed.code, "coupon removed");
        Ok(session.clone())
    }

    /// The active session, provided the cart still matches it.
    pub fn summary(&self, user_id: &UserId) -> Result<CheckoutSession, OrderError> {
        let checkouts = self.checkouts.lock();
        let session = checkouts.active(user_id)?;
        if !session.is_completed() && session.is_stale(&self.carts.fingerprint(user_id)) {
            return Err(OrderError::CartChanged(session.id.clone()));
        }
        Ok(session.clone())
    }
}
