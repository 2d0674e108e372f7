//! Coupon definitions and the coupon evaluator.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::OrderError;
use crate::ids::{CouponId, UserId};
use crate::money::Money;

/// A percentage coupon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Coupon {
    pub id: CouponId,
    /// Upper-cased, trimmed code (e.g., "SAVE10").
    pub code: String,
    pub description: Option<String>,
    /// Percent off the subtotal, 1..=100.
    pub discount_percent: u32,
    /// Subtotal required for the coupon to apply.
    pub min_order_amount: Money,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    /// Maximum number of redemptions (None = unlimited).
    pub usage_limit: Option<u32>,
    pub usage_count: u32,
    /// Each customer may redeem the coupon at most once.
    pub once_per_user: bool,
    pub used_by: BTreeSet<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    /// Create a percentage coupon with no minimum and no usage limit.
    pub fn percentage(
        code: &str,
        discount_percent: u32,
        min_order_amount: Money,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CouponId::generate(),
            code: normalize_code(code),
            description: None,
            discount_percent,
            min_order_amount,
            expires_at,
            is_active: true,
            usage_limit: None,
            usage_count: 0,
            once_per_user: false,
            used_by: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }

    /// Add a usage limit.
    pub fn with_usage_limit(mut self, limit: u32) -> Self {
        self.usage_limit = Some(limit);
        self
    }

    /// Restrict to one redemption per customer.
    pub fn once_per_user(mut self) -> Self {
        self.once_per_user = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    pub fn is_exhausted(&self) -> bool {
        self.usage_limit
            .map(|limit| self.usage_count >= limit)
            .unwrap_or(false)
    }

    fn validate_definition(&self) -> Result<(), OrderError> {
        if self.code.is_empty() {
            return Err(OrderError::InvalidCoupon("code must not be empty".into()));
        }
        if !(1..=100).contains(&self.discount_percent) {
            return Err(OrderError::InvalidCoupon(format!(
                "discount percent {} outside 1..=100",
                self.discount_percent
            )));
        }
        if self.min_order_amount.is_negative() {
            return Err(OrderError::InvalidCoupon(
                "minimum order amount must not be negative".into(),
            ));
        }
        Ok(())
    }

    /// Compute the discount this coupon gives on `subtotal`.
    ///
    /// Checks run in a fixed order: active, expiry, usage, per-user, minimum.
    pub fn evaluate(
        &self,
        subtotal: Money,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Money, OrderError> {
        if !self.is_active {
            return Err(OrderError::CouponInactive(self.code.clone()));
        }
        if self.is_expired(now) {
            return Err(OrderError::CouponExpired(self.code.clone()));
        }
        if self.is_exhausted() {
            return Err(OrderError::CouponUsageExhausted(self.code.clone()));
        }
        if self.once_per_user && self.used_by.contains(user_id) {
            return Err(OrderError::CouponAlreadyUsed(self.code.clone()));
        }
        if subtotal.currency != self.min_order_amount.currency {
            return Err(OrderError::CurrencyMismatch {
                expected: self.min_order_amount.currency.code().to_string(),
                got: subtotal.currency.code().to_string(),
            });
        }
        if subtotal < self.min_order_amount {
            return Err(OrderError::BelowMinimumOrder {
                code: self.code.clone(),
                subtotal,
                minimum: self.min_order_amount,
            });
        }

        let discount = subtotal
            .percent_half_up(self.discount_percent)
            .ok_or(OrderError::Overflow)?;
        // Don't exceed subtotal
        Ok(if discount > subtotal { subtotal } else { discount })
    }
}

/// A coupon that has been applied to a checkout session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppliedCoupon {
    pub coupon_id: CouponId,
    pub code: String,
    pub discount_percent: u32,
    /// Amount discounted.
    pub amount: Money,
}

/// Outcome of deleting a coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouponRemoval {
    /// Never redeemed, removed outright.
    Deleted,
    /// Already redeemed, kept for history and switched off.
    Deactivated,
}

/// Canonical form of a coupon code.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Coupon storage keyed by normalized code.
#[derive(Debug, Default)]
pub struct CouponBook {
    coupons: Mutex<HashMap<String, Coupon>>,
}

impl CouponBook {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Coupon>> {
        self.coupons.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new coupon.
    pub fn create(&self, mut coupon: Coupon) -> Result<CouponId, OrderError> {
        coupon.code = normalize_code(&coupon.code);
        coupon.validate_definition()?;

        let mut coupons = self.lock();
        if coupons.contains_key(&coupon.code) {
            return Err(OrderError::DuplicateCoupon(coupon.code));
        }
        info!(code = %coupon.code, percent = coupon.discount_percent, "coupon created");
        let id = coupon.id.clone();
        coupons.insert(coupon.code.clone(), coupon);
        Ok(id)
    }

    pub fn get(&self, code: &str) -> Option<Coupon> {
        self.lock().get(&normalize_code(code)).cloned()
    }

    /// Validate `code` against `subtotal` and compute the discount.
    pub fn evaluate(
        &self,
        code: &str,
        subtotal: Money,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<AppliedCoupon, OrderError> {
        let code = normalize_code(code);
        let coupons = self.lock();
        let coupon = coupons
            .get(&code)
            .ok_or_else(|| OrderError::CouponNotFound(code.clone()))?;
        let amount = coupon.evaluate(subtotal, user_id, now)?;
        Ok(AppliedCoupon {
            coupon_id: coupon.id.clone(),
            code: coupon.code.clone(),
            discount_percent: coupon.discount_percent,
            amount,
        })
    }

    /// Re-check and count a redemption in one step.
    pub fn redeem(
        &self,
        code: &str,
        subtotal: Money,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        let code = normalize_code(code);
        let mut coupons = self.lock();
        let coupon = coupons
            .get_mut(&code)
            .ok_or_else(|| OrderError::CouponNotFound(code.clone()))?;
        coupon.evaluate(subtotal, user_id, now)?;
        coupon.usage_count += 1;
        coupon.used_by.insert(user_id.clone());
        Ok(())
    }

    /// Undo a redemption whose order did not go through.
    pub fn unredeem(&self, code: &str, user_id: &UserId) {
        if let Some(coupon) = self.lock().get_mut(&normalize_code(code)) {
            coupon.usage_count = coupon.usage_count.saturating_sub(1);
            coupon.used_by.remove(user_id);
        }
    }

    /// Count a redemption for an order that is already paid.
    ///
    /// Unlike [`CouponBook::redeem`] this does not re-check limits: the
    /// discount was granted when the payment was created.
    pub fn record_use(&self, code: &str, user_id: &UserId) -> Result<(), OrderError> {
        let code = normalize_code(code);
        let mut coupons = self.lock();
        let coupon = coupons
            .get_mut(&code)
            .ok_or(OrderError::CouponNotFound(code))?;
        coupon.usage_count += 1;
        coupon.used_by.insert(user_id.clone());
        Ok(())
    }

    /// Switch a coupon off without deleting it.
    pub fn deactivate(&self, code: &str) -> Result<(), OrderError> {
        let code = normalize_code(code);
        let mut coupons = self.lock();
        let coupon = coupons
            .get_mut(&code)
            .ok_or(OrderError::CouponNotFound(code))?;
        coupon.is_active = false;
        Ok(())
    }

    /// Delete a coupon; coupons already redeemed are only deactivated.
    pub fn delete(&self, code: &str) -> Result<CouponRemoval, OrderError> {
        let code = normalize_code(code);
        let mut coupons = self.lock();
        let coupon = coupons
            .get_mut(&code)
            .ok_or_else(|| OrderError::CouponNotFound(code.clone()))?;
        if coupon.usage_count > 0 {
            coupon.is_active = false;
            return Ok(CouponRemoval::Deactivated);
        }
        coupons.remove(&code);
        Ok(CouponRemoval::Deleted)
    }

    /// Coupons a customer could currently use, sorted by code.
    pub fn list_active(&self, now: DateTime<Utc>) -> Vec<Coupon> {
        let mut active: Vec<Coupon> = self
            .lock()
            .values()
            .filter(|c| c.is_active && !c.is_expired(now) && !c.is_exhausted())
            .cloned()
            .collect();
        active.sort_by(|a, b| a.code.cmp(&b.code));
        active
    }
}
