//! The order lifecycle engine.
//!
//! [`OrderEngine`] owns every book and ledger and exposes the customer and
//! admin operations as plain method calls. It is `Send + Sync`; share it
//! behind an `Arc`.
//!
//! Components are locked in a fixed order: checkout, carts, coupons, orders,
//! payments, cancellations, returns, stock, wallet. A section holding one of
//! these may only take locks that come later in the list.

mod cancellation;
mod cart;
mod checkout;
mod fulfillment;
mod placement;
mod returns;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::address::AddressBook;
use crate::cart::CartBook;
use crate::catalog::{Catalog, Product};
use crate::checkout::CheckoutBook;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::coupon::{Coupon, CouponBook, CouponRemoval};
use crate::error::OrderError;
use crate::ids::{CheckoutId, CouponId, OrderId, UserId};
use crate::money::Money;
use crate::notify::{LogNotifier, Notification, Notifier};
use crate::order::{CancellationBook, Order, OrderBook};
use crate::payment::{PaymentBook, PaymentGateway};
use crate::returns::ReturnBook;
use crate::stock::StockLedger;
use crate::wallet::{Wallet, WalletTransaction};

pub use cancellation::CancelOutcome;

/// Caller role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Customer,
    Admin,
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn customer(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Customer,
        }
    }

    pub fn admin(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    fn require_admin(&self, operation: &str) -> Result<(), OrderError> {
        if !self.is_admin() {
            return Err(OrderError::Forbidden(format!(
                "{} requires admin role (caller {})",
                operation, self.user_id
            )));
        }
        Ok(())
    }
}

/// Order lifecycle engine.
pub struct OrderEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    catalog: Catalog,
    stock: StockLedger,
    coupons: CouponBook,
    carts: CartBook,
    addresses: AddressBook,
    checkouts: CheckoutBook,
    orders: OrderBook,
    payments: PaymentBook,
    cancellations: CancellationBook,
    returns: ReturnBook,
    wallet: Wallet,
}

impl std::fmt::Debug for OrderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderEngine")
            .field("config", &self.config)
            .field("gateway_key_id", &self.gateway.key_id())
            .finish_non_exhaustive()
    }
}

impl OrderEngine {
    /// Create an engine using the system clock and log notifications.
    pub fn new(config: EngineConfig, gateway: Arc<dyn PaymentGateway>) -> Self {
        let currency = config.currency;
        Self {
            config,
            clock: Arc::new(SystemClock),
            gateway,
            notifier: Arc::new(LogNotifier),
            catalog: Catalog::new(),
            stock: StockLedger::new(),
            coupons: CouponBook::new(),
            carts: CartBook::new(currency),
            addresses: AddressBook::new(),
            checkouts: CheckoutBook::new(),
            orders: OrderBook::new(),
            payments: PaymentBook::new(),
            cancellations: CancellationBook::new(),
            returns: ReturnBook::new(),
            wallet: Wallet::new(currency),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn stock(&self) -> &StockLedger {
        &self.stock
    }

    pub fn payments(&self) -> &PaymentBook {
        &self.payments
    }

    pub fn cancellations(&self) -> &CancellationBook {
        &self.cancellations
    }

    pub fn returns(&self) -> &ReturnBook {
        &self.returns
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn notify(&self, notification: Notification) {
        self.notifier.notify(notification);
    }

    /// Add or replace a product and set its on-hand stock.
    pub fn register_product(&self, product: Product, on_hand: i64) -> Result<(), OrderError> {
        if product.price.currency != self.config.currency {
            return Err(OrderError::CurrencyMismatch {
                expected: self.config.currency.code().to_string(),
                got: product.price.currency.code().to_string(),
            });
        }
        self.stock.set_stock(&product.id, on_hand)?;
        info!(product_id = %product.id, on_hand, "product registered");
        self.catalog.upsert(product);
        Ok(())
    }

    /// Drop a session's claim on a gateway order that will not be paid.
    fn clear_pending(&self, checkout_id: &CheckoutId, order_id: &OrderId) {
        let mut checkouts = self.checkouts.lock();
        if let Some(session) = checkouts.get_mut(checkout_id) {
            if session.pending_order.as_ref() == Some(order_id) {
                session.pending_order = None;
            }
        }
    }

    /// An order visible to the caller: their own, or any order for admins.
    pub fn order(&self, actor: &Actor, order_id: &OrderId) -> Result<Order, OrderError> {
        if actor.is_admin() {
            return self
                .orders
                .get(order_id)
                .ok_or_else(|| OrderError::OrderNotFound(order_id.clone()));
        }
        self.orders.owned_by(order_id, &actor.user_id)
    }

    /// A user's orders, newest first.
    pub fn orders_for_user(&self, user_id: &UserId) -> Vec<Order> {
        self.orders.for_user(user_id)
    }

    pub fn wallet_balance(&self, user_id: &UserId) -> Result<Money, OrderError> {
        self.wallet.balance(user_id)
    }

    pub fn wallet_transactions(&self, user_id: &UserId) -> Vec<WalletTransaction> {
        self.wallet.transactions(user_id)
    }

    pub fn create_coupon(&self, actor: &Actor, coupon: Coupon) -> Result<CouponId, OrderError> {
        actor.require_admin("create_coupon")?;
        self.coupons.create(coupon)
    }

    pub fn deactivate_coupon(&self, actor: &Actor, code: &str) -> Result<(), OrderError> {
        actor.require_admin("deactivate_coupon")?;
        self.coupons.deactivate(code)?;
        info!(code, "coupon deactivated");
        Ok(())
    }

    /// Delete a coupon; coupons already redeemed are deactivated instead.
    pub fn delete_coupon(&self, actor: &Actor, code: &str) -> Result<CouponRemoval, OrderError> {
        actor.require_admin("delete_coupon")?;
        let removal = self.coupons.delete(code)?;
        info!(code, ?removal, "coupon removed");
        Ok(removal)
    }

    pub fn coupon(&self, code: &str) -> Option<Coupon> {
        self.coupons.get(code)
    }

    /// Coupons customers can currently apply.
    pub fn active_coupons(&self) -> Vec<Coupon> {
        self.coupons.list_active(self.now())
    }
}
