//! Order lifecycle engine for TurboCommerce.
//!
//! This crate takes a customer from cart to paid order and back out again:
//!
//! - **Cart**: per-user carts with bounded lines and captured prices
//! - **Checkout**: priced snapshots with coupon and shipping address
//! - **Placement**: cash on delivery, or gateway payments verified by HMAC
//! - **Unhappy path**: cancellation, returns, refunds to the wallet
//!
//! Stock and wallet balances only move through their ledgers, so money
//! reconciles and stock never goes negative.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use turbo_orders::prelude::*;
//!
//! let engine = OrderEngine::new(config, Arc::new(MockGateway::new("rzp_test")));
//! engine.register_product(Product::new(lamp_id.clone(), "Lamp", Money::major(100, Currency::INR)), 5)?;
//!
//! engine.add_to_cart(&user, &lamp_id, 2)?;
//! engine.create_checkout(&user)?;
//! engine.set_address(&user, &address_id)?;
//! engine.apply_coupon(&user, "SAVE10")?;
//!
//! let order = engine.place_order_cod(&user)?;
//! println!("Total: {}", order.final_amount.display());
//! ```

pub mod address;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod clock;
pub mod config;
pub mod coupon;
pub mod engine;
pub mod error;
pub mod ids;
pub mod money;
pub mod notify;
pub mod order;
pub mod payment;
pub mod returns;
pub mod stock;
pub mod telemetry;
pub mod wallet;

pub use engine::{Actor, OrderEngine, Role};
pub use error::{ErrorKind, OrderError};
pub use ids::*;
pub use money::{Currency, Money};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::address::Address;
    pub use crate::cart::{Cart, CartItem};
    pub use crate::catalog::Product;
    pub use crate::checkout::{CheckoutSession, CheckoutStatus};
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::config::EngineConfig;
    pub use crate::coupon::Coupon;
    pub use crate::engine::{Actor, CancelOutcome, OrderEngine, Role};
    pub use crate::error::{ErrorKind, OrderError};
    pub use crate::ids::*;
    pub use crate::money::{Currency, Money};
    pub use crate::notify::{LogNotifier, Notification, Notifier};
    pub use crate::order::{
        DeliveryStatus, Order, OrderStatus, PaymentMethod, PaymentStatus, StockState,
    };
    pub use crate::payment::{
        GatewayCheckout, GatewayError, MockGateway, PaymentGateway, PaymentIntent,
        PaymentVerification,
    };
    pub use crate::returns::{RefundStatus, ReturnRequest, ReturnStatus};
    pub use crate::wallet::{TransactionKind, WalletTransaction};
}
