//! Checkout module.
//!
//! A checkout session freezes the cart's lines and prices, collects a
//! shipping address and an optional coupon, and is completed by placing an
//! order.

mod book;
mod session;

pub use book::{CheckoutBook, CheckoutState};
pub use session::{CheckoutSession, CheckoutStatus};
