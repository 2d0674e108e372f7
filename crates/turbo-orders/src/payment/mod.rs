//! Payment gateway boundary.
//!
//! The engine asks a [`PaymentGateway`] for a payment intent, hands the
//! intent to the client, and later trusts the client's callback only after
//! checking its HMAC signature.

mod book;
mod mock;
mod signature;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{OrderId, PaymentId};
use crate::money::Currency;

pub use book::PaymentBook;
pub use mock::MockGateway;
pub use signature::{sign, verify_signature};

/// Failure reported by the payment gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Timeout, connection failure or 5xx.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    /// The gateway refused the request.
    #[error("gateway rejected request: {0}")]
    Rejected(String),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_))
    }
}

/// A payment order created at the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentIntent {
    pub gateway_order_id: String,
    pub amount_minor: i64,
    pub currency: Currency,
}

/// Payment gateway client.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment order for `amount_minor` units of `currency`.
    ///
    /// `receipt` is the merchant reference shown on the gateway dashboard.
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: Currency,
        receipt: &str,
    ) -> Result<PaymentIntent, GatewayError>;

    /// Public key id returned to the client alongside each intent.
    fn key_id(&self) -> &str;
}

/// Lifecycle of a gateway payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentState {
    /// Intent created, awaiting the client callback.
    Created,
    /// Signature checked and stock committed.
    Verified,
    Failed,
}

/// A gateway payment mapped to its order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub gateway_order_id: String,
    pub gateway_payment_id: Option<String>,
    pub signature: Option<String>,
    pub amount_minor: i64,
    pub currency: Currency,
    pub state: PaymentState,
    /// Whether stock is still reserved for this payment.
    pub reservation_held: bool,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

impl Payment {
    pub fn new(order_id: OrderId, intent: &PaymentIntent, now: DateTime<Utc>) -> Self {
        Self {
            id: PaymentId::generate(),
            order_id,
            gateway_order_id: intent.gateway_order_id.clone(),
            gateway_payment_id: None,
            signature: None,
            amount_minor: intent.amount_minor,
            currency: intent.currency,
            state: PaymentState::Created,
            reservation_held: true,
            created_at: now,
            verified_at: None,
            failure_reason: None,
        }
    }
}

/// Client callback after paying at the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentVerification {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    /// Hex HMAC-SHA256 of `gateway_order_id|gateway_payment_id`.
    pub signature: String,
}

/// What the client needs to open the gateway's payment page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayCheckout {
    pub order_id: OrderId,
    pub gateway_order_id: String,
    pub amount_minor: i64,
    pub currency: Currency,
    pub key_id: String,
}
