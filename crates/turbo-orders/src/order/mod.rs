//! Order types.
//!
//! An order is created from a completed (or, for gateway payments, claimed)
//! checkout session and is never deleted. Status changes go through the
//! methods here so the three status fields stay consistent.

mod book;
pub mod cancellation;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::CartItem;
use crate::checkout::CheckoutSession;
use crate::error::OrderError;
use crate::ids::{AddressId, CheckoutId, OrderId, ProductId, UserId};
use crate::money::Money;

pub use book::OrderBook;
pub use cancellation::{CancellationBook, CancellationRequest, CancellationStatus};

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order placed, awaiting processing.
    #[default]
    Pending,
    /// Payment captured or order accepted by the seller.
    Confirmed,
    /// Order shipped.
    Shipped,
    /// Order delivered.
    Delivered,
    /// Order cancelled.
    Cancelled,
    /// Customer asked to return a delivered order.
    ReturnRequested,
    /// Return approved.
    Returned,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::ReturnRequested => "return_requested",
            OrderStatus::Returned => "returned",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::ReturnRequested => "Return requested",
            OrderStatus::Returned => "Returned",
        }
    }

    /// Check if order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Returned)
    }

    /// Check if order can be cancelled.
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Shipped
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Cash on delivery.
    Cod,
    /// Online payment through the gateway.
    Gateway,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::Gateway => "gateway",
        }
    }
}

/// Payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

/// Delivery status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DeliveryStatus {
    #[default]
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Processing => "processing",
            DeliveryStatus::Shipped => "shipped",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Cancelled => "cancelled",
            DeliveryStatus::Returned => "returned",
        }
    }
}

/// What the order currently holds in the stock ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockState {
    /// Units held for a pending gateway payment.
    Reserved,
    /// Units decremented from stock.
    Committed,
    /// Reservation dropped without a sale.
    Released,
    /// Committed units put back after cancellation.
    Restored,
}

/// A line in an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl OrderItem {
    pub fn line_total(&self) -> Result<Money, OrderError> {
        self.unit_price
            .try_multiply(self.quantity)
            .ok_or(OrderError::Overflow)
    }
}

impl From<&CartItem> for OrderItem {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id.clone(),
            product_name: item.product_name.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }
}

/// A placed order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    /// Unique order identifier.
    pub id: OrderId,
    /// Human-readable order number.
    pub order_number: String,
    pub user_id: UserId,
    pub checkout_id: CheckoutId,
    pub items: Vec<OrderItem>,
    pub shipping_address_id: AddressId,
    /// Subtotal before discounts.
    pub total_amount: Money,
    pub discount_amount: Money,
    /// Amount charged.
    pub final_amount: Money,
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub delivery_status: DeliveryStatus,
    pub status: OrderStatus,
    pub stock_state: StockState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Build an order from a checkout session.
    pub fn from_checkout(
        session: &CheckoutSession,
        shipping_address_id: AddressId,
        payment_method: PaymentMethod,
        stock_state: StockState,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OrderId::generate(),
            order_number: Self::generate_order_number(now),
            user_id: session.user_id.clone(),
            checkout_id: session.id.clone(),
            items: session.items.iter().map(OrderItem::from).collect(),
            shipping_address_id,
            total_amount: session.subtotal,
            discount_amount: session.discount,
            final_amount: session.final_amount,
            coupon_code: session.coupon.as_ref().map(|c| c.code.clone()),
            payment_method,
            payment_status: PaymentStatus::Pending,
            delivery_status: DeliveryStatus::Processing,
            status: OrderStatus::Pending,
            stock_state,
            created_at: now,
            updated_at: now,
            delivered_at: None,
            cancelled_at: None,
        }
    }

    /// Generate a new order number.
    pub fn generate_order_number(now: DateTime<Utc>) -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!(
            "ORD-{}-{}",
            now.format("%Y%m%d"),
            suffix[..8].to_uppercase()
        )
    }

    /// Get total item count.
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// `(product, quantity)` pairs for stock operations.
    pub fn stock_lines(&self) -> Vec<(ProductId, i64)> {
        self.items
            .iter()
            .map(|i| (i.product_id.clone(), i.quantity))
            .collect()
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == OrderStatus::Cancelled
    }

    /// Whether the order has left the warehouse.
    pub fn is_shipped(&self) -> bool {
        matches!(
            self.delivery_status,
            DeliveryStatus::Shipped | DeliveryStatus::Delivered | DeliveryStatus::Returned
        )
    }

    /// Fail unless the order may still be cancelled.
    pub fn ensure_cancellable(&self) -> Result<(), OrderError> {
        if self.is_cancelled() {
            return Err(OrderError::OrderAlreadyCancelled(self.id.clone()));
        }
        if !self.status.can_cancel() {
            return Err(OrderError::OrderNotCancellable {
                order_id: self.id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }

    fn transition_error(&self, to: OrderStatus) -> OrderError {
        OrderError::InvalidTransition {
            order_id: self.id.clone(),
            from: self.status,
            to,
        }
    }

    /// Pending → Confirmed.
    pub fn confirm(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        if self.status != OrderStatus::Pending {
            return Err(self.transition_error(OrderStatus::Confirmed));
        }
        self.status = OrderStatus::Confirmed;
        self.updated_at = now;
        Ok(())
    }

    /// Pending or Confirmed → Shipped.
    ///
    /// Gateway orders must be paid first.
    pub fn ship(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        if !matches!(self.status, OrderStatus::Pending | OrderStatus::Confirmed) {
            return Err(self.transition_error(OrderStatus::Shipped));
        }
        if self.payment_method == PaymentMethod::Gateway && !self.is_paid() {
            return Err(OrderError::PaymentRequired(self.id.clone()));
        }
        self.status = OrderStatus::Shipped;
        self.delivery_status = DeliveryStatus::Shipped;
        self.updated_at = now;
        Ok(())
    }

    /// Shipped → Delivered. Cash on delivery settles here.
    pub fn deliver(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        if self.status != OrderStatus::Shipped {
            return Err(self.transition_error(OrderStatus::Delivered));
        }
        self.status = OrderStatus::Delivered;
        self.delivery_status = DeliveryStatus::Delivered;
        self.delivered_at = Some(now);
        if self.payment_method == PaymentMethod::Cod {
            self.payment_status = PaymentStatus::Paid;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Record a verified gateway payment.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) {
        self.payment_status = PaymentStatus::Paid;
        self.stock_state = StockState::Committed;
        if self.status == OrderStatus::Pending {
            self.status = OrderStatus::Confirmed;
        }
        self.updated_at = now;
    }

    /// Record a failed gateway payment whose reservation was dropped.
    pub fn mark_payment_failed(&mut self, now: DateTime<Utc>) {
        self.payment_status = PaymentStatus::Failed;
        if self.stock_state == StockState::Reserved {
            self.stock_state = StockState::Released;
        }
        self.updated_at = now;
    }

    pub fn mark_cancelled(&mut self, now: DateTime<Utc>) {
        self.status = OrderStatus::Cancelled;
        self.delivery_status = DeliveryStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.updated_at = now;
    }

    pub fn mark_refunded(&mut self, now: DateTime<Utc>) {
        self.payment_status = PaymentStatus::Refunded;
        self.updated_at = now;
    }

    /// Delivered → ReturnRequested.
    pub fn request_return(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        if self.status != OrderStatus::Delivered {
            return Err(OrderError::ReturnNotAllowed {
                order_id: self.id.clone(),
                status: self.status,
            });
        }
        self.status = OrderStatus::ReturnRequested;
        self.updated_at = now;
        Ok(())
    }

    /// Settle a return request: Returned on approval, back to Delivered otherwise.
    pub fn settle_return(&mut self, approved: bool, now: DateTime<Utc>) {
        if approved {
            self.status = OrderStatus::Returned;
            self.delivery_status = DeliveryStatus::Returned;
        } else {
            self.status = OrderStatus::Delivered;
        }
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{Cart, CartLimits};
    use crate::money::Currency;

    fn order(method: PaymentMethod) -> Order {
        let mut cart = Cart::new(UserId::new("u"), Currency::INR);
        cart.add_item(
            ProductId::new("p"),
            "Kettle",
            2,
            Money::major(100, Currency::INR),
            &CartLimits::default(),
        )
        .unwrap();
        let session = CheckoutSession::from_cart(&cart, Utc::now()).unwrap();
        Order::from_checkout(
            &session,
            AddressId::new("a"),
            method,
            StockState::Committed,
            Utc::now(),
        )
    }

    #[test]
    fn test_order_number_format() {
        let o = order(PaymentMethod::Cod);
        assert!(o.order_number.starts_with("ORD-"));
        assert_eq!(o.order_number.len(), "ORD-20240101-ABCDEF12".len());
    }

    #[test]
    fn test_fulfillment_path() {
        let mut o = order(PaymentMethod::Cod);
        o.confirm(Utc::now()).unwrap();
        o.ship(Utc::now()).unwrap();
        assert_eq!(o.payment_status, PaymentStatus::Pending);
        o.deliver(Utc::now()).unwrap();
        assert_eq!(o.status, OrderStatus::Delivered);
        assert_eq!(o.payment_status, PaymentStatus::Paid);
        assert!(o.delivered_at.is_some());
    }

    #[test]
    fn test_invalid_transitions() {
        let mut o = order(PaymentMethod::Cod);
        assert!(matches!(
            o.deliver(Utc::now()),
            Err(OrderError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Delivered,
                ..
            })
        ));
        o.confirm(Utc::now()).unwrap();
        assert!(o.confirm(Utc::now()).is_err());
    }

    #[test]
    fn test_unpaid_gateway_order_cannot_ship() {
        let mut o = order(PaymentMethod::Gateway);
        assert!(matches!(
            o.ship(Utc::now()),
            Err(OrderError::PaymentRequired(_))
        ));
        o.mark_paid(Utc::now());
        assert_eq!(o.status, OrderStatus::Confirmed);
        o.ship(Utc::now()).unwrap();
    }

    #[test]
    fn test_cancellable_states() {
        let mut o = order(PaymentMethod::Cod);
        assert!(o.ensure_cancellable().is_ok());

        o.mark_cancelled(Utc::now());
        assert!(matches!(
            o.ensure_cancellable(),
            Err(OrderError::OrderAlreadyCancelled(_))
        ));

        let mut delivered = order(PaymentMethod::Cod);
        delivered.confirm(Utc::now()).unwrap();
        delivered.ship(Utc::now()).unwrap();
        delivered.deliver(Utc::now()).unwrap();
        assert!(matches!(
            delivered.ensure_cancellable(),
            Err(OrderError::OrderNotCancellable {
                status: OrderStatus::Delivered,
                ..
            })
        ));
    }

    #[test]
    fn test_return_settlement() {
        let mut o = order(PaymentMethod::Cod);
        assert!(matches!(
            o.request_return(Utc::now()),
            Err(OrderError::ReturnNotAllowed { .. })
        ));
        o.ship(Utc::now()).unwrap();
        o.deliver(Utc::now()).unwrap();
        o.request_return(Utc::now()).unwrap();
        o.settle_return(false, Utc::now());
        assert_eq!(o.status, OrderStatus::Delivered);

        o.request_return(Utc::now()).unwrap();
        o.settle_return(true, Utc::now());
        assert_eq!(o.status, OrderStatus::Returned);
        assert_eq!(o.delivery_status, DeliveryStatus::Returned);
    }
}
