//! Order engine error types.

use crate::ids::{
    AddressId, CancellationId, CheckoutId, OrderId, ProductId, ReturnId, UserId,
};
use crate::money::Money;
use crate::order::OrderStatus;
use crate::payment::GatewayError;
use thiserror::Error;

/// Broad classification of an [`OrderError`].
///
/// Callers use this to decide between reporting, retrying, and abandoning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input; nothing was mutated.
    Validation,
    /// The entity does not exist or is not visible to the caller.
    NotFound,
    /// The operation conflicts with state already recorded.
    Conflict,
    /// A shared resource (stock, wallet balance) is exhausted.
    Resource,
    /// An external dependency failed or returned untrusted data.
    External,
    /// The state machine does not allow this transition.
    Precondition,
    /// The caller lacks the required role.
    Forbidden,
    /// Arithmetic or invariant failure inside the engine.
    Internal,
}

/// Errors that can occur in order lifecycle operations.
#[derive(Error, Debug)]
pub enum OrderError {
    /// Quantity outside the accepted range.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// Quantity exceeds the per-line maximum.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityExceedsLimit { requested: i64, max: i64 },

    /// Cart already holds the maximum number of lines.
    #[error("Cart is full ({max} lines)")]
    CartFull { max: usize },

    /// Non-positive monetary amount where a positive one is required.
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Coupon definition rejected.
    #[error("Invalid coupon: {0}")]
    InvalidCoupon(String),

    /// Address missing required fields.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Product not found or inactive.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Product not in the user's cart.
    #[error("Item not in cart: {0}")]
    ItemNotInCart(ProductId),

    /// Address missing or owned by another user.
    #[error("Address not found: {0}")]
    AddressNotFound(AddressId),

    /// Order placement attempted before an address was set.
    #[error("Checkout {0} has no shipping address")]
    AddressRequired(CheckoutId),

    /// User has no checkout session.
    #[error("No active checkout for user {0}")]
    NoActiveCheckout(UserId),

    /// Order not found or owned by another user.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Cancellation request not found: {0}")]
    CancellationNotFound(CancellationId),

    #[error("Return request not found: {0}")]
    ReturnNotFound(ReturnId),

    #[error("Payment not found for gateway order {0}")]
    PaymentNotFound(String),

    #[error("Coupon not found: {0}")]
    CouponNotFound(String),

    #[error("Coupon is inactive: {0}")]
    CouponInactive(String),

    #[error("Coupon has expired: {0}")]
    CouponExpired(String),

    /// Subtotal below the coupon's minimum order amount.
    #[error("Coupon {code} requires a minimum order of {minimum}, subtotal is {subtotal}")]
    BelowMinimumOrder {
        code: String,
        subtotal: Money,
        minimum: Money,
    },

    #[error("Coupon usage limit reached: {0}")]
    CouponUsageExhausted(String),

    #[error("Coupon already used by this customer: {0}")]
    CouponAlreadyUsed(String),

    /// The session already holds a coupon.
    #[error("Coupon already applied: {0}")]
    CouponAlreadyApplied(String),

    #[error("No coupon applied to checkout {0}")]
    CouponNotApplied(CheckoutId),

    #[error("Coupon code already exists: {0}")]
    DuplicateCoupon(String),

    /// COD order above the configured ceiling.
    #[error("Cash on delivery is limited to {limit}, order total is {amount}")]
    CodLimitExceeded { amount: Money, limit: Money },

    #[error("Cart is empty")]
    EmptyCart,

    /// Live cart no longer matches the checkout snapshot.
    #[error("Cart changed since checkout {0} was created")]
    CartChanged(CheckoutId),

    #[error("Checkout {0} is already completed")]
    SessionCompleted(CheckoutId),

    #[error("Order already placed for checkout {0}")]
    OrderAlreadyPlaced(CheckoutId),

    /// A gateway payment for this checkout is still awaiting verification.
    #[error("Payment for order {0} is still pending")]
    PaymentPending(OrderId),

    #[error("Payment already verified for gateway order {0}")]
    PaymentAlreadyVerified(String),

    #[error("Order already cancelled: {0}")]
    OrderAlreadyCancelled(OrderId),

    #[error("Order {order_id} cannot be cancelled in status {status}")]
    OrderNotCancellable { order_id: OrderId, status: OrderStatus },

    #[error("Cancellation already requested for order {0}")]
    CancellationAlreadyRequested(OrderId),

    #[error("Cancellation request {0} is not pending")]
    NotPendingCancellation(CancellationId),

    #[error("Order {order_id} cannot be returned in status {status}")]
    ReturnNotAllowed { order_id: OrderId, status: OrderStatus },

    #[error("Return window expired for order {0}")]
    ReturnWindowExpired(OrderId),

    #[error("Return already requested for order {0}")]
    ReturnAlreadyRequested(OrderId),

    /// Return request already approved or rejected.
    #[error("Return request {0} already processed")]
    AlreadyProcessed(ReturnId),

    #[error("Return request {0} is not approved")]
    ReturnNotApproved(ReturnId),

    #[error("Refund already initiated for return {0}")]
    RefundAlreadyInitiated(ReturnId),

    #[error("Refund for return {0} is not awaiting retry")]
    RefundNotRetriable(ReturnId),

    #[error("Return {0} already restocked")]
    AlreadyRestocked(ReturnId),

    /// Fulfillment transition not allowed from the current status.
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("Order {0} has not been paid")]
    PaymentRequired(OrderId),

    /// Stock below the requested quantity at commit time.
    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    #[error("Insufficient wallet balance for {user_id}: requested {requested}, available {available}")]
    InsufficientBalance {
        user_id: UserId,
        requested: Money,
        available: Money,
    },

    /// Callback signature does not match the expected HMAC.
    #[error("Invalid payment signature for gateway order {0}")]
    InvalidSignature(String),

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: String, got: String },

    #[error("Arithmetic overflow in money calculation")]
    Overflow,
}

impl OrderError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        use OrderError::*;
        match self {
            InvalidQuantity(_)
            | QuantityExceedsLimit { .. }
            | CartFull { .. }
            | InvalidAmount(_)
            | InvalidCoupon(_)
            | InvalidAddress(_)
            | AddressRequired(_)
            | CouponInactive(_)
            | CouponExpired(_)
            | BelowMinimumOrder { .. }
            | CouponUsageExhausted(_)
            | CouponAlreadyUsed(_)
            | CodLimitExceeded { .. } => ErrorKind::Validation,

            ProductNotFound(_)
            | ItemNotInCart(_)
            | AddressNotFound(_)
            | NoActiveCheckout(_)
            | OrderNotFound(_)
            | CancellationNotFound(_)
            | ReturnNotFound(_)
            | PaymentNotFound(_)
            | CouponNotFound(_) => ErrorKind::NotFound,

            CouponAlreadyApplied(_)
            | CouponNotApplied(_)
            | DuplicateCoupon(_)
            | EmptyCart
            | CartChanged(_)
            | SessionCompleted(_)
            | OrderAlreadyPlaced(_)
            | PaymentPending(_)
            | PaymentAlreadyVerified(_)
            | OrderAlreadyCancelled(_)
            | CancellationAlreadyRequested(_)
            | ReturnAlreadyRequested(_)
            | AlreadyProcessed(_)
            | RefundAlreadyInitiated(_)
            | AlreadyRestocked(_) => ErrorKind::Conflict,

            InsufficientStock { .. } | InsufficientBalance { .. } => ErrorKind::Resource,

            InvalidSignature(_) | Gateway(_) => ErrorKind::External,

            OrderNotCancellable { .. }
            | NotPendingCancellation(_)
            | ReturnNotAllowed { .. }
            | ReturnWindowExpired(_)
            | ReturnNotApproved(_)
            | RefundNotRetriable(_)
            | InvalidTransition { .. }
            | PaymentRequired(_) => ErrorKind::Precondition,

            Forbidden(_) => ErrorKind::Forbidden,

            CurrencyMismatch { .. } | Overflow => ErrorKind::Internal,
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            OrderError::Gateway(e) => e.is_retryable(),
            _ => false,
        }
    }
}
