//! Fire-and-forget customer notifications.

use serde::Serialize;
use tracing::info;

use crate::ids::{OrderId, ReturnId, UserId};
use crate::money::Money;

/// Events the engine reports after a state change commits.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    OrderPlaced {
        user_id: UserId,
        order_id: OrderId,
        order_number: String,
        amount: Money,
    },
    PaymentFailed {
        user_id: UserId,
        order_id: OrderId,
        reason: String,
    },
    OrderCancelled {
        user_id: UserId,
        order_id: OrderId,
        refunded: Option<Money>,
    },
    CancellationQueued {
        user_id: UserId,
        order_id: OrderId,
    },
    ReturnDecided {
        user_id: UserId,
        return_id: ReturnId,
        approved: bool,
    },
    RefundCompleted {
        user_id: UserId,
        return_id: ReturnId,
        amount: Money,
    },
}

impl Notification {
    pub fn name(&self) -> &'static str {
        match self {
            Notification::OrderPlaced { .. } => "order_placed",
            Notification::PaymentFailed { .. } => "payment_failed",
            Notification::OrderCancelled { .. } => "order_cancelled",
            Notification::CancellationQueued { .. } => "cancellation_queued",
            Notification::ReturnDecided { .. } => "return_decided",
            Notification::RefundCompleted { .. } => "refund_completed",
        }
    }

    pub fn user_id(&self) -> &UserId {
        match self {
            Notification::OrderPlaced { user_id, .. }
            | Notification::PaymentFailed { user_id, .. }
            | Notification::OrderCancelled { user_id, .. }
            | Notification::CancellationQueued { user_id, .. }
            | Notification::ReturnDecided { user_id, .. }
            | Notification::RefundCompleted { user_id, .. } => user_id,
        }
    }
}

/// Delivery channel for notifications.
///
/// Implementations must not block; the engine never waits on delivery.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes each notification as a tracing event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        let payload = serde_json::to_string(&notification).unwrap_or_default();
        info!(
            event = notification.name(),
            user_id = %notification.user_id(),
            %payload,
            "notification"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;

    #[test]
    fn test_notification_serializes_with_tag() {
        let n = Notification::CancellationQueued {
            user_id: UserId::new("u"),
            order_id: OrderId::new("o"),
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["event"], "cancellation_queued");
        assert_eq!(json["order_id"], "o");
    }

    #[test]
    fn test_log_notifier_does_not_panic() {
        LogNotifier.notify(Notification::RefundCompleted {
            user_id: UserId::new("u"),
            return_id: ReturnId::new("r"),
            amount: Money::major(10, Currency::INR),
        });
    }
}
