use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::engine::{Actor, OrderEngine};
use crate::error::OrderError;
use crate::ids::{CancellationId, OrderId, UserId};
use crate::money::Money;
use crate::notify::Notification;
use crate::order::{CancellationRequest, Order, StockState};
use crate::stock::AdjustmentReason;

/// What a cancellation call did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancelOutcome {
    pub order: Order,
    /// The order is unchanged and a request awaits an admin.
    pub requires_admin_review: bool,
    pub request: Option<CancellationRequest>,
    /// Amount credited to the customer's wallet.
    pub refunded: Option<Money>,
}

impl OrderEngine {
    /// Cancel an order, or queue a request when it is outside the
    /// self-service window.
    #[instrument(skip(self, reason), fields(user_id = %user_id, order_id = %order_id))]
    pub fn cancel_order(
        &self,
        user_id: &UserId,
        order_id: &OrderId,
        reason: &str,
    ) -> Result<CancelOutcome, OrderError> {
        let now = self.now();
        let window = self.config.cancellation_window();

        let outcome = self.orders.update(order_id, |order| {
            if &order.user_id != user_id {
                return Err(OrderError::OrderNotFound(order_id.clone()));
            }
            order.ensure_cancellable()?;
            if self.cancellations.pending_for(&order.id).is_some() {
                return Err(OrderError::CancellationAlreadyRequested(order.id.clone()));
            }

            if !order.is_shipped() && now - order.created_at <= window {
                let refunded = self.apply_cancellation(order, now)?;
                return Ok(CancelOutcome {
                    order: order.clone(),
                    requires_admin_review: false,
                    request: None,
                    refunded,
                });
            }

            let request = CancellationRequest::new(order.id.clone(), user_id.clone(), reason, now);
            self.cancellations.queue(request.clone())?;
            Ok(CancelOutcome {
                order: order.clone(),
                requires_admin_review: true,
                request: Some(request),
                refunded: None,
            })
        })?;

        self.report_cancellation(&outcome);
        Ok(outcome)
    }

    /// Cancel any cancellable order regardless of the window.
    ///
    /// A pending customer request for the order is approved along the way.
    #[instrument(skip(self, actor, reason), fields(admin = %actor.user_id, order_id = %order_id))]
    pub fn admin_cancel_order(
        &self,
        actor: &Actor,
        order_id: &OrderId,
        reason: &str,
    ) -> Result<CancelOutcome, OrderError> {
        actor.require_admin("admin_cancel_order")?;
        let now = self.now();
        let outcome = self.orders.update(order_id, |order| {
            order.ensure_cancellable()?;
            let request = self.cancellations.approve_pending_for(&order.id, now);
            let refunded = self.apply_cancellation(order, now)?;
            Ok(CancelOutcome {
                order: order.clone(),
                requires_admin_review: false,
                request,
                refunded,
            })
        })?;
        info!(reason, "order cancelled by admin");
        self.report_cancellation(&outcome);
        Ok(outcome)
    }

    #[instrument(skip(self, actor), fields(admin = %actor.user_id, request_id = %request_id))]
    pub fn approve_cancellation(
        &self,
        actor: &Actor,
        request_id: &CancellationId,
    ) -> Result<CancelOutcome, OrderError> {
        actor.require_admin("approve_cancellation")?;
        let request = self.cancellations.get(request_id)?;
        if !request.is_pending() {
            return Err(OrderError::NotPendingCancellation(request_id.clone()));
        }
        let now = self.now();
        let outcome = self.orders.update(&request.order_id, |order| {
            order.ensure_cancellable()?;
            let decided = self.cancellations.decide(request_id, true, now)?;
            let refunded = self.apply_cancellation(order, now)?;
            Ok(CancelOutcome {
                order: order.clone(),
                requires_admin_review: false,
                request: Some(decided),
                refunded,
            })
        })?;
        self.report_cancellation(&outcome);
        Ok(outcome)
    }

    #[instrument(skip(self, actor), fields(admin = %actor.user_id, request_id = %request_id))]
    pub fn reject_cancellation(
        &self,
        actor: &Actor,
        request_id: &CancellationId,
    ) -> Result<CancellationRequest, OrderError> {
        actor.require_admin("reject_cancellation")?;
        let request = self.cancellations.decide(request_id, false, self.now())?;
        info!(order_id = %request.order_id, "cancellation rejected");
        Ok(request)
    }

    /// Undo the order's stock and payment effects and mark it cancelled.
    ///
    /// Runs inside the order book lock.
    fn apply_cancellation(
        &self,
        order: &mut Order,
        now: DateTime<Utc>,
    ) -> Result<Option<Money>, OrderError> {
        let lines = order.stock_lines();
        let reference = order.id.to_string();
        match order.stock_state {
            StockState::Committed => {
                self.stock.increment_all(
                    &lines,
                    AdjustmentReason::Cancellation,
                    Some(&reference),
                )?;
                order.stock_state = StockState::Restored;
            }
            StockState::Reserved => {
                self.stock.release_all(&lines, Some(&reference))?;
                order.stock_state = StockState::Released;
            }
            StockState::Released | StockState::Restored => {}
        }
        self.payments.fail_all_for_order(&order.id, "order cancelled");

        let refunded = if order.is_paid() {
            let amount = order.final_amount;
            if amount.is_positive() {
                self.wallet.credit(
                    &order.user_id,
                    amount,
                    "order cancelled",
                    Some(order.id.clone()),
                    &format!("cancel:{}", order.id),
                    now,
                )?;
            }
            order.mark_refunded(now);
            Some(amount)
        } else {
            None
        };
        order.mark_cancelled(now);
        Ok(refunded)
    }

    fn report_cancellation(&self, outcome: &CancelOutcome) {
        let order = &outcome.order;
        if outcome.requires_admin_review {
            info!(order_id = %order.id, "cancellation queued for review");
            self.notify(Notification::CancellationQueued {
                user_id: order.user_id.clone(),
                order_id: order.id.clone(),
            });
        } else {
            // An unpaid gateway order no longer blocks its checkout.
            self.clear_pending(&order.checkout_id, &order.id);
            info!(
                order_id = %order.id,
                refunded = ?outcome.refunded.map(|m| m.display()),
                "order cancelled"
            );
            self.notify(Notification::OrderCancelled {
                user_id: order.user_id.clone(),
                order_id: order.id.clone(),
                refunded: outcome.refunded,
            });
        }
    }
}
