use tracing::{info, instrument, warn};

use crate::engine::{Actor, OrderEngine};
use crate::error::OrderError;
use crate::ids::{OrderId, ReturnId, UserId};
use crate::notify::Notification;
use crate::order::OrderStatus;
use crate::returns::ReturnRequest;
use crate::stock::AdjustmentReason;

impl OrderEngine {
    /// Ask to return a delivered order.
    #[instrument(skip(self, reason), fields(user_id = %user_id, order_id = %order_id))]
    pub fn initiate_return(
        &self,
        user_id: &UserId,
        order_id: &OrderId,
        reason: &str,
    ) -> Result<ReturnRequest, OrderError> {
        let now = self.now();
        let window = self.config.return_window();

        let request = self.orders.update(order_id, |order| {
            if &order.user_id != user_id {
                return Err(OrderError::OrderNotFound(order_id.clone()));
            }
            if self.returns.has_open(&order.id) {
                return Err(OrderError::ReturnAlreadyRequested(order.id.clone()));
            }
            if order.status != OrderStatus::Delivered {
                return Err(OrderError::ReturnNotAllowed {
                    order_id: order.id.clone(),
                    status: order.status,
                });
            }
            let delivered_at = order.delivered_at.unwrap_or(order.updated_at);
            if now - delivered_at > window {
                return Err(OrderError::ReturnWindowExpired(order.id.clone()));
            }

            order.request_return(now)?;
            let request = ReturnRequest::new(order.id.clone(), user_id.clone(), reason, now);
            self.returns.open(request.clone())?;
            Ok(request)
        })?;

        info!(return_id = %request.id, "return requested");
        Ok(request)
    }

    /// Approve or reject a pending return.
    #[instrument(skip(self, actor), fields(admin = %actor.user_id, return_id = %return_id))]
    pub fn decide_return(
        &self,
        actor: &Actor,
        return_id: &ReturnId,
        approve: bool,
    ) -> Result<ReturnRequest, OrderError> {
        actor.require_admin("decide_return")?;
        let request = self.returns.get(return_id)?;
        let now = self.now();
        let decided = self.orders.update(&request.order_id, |order| {
            let decided = self.returns.decide(return_id, approve, now)?;
            order.settle_return(approve, now);
            Ok(decided)
        })?;

        info!(approve, "return decided");
        self.notify(Notification::ReturnDecided {
            user_id: decided.user_id.clone(),
            return_id: decided.id.clone(),
            approved: approve,
        });
        Ok(decided)
    }

    /// Credit the order's final amount to the customer's wallet.
    #[instrument(skip(self, actor), fields(admin = %actor.user_id, return_id = %return_id))]
    pub fn initiate_refund(
        &self,
        actor: &Actor,
        return_id: &ReturnId,
    ) -> Result<ReturnRequest, OrderError> {
        actor.require_admin("initiate_refund")?;
        let request = self.returns.get(return_id)?;
        let order = self
            .orders
            .get(&request.order_id)
            .ok_or_else(|| OrderError::OrderNotFound(request.order_id.clone()))?;
        let started = self.returns.begin_refund(return_id, order.final_amount)?;
        self.complete_refund(started)
    }

    /// Finish a refund left in Initiated.
    ///
    /// The wallet credit is keyed by the return, so a credit that did go
    /// through before the failure is not repeated.
    #[instrument(skip(self, actor), fields(admin = %actor.user_id, return_id = %return_id))]
    pub fn retry_refund(
        &self,
        actor: &Actor,
        return_id: &ReturnId,
    ) -> Result<ReturnRequest, OrderError> {
        actor.require_admin("retry_refund")?;
        let request = self.returns.retriable_refund(return_id)?;
        self.complete_refund(request)
    }

    fn complete_refund(&self, request: ReturnRequest) -> Result<ReturnRequest, OrderError> {
        let amount = request
            .refund_amount
            .ok_or_else(|| OrderError::RefundNotRetriable(request.id.clone()))?;
        let now = self.now();
        let reference = request.refund_reference();

        self.orders
            .update(&request.order_id, |order| {
                if amount.is_positive() {
                    self.wallet.credit(
                        &order.user_id,
                        amount,
                        "return refund",
                        Some(order.id.clone()),
                        &reference,
                        now,
                    )?;
                }
                order.mark_refunded(now);
                Ok(())
            })
            .inspect_err(|e| warn!(error = %e, "refund left initiated"))?;

        let completed = self.returns.complete_refund(&request.id)?;
        info!(amount = %amount, "refund completed");
        self.notify(Notification::RefundCompleted {
            user_id: completed.user_id.clone(),
            return_id: completed.id.clone(),
            amount,
        });
        Ok(completed)
    }

    /// Put an approved return's units back into stock.
    #[instrument(skip(self, actor), fields(admin = %actor.user_id, return_id = %return_id))]
    pub fn mark_returned_to_seller(
        &self,
        actor: &Actor,
        return_id: &ReturnId,
    ) -> Result<ReturnRequest, OrderError> {
        actor.require_admin("mark_returned_to_seller")?;
        let request = self.returns.mark_restocked(return_id)?;
        let order = match self.orders.get(&request.order_id) {
            Some(order) => order,
            None => {
                self.returns.unmark_restocked(return_id);
                return Err(OrderError::OrderNotFound(request.order_id));
            }
        };
        if let Err(e) = self.stock.increment_all(
            &order.stock_lines(),
            AdjustmentReason::Return,
            Some(request.id.as_str()),
        ) {
            self.returns.unmark_restocked(return_id);
            return Err(e);
        }
        info!(order_id = %order.id, units = order.item_count(), "return restocked");
        Ok(request)
    }
}
