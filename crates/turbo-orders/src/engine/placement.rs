use tracing::{info, instrument, warn};

use crate::checkout::CheckoutSession;
use crate::engine::OrderEngine;
use crate::error::OrderError;
use crate::ids::{AddressId, UserId};
use crate::notify::Notification;
use crate::order::{Order, PaymentMethod, StockState};
use crate::payment::{verify_signature, GatewayCheckout, Payment, PaymentState, PaymentVerification};

/// Result of committing a verified payment.
enum Settlement {
    Paid(Order),
    StockLost(Order, OrderError),
    /// Another order already completed the checkout.
    SessionTaken(Order),
}

impl OrderEngine {
    /// Checks shared by both payment paths.
    fn ready_for_placement(&self, session: &CheckoutSession) -> Result<AddressId, OrderError> {
        if session.is_completed() {
            return Err(OrderError::OrderAlreadyPlaced(session.id.clone()));
        }
        let address_id = session
            .shipping_address_id
            .clone()
            .ok_or_else(|| OrderError::AddressRequired(session.id.clone()))?;
        if session.is_stale(&self.carts.fingerprint(&session.user_id)) {
            return Err(OrderError::CartChanged(session.id.clone()));
        }
        if let Some(pending) = &session.pending_order {
            return Err(OrderError::PaymentPending(pending.clone()));
        }
        Ok(address_id)
    }

    /// Place a cash-on-delivery order from the active checkout.
    ///
    /// Stock is decremented, the coupon redeemed, the session completed and
    /// the cart cleared in one step; if any check fails nothing changes.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn place_order_cod(&self, user_id: &UserId) -> Result<Order, OrderError> {
        let now = self.now();
        let order = {
            let mut checkouts = self.checkouts.lock();
            let session = checkouts.active_mut(user_id)?;
            let address_id = self.ready_for_placement(session)?;

            let limit = self.config.cod_ceiling();
            if session.final_amount > limit {
                return Err(OrderError::CodLimitExceeded {
                    amount: session.final_amount,
                    limit,
                });
            }

            if let Some(coupon) = &session.coupon {
                self.coupons
                    .redeem(&coupon.code, session.subtotal, user_id, now)?;
            }
            let order = Order::from_checkout(
                session,
                address_id,
                PaymentMethod::Cod,
                StockState::Committed,
                now,
            );
            if let Err(e) =
                self.stock
                    .decrement_all(&order.stock_lines(), false, Some(order.id.as_str()))
            {
                if let Some(coupon) = &session.coupon {
                    self.coupons.unredeem(&coupon.code, user_id);
                }
                warn!(error = %e, "cod placement aborted");
                return Err(e);
            }

            session.complete(now);
            self.orders.insert(order.clone());
            order
        };
        self.carts.clear(user_id);

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            final_amount = %order.final_amount,
            "cod order placed"
        );
        self.notify(Notification::OrderPlaced {
            user_id: order.user_id.clone(),
            order_id: order.id.clone(),
            order_number: order.order_number.clone(),
            amount: order.final_amount,
        });
        Ok(order)
    }

    /// Reserve stock and open a gateway payment for the active checkout.
    ///
    /// The session stays open until the payment is verified.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn place_order_gateway(
        &self,
        user_id: &UserId,
    ) -> Result<GatewayCheckout, OrderError> {
        let now = self.now();
        let order = {
            let mut checkouts = self.checkouts.lock();
            let session = checkouts.active_mut(user_id)?;
            let address_id = self.ready_for_placement(session)?;
            if let Some(coupon) = &session.coupon {
                self.coupons
                    .evaluate(&coupon.code, session.subtotal, user_id, now)?;
            }

            let order = Order::from_checkout(
                session,
                address_id,
                PaymentMethod::Gateway,
                StockState::Reserved,
                now,
            );
            self.stock
                .reserve_all(&order.stock_lines(), Some(order.id.as_str()))?;
            self.orders.insert(order.clone());
            session.pending_order = Some(order.id.clone());
            order
        };

        let amount = order.final_amount;
        let intent = match self
            .gateway
            .create_intent(amount.minor, amount.currency, &order.order_number)
            .await
        {
            Ok(intent) => intent,
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "payment intent failed");
                self.orders.update(&order.id, |o| {
                    if o.stock_state == StockState::Reserved {
                        self.stock
                            .release_all(&o.stock_lines(), Some(o.id.as_str()))?;
                    }
                    if !o.is_cancelled() {
                        o.mark_payment_failed(self.now());
                    }
                    Ok(())
                })?;
                self.clear_pending(&order.checkout_id, &order.id);
                self.notify(Notification::PaymentFailed {
                    user_id: order.user_id.clone(),
                    order_id: order.id.clone(),
                    reason: e.to_string(),
                });
                return Err(e.into());
            }
        };

        let mut payment = Payment::new(order.id.clone(), &intent, self.now());
        self.orders.update(&order.id, |o| {
            // Cancelled while the gateway call was in flight; the
            // reservation is already gone.
            if o.is_cancelled() {
                payment.state = PaymentState::Failed;
                payment.reservation_held = false;
                payment.failure_reason = Some("order cancelled".to_string());
            }
            self.payments.insert(payment.clone());
            Ok(())
        })?;

        info!(
            order_id = %order.id,
            gateway_order_id = %intent.gateway_order_id,
            amount = %amount,
            "gateway order created"
        );
        Ok(GatewayCheckout {
            order_id: order.id,
            gateway_order_id: intent.gateway_order_id,
            amount_minor: intent.amount_minor,
            currency: intent.currency,
            key_id: self.gateway.key_id().to_string(),
        })
    }

    /// Handle the client's payment callback.
    ///
    /// A bad signature fails the payment and releases its reservation. A
    /// good one commits stock (from the reservation if still held) and
    /// completes the checkout.
    #[instrument(skip(self, callback), fields(gateway_order_id = %callback.gateway_order_id))]
    pub fn verify_payment(&self, callback: &PaymentVerification) -> Result<Order, OrderError> {
        let payment = self.payments.get(&callback.gateway_order_id)?;
        if payment.state == PaymentState::Verified {
            return Err(OrderError::PaymentAlreadyVerified(
                callback.gateway_order_id.clone(),
            ));
        }
        let now = self.now();

        if let Err(e) = verify_signature(&self.config.gateway.key_secret, callback) {
            warn!(order_id = %payment.order_id, "payment signature mismatch");
            let order = self.fail_payment(&payment, "signature mismatch")?;
            self.notify(Notification::PaymentFailed {
                user_id: order.user_id,
                order_id: order.id,
                reason: "signature mismatch".to_string(),
            });
            return Err(e);
        }

        // Checkout lock is held until the session is completed.
        let mut checkouts = self.checkouts.lock();
        let settlement = self.orders.update(&payment.order_id, |order| {
            if order.is_cancelled() {
                return Err(OrderError::OrderAlreadyCancelled(order.id.clone()));
            }
            let current = self.payments.get(&callback.gateway_order_id)?;
            if current.state == PaymentState::Verified {
                return Err(OrderError::PaymentAlreadyVerified(
                    callback.gateway_order_id.clone(),
                ));
            }

            let lines = order.stock_lines();
            if checkouts
                .get(&order.checkout_id)
                .is_some_and(|session| session.is_completed())
            {
                if self
                    .payments
                    .fail(&callback.gateway_order_id, "checkout already completed")?
                {
                    self.stock.release_all(&lines, Some(order.id.as_str()))?;
                }
                order.mark_payment_failed(now);
                return Ok(Settlement::SessionTaken(order.clone()));
            }

            match self.stock.decrement_all(
                &lines,
                current.reservation_held,
                Some(order.id.as_str()),
            ) {
                Ok(()) => {
                    self.payments.claim_verified(callback, now)?;
                    order.mark_paid(now);
                    Ok(Settlement::Paid(order.clone()))
                }
                Err(e) => {
                    if self
                        .payments
                        .fail(&callback.gateway_order_id, "stock unavailable at commit")?
                    {
                        self.stock.release_all(&lines, Some(order.id.as_str()))?;
                    }
                    order.mark_payment_failed(now);
                    Ok(Settlement::StockLost(order.clone(), e))
                }
            }
        })?;

        let (order, placed_fingerprint) = match settlement {
            Settlement::Paid(order) => {
                let fingerprint = checkouts.get_mut(&order.checkout_id).map(|session| {
                    session.complete(now);
                    session.cart_fingerprint.clone()
                });
                drop(checkouts);
                (order, fingerprint)
            }
            Settlement::StockLost(order, e) => {
                drop(checkouts);
                warn!(order_id = %order.id, error = %e, "verified payment could not commit stock");
                self.clear_pending(&order.checkout_id, &order.id);
                self.notify(Notification::PaymentFailed {
                    user_id: order.user_id,
                    order_id: order.id,
                    reason: e.to_string(),
                });
                return Err(e);
            }
            Settlement::SessionTaken(order) => {
                drop(checkouts);
                warn!(
                    order_id = %order.id,
                    checkout_id = %order.checkout_id,
                    "checkout already completed by another order"
                );
                self.notify(Notification::PaymentFailed {
                    user_id: order.user_id,
                    order_id: order.id,
                    reason: "checkout already completed".to_string(),
                });
                return Err(OrderError::OrderAlreadyPlaced(order.checkout_id));
            }
        };

        if let Some(code) = &order.coupon_code {
            if let Err(e) = self.coupons.record_use(code, &order.user_id) {
                warn!(code = %code, error = %e, "coupon usage not recorded");
            }
        }
        // Lines added after the gateway order was opened stay in the cart.
        if let Some(fingerprint) = placed_fingerprint {
            if !self.carts.clear_if_matches(&order.user_id, &fingerprint) {
                info!(order_id = %order.id, "cart changed since placement; kept");
            }
        }

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            "payment verified"
        );
        self.notify(Notification::OrderPlaced {
            user_id: order.user_id.clone(),
            order_id: order.id.clone(),
            order_number: order.order_number.clone(),
            amount: order.final_amount,
        });
        Ok(order)
    }

    /// Give up on an unverified gateway payment and release its stock.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn abandon_payment(
        &self,
        user_id: &UserId,
        gateway_order_id: &str,
    ) -> Result<Order, OrderError> {
        let payment = self.payments.get(gateway_order_id)?;
        self.orders.owned_by(&payment.order_id, user_id)?;
        let order = self.fail_payment(&payment, "abandoned by customer")?;
        info!(order_id = %order.id, "payment abandoned");
        self.notify(Notification::PaymentFailed {
            user_id: order.user_id.clone(),
            order_id: order.id.clone(),
            reason: "abandoned".to_string(),
        });
        Ok(order)
    }

    /// Mark a payment failed, release any reservation it still holds and
    /// free the checkout for another attempt.
    fn fail_payment(&self, payment: &Payment, reason: &str) -> Result<Order, OrderError> {
        let now = self.now();
        let order = self.orders.update(&payment.order_id, |order| {
            if self.payments.fail(&payment.gateway_order_id, reason)? {
                self.stock
                    .release_all(&order.stock_lines(), Some(order.id.as_str()))?;
            }
            if !order.is_cancelled() && !order.is_paid() {
                order.mark_payment_failed(now);
            }
            Ok(order.clone())
        })?;
        self.clear_pending(&order.checkout_id, &order.id);
        Ok(order)
    }
}
