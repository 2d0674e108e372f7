//! Payment records keyed by gateway order id.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::error::OrderError;
use crate::ids::OrderId;
use crate::payment::{Payment, PaymentState, PaymentVerification};

#[derive(Debug, Default)]
pub struct PaymentBook {
    payments: Mutex<HashMap<String, Payment>>,
}

impl PaymentBook {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Payment>> {
        self.payments.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, payment: Payment) {
        self.lock().insert(payment.gateway_order_id.clone(), payment);
    }

    pub fn get(&self, gateway_order_id: &str) -> Result<Payment, OrderError> {
        self.lock()
            .get(gateway_order_id)
            .cloned()
            .ok_or_else(|| OrderError::PaymentNotFound(gateway_order_id.to_string()))
    }

    /// Payments for an order, oldest first.
    pub fn for_order(&self, order_id: &OrderId) -> Vec<Payment> {
        let mut payments: Vec<Payment> = self
            .lock()
            .values()
            .filter(|p| &p.order_id == order_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        payments
    }

    /// Mark a payment verified.
    ///
    /// Returns whether stock was still reserved for it; the caller consumes
    /// that reservation.
    pub fn claim_verified(
        &self,
        callback: &PaymentVerification,
        now: DateTime<Utc>,
    ) -> Result<bool, OrderError> {
        let mut payments = self.lock();
        let payment = payments
            .get_mut(&callback.gateway_order_id)
            .ok_or_else(|| OrderError::PaymentNotFound(callback.gateway_order_id.clone()))?;
        if payment.state == PaymentState::Verified {
            return Err(OrderError::PaymentAlreadyVerified(
                callback.gateway_order_id.clone(),
            ));
        }
        let held = payment.reservation_held;
        payment.state = PaymentState::Verified;
        payment.gateway_payment_id = Some(callback.gateway_payment_id.clone());
        payment.signature = Some(callback.signature.clone());
        payment.reservation_held = false;
        payment.verified_at = Some(now);
        payment.failure_reason = None;
        Ok(held)
    }

    /// Mark a payment failed.
    ///
    /// Returns whether stock was still reserved for it; the caller releases
    /// that reservation. Verified payments are left alone.
    pub fn fail(&self, gateway_order_id: &str, reason: &str) -> Result<bool, OrderError> {
        let mut payments = self.lock();
        let payment = payments
            .get_mut(gateway_order_id)
            .ok_or_else(|| OrderError::PaymentNotFound(gateway_order_id.to_string()))?;
        if payment.state == PaymentState::Verified {
            return Err(OrderError::PaymentAlreadyVerified(gateway_order_id.to_string()));
        }
        let held = payment.reservation_held;
        payment.state = PaymentState::Failed;
        payment.reservation_held = false;
        payment.failure_reason = Some(reason.to_string());
        Ok(held)
    }

    /// Fail every unverified payment for a cancelled order.
    pub fn fail_all_for_order(&self, order_id: &OrderId, reason: &str) {
        for payment in self
            .lock()
            .values_mut()
            .filter(|p| &p.order_id == order_id && p.state != PaymentState::Verified)
        {
            payment.state = PaymentState::Failed;
            payment.reservation_held = false;
            payment.failure_reason = Some(reason.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use crate::payment::PaymentIntent;

    fn payment(gateway_order_id: &str) -> Payment {
        let intent = PaymentIntent {
            gateway_order_id: gateway_order_id.into(),
            amount_minor: 18_000,
            currency: Currency::INR,
        };
        Payment::new(OrderId::new("o1"), &intent, Utc::now())
    }

    fn callback(gateway_order_id: &str) -> PaymentVerification {
        PaymentVerification {
            gateway_order_id: gateway_order_id.into(),
            gateway_payment_id: "pay_1".into(),
            signature: "sig".into(),
        }
    }

    #[test]
    fn test_claim_once() {
        let book = PaymentBook::new();
        book.insert(payment("g1"));

        assert!(book.claim_verified(&callback("g1"), Utc::now()).unwrap());
        assert!(matches!(
            book.claim_verified(&callback("g1"), Utc::now()),
            Err(OrderError::PaymentAlreadyVerified(_))
        ));
        assert!(matches!(
            book.fail("g1", "late"),
            Err(OrderError::PaymentAlreadyVerified(_))
        ));
    }

    #[test]
    fn test_fail_hands_back_reservation_once() {
        let book = PaymentBook::new();
        book.insert(payment("g1"));

        assert!(book.fail("g1", "bad signature").unwrap());
        assert!(!book.fail("g1", "bad signature").unwrap());

        // A later valid callback no longer owns a reservation.
        assert!(!book.claim_verified(&callback("g1"), Utc::now()).unwrap());
    }

    #[test]
    fn test_unknown_gateway_order() {
        let book = PaymentBook::new();
        assert!(matches!(
            book.get("missing"),
            Err(OrderError::PaymentNotFound(_))
        ));
    }

    #[test]
    fn test_fail_all_for_order() {
        let book = PaymentBook::new();
        book.insert(payment("g1"));
        book.fail_all_for_order(&OrderId::new("o1"), "order cancelled");
        let p = book.get("g1").unwrap();
        assert_eq!(p.state, PaymentState::Failed);
        assert!(!p.reservation_held);
    }
}
