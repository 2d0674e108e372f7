//! Return requests and their refunds.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::OrderError;
use crate::ids::{OrderId, ReturnId, UserId};
use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReturnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnStatus::Pending => "pending",
            ReturnStatus::Approved => "approved",
            ReturnStatus::Rejected => "rejected",
        }
    }
}

/// Refund progress for an approved return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RefundStatus {
    #[default]
    None,
    /// Marked before the wallet is credited.
    Initiated,
    Completed,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::None => "none",
            RefundStatus::Initiated => "initiated",
            RefundStatus::Completed => "completed",
        }
    }
}

/// A customer's request to send back a delivered order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReturnRequest {
    pub id: ReturnId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub reason: String,
    pub status: ReturnStatus,
    pub refund_status: RefundStatus,
    /// Units put back into stock.
    pub restocked: bool,
    pub refund_amount: Option<Money>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl ReturnRequest {
    pub fn new(
        order_id: OrderId,
        user_id: UserId,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ReturnId::generate(),
            order_id,
            user_id,
            reason: reason.into(),
            status: ReturnStatus::Pending,
            refund_status: RefundStatus::None,
            restocked: false,
            refund_amount: None,
            created_at: now,
            decided_at: None,
        }
    }

    /// Wallet idempotency key for this return's refund.
    pub fn refund_reference(&self) -> String {
        format!("refund:{}", self.id)
    }

    fn ensure_approved(&self) -> Result<(), OrderError> {
        if self.status != ReturnStatus::Approved {
            return Err(OrderError::ReturnNotApproved(self.id.clone()));
        }
        Ok(())
    }

    /// Whether this request blocks a new one for the same order.
    fn is_open(&self) -> bool {
        matches!(self.status, ReturnStatus::Pending | ReturnStatus::Approved)
    }
}

/// Return requests keyed by id.
#[derive(Debug, Default)]
pub struct ReturnBook {
    requests: Mutex<HashMap<ReturnId, ReturnRequest>>,
}

impl ReturnBook {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ReturnId, ReturnRequest>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, id: &ReturnId) -> Result<ReturnRequest, OrderError> {
        self.lock()
            .get(id)
            .cloned()
            .ok_or_else(|| OrderError::ReturnNotFound(id.clone()))
    }

    pub fn for_order(&self, order_id: &OrderId) -> Vec<ReturnRequest> {
        let mut requests: Vec<ReturnRequest> = self
            .lock()
            .values()
            .filter(|r| &r.order_id == order_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        requests
    }

    /// Whether a pending or approved request exists for the order.
    pub fn has_open(&self, order_id: &OrderId) -> bool {
        self.lock()
            .values()
            .any(|r| &r.order_id == order_id && r.is_open())
    }

    /// Store a new request unless one is already open for the order.
    pub fn open(&self, request: ReturnRequest) -> Result<(), OrderError> {
        let mut requests = self.lock();
        if requests
            .values()
            .any(|r| r.order_id == request.order_id && r.is_open())
        {
            return Err(OrderError::ReturnAlreadyRequested(request.order_id));
        }
        requests.insert(request.id.clone(), request);
        Ok(())
    }

    /// Approve or reject a pending request.
    pub fn decide(
        &self,
        id: &ReturnId,
        approve: bool,
        now: DateTime<Utc>,
    ) -> Result<ReturnRequest, OrderError> {
        self.update(id, |r| {
            if r.status != ReturnStatus::Pending {
                return Err(OrderError::AlreadyProcessed(r.id.clone()));
            }
            r.status = if approve {
                ReturnStatus::Approved
            } else {
                ReturnStatus::Rejected
            };
            r.decided_at = Some(now);
            Ok(())
        })
    }

    /// Move an approved return's refund from None to Initiated.
    pub fn begin_refund(&self, id: &ReturnId, amount: Money) -> Result<ReturnRequest, OrderError> {
        self.update(id, |r| {
            r.ensure_approved()?;
            if r.refund_status != RefundStatus::None {
                return Err(OrderError::RefundAlreadyInitiated(r.id.clone()));
            }
            r.refund_status = RefundStatus::Initiated;
            r.refund_amount = Some(amount);
            Ok(())
        })
    }

    /// Fetch a refund stuck in Initiated.
    pub fn retriable_refund(&self, id: &ReturnId) -> Result<ReturnRequest, OrderError> {
        let request = self.get(id)?;
        request.ensure_approved()?;
        if request.refund_status != RefundStatus::Initiated {
            return Err(OrderError::RefundNotRetriable(id.clone()));
        }
        Ok(request)
    }

    pub fn complete_refund(&self, id: &ReturnId) -> Result<ReturnRequest, OrderError> {
        self.update(id, |r| {
            r.refund_status = RefundStatus::Completed;
            Ok(())
        })
    }

    /// Flag an approved return as restocked, once.
    pub fn mark_restocked(&self, id: &ReturnId) -> Result<ReturnRequest, OrderError> {
        self.update(id, |r| {
            r.ensure_approved()?;
            if r.restocked {
                return Err(OrderError::AlreadyRestocked(r.id.clone()));
            }
            r.restocked = true;
            Ok(())
        })
    }

    /// Undo [`ReturnBook::mark_restocked`] when the stock update fails.
    pub fn unmark_restocked(&self, id: &ReturnId) {
        if let Some(r) = self.lock().get_mut(id) {
            r.restocked = false;
        }
    }

    fn update(
        &self,
        id: &ReturnId,
        f: impl FnOnce(&mut ReturnRequest) -> Result<(), OrderError>,
    ) -> Result<ReturnRequest, OrderError> {
        let mut requests = self.lock();
        let request = requests
            .get_mut(id)
            .ok_or_else(|| OrderError::ReturnNotFound(id.clone()))?;
        f(request)?;
        Ok(request.clone())
    }
}
