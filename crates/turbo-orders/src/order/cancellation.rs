//! Cancellation requests awaiting admin review.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::OrderError;
use crate::ids::{CancellationId, OrderId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CancellationStatus {
    Pending,
    Approved,
    Rejected,
}

impl CancellationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationStatus::Pending => "pending",
            CancellationStatus::Approved => "approved",
            CancellationStatus::Rejected => "rejected",
        }
    }
}

/// A customer's request to cancel an order outside the self-service window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancellationRequest {
    pub id: CancellationId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub reason: String,
    pub status: CancellationStatus,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl CancellationRequest {
    pub fn new(
        order_id: OrderId,
        user_id: UserId,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CancellationId::generate(),
            order_id,
            user_id,
            reason: reason.into(),
            status: CancellationStatus::Pending,
            created_at: now,
            decided_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == CancellationStatus::Pending
    }
}

/// Cancellation requests, at most one pending per order.
#[derive(Debug, Default)]
pub struct CancellationBook {
    requests: Mutex<HashMap<CancellationId, CancellationRequest>>,
}

impl CancellationBook {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CancellationId, CancellationRequest>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, id: &CancellationId) -> Result<CancellationRequest, OrderError> {
        self.lock()
            .get(id)
            .cloned()
            .ok_or_else(|| OrderError::CancellationNotFound(id.clone()))
    }

    pub fn pending_for(&self, order_id: &OrderId) -> Option<CancellationRequest> {
        self.lock()
            .values()
            .find(|r| &r.order_id == order_id && r.is_pending())
            .cloned()
    }

    /// Store a new pending request.
    pub fn queue(&self, request: CancellationRequest) -> Result<(), OrderError> {
        let mut requests = self.lock();
        if requests
            .values()
            .any(|r| r.order_id == request.order_id && r.is_pending())
        {
            return Err(OrderError::CancellationAlreadyRequested(request.order_id));
        }
        requests.insert(request.id.clone(), request);
        Ok(())
    }

    /// Approve or reject a pending request.
    pub fn decide(
        &self,
        id: &CancellationId,
        approve: bool,
        now: DateTime<Utc>,
    ) -> Result<CancellationRequest, OrderError> {
        let mut requests = self.lock();
        let request = requests
            .get_mut(id)
            .ok_or_else(|| OrderError::CancellationNotFound(id.clone()))?;
        if !request.is_pending() {
            return Err(OrderError::NotPendingCancellation(id.clone()));
        }
        request.status = if approve {
            CancellationStatus::Approved
        } else {
            CancellationStatus::Rejected
        };
        request.decided_at = Some(now);
        Ok(request.clone())
    }

    /// Approve whatever request is pending for `order_id`.
    pub fn approve_pending_for(
        &self,
        order_id: &OrderId,
        now: DateTime<Utc>,
    ) -> Option<CancellationRequest> {
        let mut requests = self.lock();
        let request = requests
            .values_mut()
            .find(|r| &r.order_id == order_id && r.is_pending())?;
        request.status = CancellationStatus::Approved;
        request.decided_at = Some(now);
        Some(request.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(order: &str) -> CancellationRequest {
        CancellationRequest::new(OrderId::new(order), UserId::new("u"), "changed mind", Utc::now())
    }

    #[test]
    fn test_one_pending_per_order() {
        let book = CancellationBook::new();
        book.queue(request("o1")).unwrap();
        assert!(matches!(
            book.queue(request("o1")),
            Err(OrderError::CancellationAlreadyRequested(_))
        ));
        book.queue(request("o2")).unwrap();
    }

    #[test]
    fn test_decide_once() {
        let book = CancellationBook::new();
        let req = request("o1");
        let id = req.id.clone();
        book.queue(req).unwrap();

        let decided = book.decide(&id, false, Utc::now()).unwrap();
        assert_eq!(decided.status, CancellationStatus::Rejected);
        assert!(matches!(
            book.decide(&id, true, Utc::now()),
            Err(OrderError::NotPendingCancellation(_))
        ));

        // A rejected request does not block a new one.
        book.queue(request("o1")).unwrap();
    }

    #[test]
    fn test_approve_pending_for_order() {
        let book = CancellationBook::new();
        book.queue(request("o1")).unwrap();
        let approved = book.approve_pending_for(&OrderId::new("o1"), Utc::now()).unwrap();
        assert_eq!(approved.status, CancellationStatus::Approved);
        assert!(book.pending_for(&OrderId::new("o1")).is_none());
    }
}
