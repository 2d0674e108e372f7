//! Order storage.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::OrderError;
use crate::ids::{OrderId, UserId};
use crate::order::Order;

/// Every order, keyed by id.
#[derive(Debug, Default)]
pub struct OrderBook {
    orders: Mutex<HashMap<OrderId, Order>>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<OrderId, Order>> {
        self.orders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, order: Order) {
        self.lock().insert(order.id.clone(), order);
    }

    pub fn get(&self, id: &OrderId) -> Option<Order> {
        self.lock().get(id).cloned()
    }

    /// Fetch an order only if `user_id` placed it.
    pub fn owned_by(&self, id: &OrderId, user_id: &UserId) -> Result<Order, OrderError> {
        self.lock()
            .get(id)
            .filter(|o| &o.user_id == user_id)
            .cloned()
            .ok_or_else(|| OrderError::OrderNotFound(id.clone()))
    }

    /// Run a transition against one order under the book lock.
    ///
    /// Work done inside `f` is atomic with respect to every other order
    /// transition. A failed `f` leaves the stored order unchanged.
    pub fn update<T>(
        &self,
        id: &OrderId,
        f: impl FnOnce(&mut Order) -> Result<T, OrderError>,
    ) -> Result<T, OrderError> {
        let mut orders = self.lock();
        let stored = orders
            .get_mut(id)
            .ok_or_else(|| OrderError::OrderNotFound(id.clone()))?;
        let mut draft = stored.clone();
        let out = f(&mut draft)?;
        *stored = draft;
        Ok(out)
    }

    /// A user's orders, newest first.
    pub fn for_user(&self, user_id: &UserId) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .lock()
            .values()
            .filter(|o| &o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }
}
