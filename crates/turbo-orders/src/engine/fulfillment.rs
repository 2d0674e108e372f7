use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::engine::{Actor, OrderEngine};
use crate::error::OrderError;
use crate::ids::OrderId;
use crate::order::Order;

impl OrderEngine {
    fn transition(
        &self,
        order_id: &OrderId,
        step: impl FnOnce(&mut Order, DateTime<Utc>) -> Result<(), OrderError>,
    ) -> Result<Order, OrderError> {
        let now = self.now();
        let order = self.orders.update(order_id, |order| {
            step(order, now)?;
            Ok(order.clone())
        })?;
        info!(status = %order.status, "order status changed");
        Ok(order)
    }

    #[instrument(skip(self, actor), fields(admin = %actor.user_id, order_id = %order_id))]
    pub fn confirm_order(&self, actor: &Actor, order_id: &OrderId) -> Result<Order, OrderError> {
        actor.require_admin("confirm_order")?;
        self.transition(order_id, Order::confirm)
    }

    #[instrument(skip(self, actor), fields(admin = %actor.user_id, order_id = %order_id))]
    pub fn ship_order(&self, actor: &Actor, order_id: &OrderId) -> Result<Order, OrderError> {
        actor.require_admin("ship_order")?;
        self.transition(order_id, Order::ship)
    }

    #[instrument(skip(self, actor), fields(admin = %actor.user_id, order_id = %order_id))]
    pub fn deliver_order(&self, actor: &Actor, order_id: &OrderId) -> Result<Order, OrderError> {
        actor.require_admin("deliver_order")?;
        self.transition(order_id, Order::deliver)
    }
}
