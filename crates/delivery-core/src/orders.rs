//! Order history
//!
//! Orders are append-only; only their status changes after checkout.

use delivery_api::{Order, OrderStatus};
use delivery_store::{JsonStoreExt, KvStore};
use delivery_util::{DeliveryError, OrderId, Result, UserId};
use std::sync::Arc;
use tracing::{info, warn};

use crate::keys;

pub struct OrderStore {
    store: Arc<dyn KvStore>,
}

impl OrderStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn save(&self, order: Order) -> Result<Order> {
        let order = self.store.modify(keys::ORDERS, |orders: &mut Vec<Order>| {
            if orders.iter().any(|o| o.id == order.id) {
                return Err(DeliveryError::validation(format!(
                    "order {} already exists",
                    order.id
                )));
            }
            orders.push(order.clone());
            Ok(order)
        })?;

        info!(order_id = %order.id, user_id = %order.user_id, total = %order.total, "Order saved");
        Ok(order)
    }

    pub fn all(&self) -> Result<Vec<Order>> {
        Ok(self.store.load_or_default(keys::ORDERS)?)
    }

    /// The user's orders, newest first
    pub fn for_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .all()?
            .into_iter()
            .filter(|o| &o.user_id == user_id)
            .collect();
        orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
        Ok(orders)
    }

    pub fn find(&self, order_id: &OrderId) -> Result<Option<Order>> {
        Ok(self.all()?.into_iter().find(|o| &o.id == order_id))
    }

    pub fn get(&self, order_id: &OrderId) -> Result<Order> {
        self.find(order_id)?
            .ok_or_else(|| DeliveryError::not_found(format!("order {order_id}")))
    }

    /// Move an order to `status`. Setting the current status again is a
    /// no-op; delivered and cancelled orders cannot change.
    pub fn update_status(&self, order_id: &OrderId, status: OrderStatus) -> Result<Order> {
        let (order, previous) = self.store.modify(keys::ORDERS, |orders: &mut Vec<Order>| {
            let order = orders
                .iter_mut()
                .find(|o| &o.id == order_id)
                .ok_or_else(|| DeliveryError::not_found(format!("order {order_id}")))?;

            let previous = order.status;
            if previous == status {
                return Ok((order.clone(), previous));
            }
            if !previous.can_transition_to(status) {
                return Err(DeliveryError::InvalidTransition {
                    from: previous.to_string(),
                    to: status.to_string(),
                });
            }
            order.status = status;
            Ok((order.clone(), previous))
        })
        .inspect_err(|e| warn!(order_id = %order_id, error = %e, "Status update rejected"))?;

        if previous != status {
            info!(order_id = %order_id, from = %previous, to = %status, "Order status updated");
        }
        Ok(order)
    }

    /// Cancel one of the user's own orders
    pub fn cancel(&self, order_id: &OrderId, user_id: &UserId) -> Result<Order> {
        let order = self.get(order_id)?;
        if &order.user_id != user_id {
            return Err(DeliveryError::not_found(format!("order {order_id}")));
        }
        self.update_status(order_id, OrderStatus::Cancelled)
    }
}
