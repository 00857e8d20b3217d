//! Simulated order progression
//!
//! One timer task per order: after `ready_after` the order goes out for
//! delivery and the user is told, then after `delivery_notice_after` a
//! delivery notice follows. Timers live in memory only and are lost when
//! the process exits.

use delivery_api::{NotificationDraft, NotificationKind, OrderStatus};
use delivery_config::TrackingPolicy;
use delivery_util::{DeliveryError, OrderId, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{NotificationService, OrderStore};

struct Timer {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Timers {
    next_generation: u64,
    by_order: HashMap<OrderId, Timer>,
}

pub struct OrderTracker {
    orders: Arc<OrderStore>,
    notifications: Arc<NotificationService>,
    policy: TrackingPolicy,
    timers: Arc<Mutex<Timers>>,
}

fn lock(timers: &Mutex<Timers>) -> MutexGuard<'_, Timers> {
    timers.lock().unwrap_or_else(PoisonError::into_inner)
}

impl OrderTracker {
    pub fn new(
        orders: Arc<OrderStore>,
        notifications: Arc<NotificationService>,
        policy: TrackingPolicy,
    ) -> Self {
        Self {
            orders,
            notifications,
            policy,
            timers: Arc::new(Mutex::new(Timers::default())),
        }
    }

    /// Start (or restart) tracking an order. Must be called from within a
    /// tokio runtime.
    pub fn start(&self, order_id: &OrderId) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| DeliveryError::internal("order tracking requires a tokio runtime"))?;

        let mut timers = lock(&self.timers);
        if let Some(old) = timers.by_order.remove(order_id) {
            old.handle.abort();
            debug!(order_id = %order_id, "Previous tracking replaced");
        }
        timers.next_generation += 1;
        let generation = timers.next_generation;

        let task = Progression {
            order_id: order_id.clone(),
            orders: self.orders.clone(),
            notifications: self.notifications.clone(),
            policy: self.policy.clone(),
            timers: self.timers.clone(),
            generation,
        };
        let handle = runtime.spawn(task.run());
        timers
            .by_order
            .insert(order_id.clone(), Timer { generation, handle });

        info!(
            order_id = %order_id,
            ready_after_secs = self.policy.ready_after.as_secs(),
            "Order tracking started"
        );
        Ok(())
    }

    /// Returns whether a timer was running
    pub fn stop(&self, order_id: &OrderId) -> bool {
        match lock(&self.timers).by_order.remove(order_id) {
            Some(timer) => {
                timer.handle.abort();
                info!(order_id = %order_id, "Order tracking stopped");
                true
            }
            None => false,
        }
    }

    /// Orders with a timer still running
    pub fn active(&self) -> Vec<OrderId> {
        let mut ids: Vec<OrderId> = lock(&self.timers)
            .by_order
            .iter()
            .filter(|(_, t)| !t.handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn clear_all(&self) {
        let mut timers = lock(&self.timers);
        let count = timers.by_order.len();
        for (_, timer) in timers.by_order.drain() {
            timer.handle.abort();
        }
        if count > 0 {
            info!(count, "All order tracking cleared");
        }
    }

    /// Mark an order delivered right away and tell the user
    pub async fn complete(&self, order_id: &OrderId) -> Result<()> {
        self.stop(order_id);
        self.orders.update_status(order_id, OrderStatus::Delivered)?;

        self.notifications
            .send(
                NotificationDraft::new(
                    NotificationKind::General,
                    "Order Delivered!",
                    "Your order has been successfully delivered. Enjoy your meal!",
                )
                .for_order(order_id.clone()),
            )
            .await?;

        info!(order_id = %order_id, "Order completed");
        Ok(())
    }
}

impl Drop for OrderTracker {
    fn drop(&mut self) {
        self.clear_all();
    }
}

/// State moved into one timer task
struct Progression {
    order_id: OrderId,
    orders: Arc<OrderStore>,
    notifications: Arc<NotificationService>,
    policy: TrackingPolicy,
    timers: Arc<Mutex<Timers>>,
    generation: u64,
}

impl Progression {
    async fn run(self) {
        tokio::time::sleep(self.policy.ready_after).await;

        if self.mark_ready().await {
            tokio::time::sleep(self.policy.delivery_notice_after).await;
            self.send_delivery_notice().await;
        }

        let mut timers = lock(&self.timers);
        if timers
            .by_order
            .get(&self.order_id)
            .is_some_and(|t| t.generation == self.generation)
        {
            timers.by_order.remove(&self.order_id);
        }
    }

    async fn mark_ready(&self) -> bool {
        let order_id = &self.order_id;
        if let Err(e) = self
            .orders
            .update_status(order_id, OrderStatus::OutForDelivery)
        {
            warn!(order_id = %order_id, error = %e, "Order not moved out for delivery");
            return false;
        }

        let draft = NotificationDraft::new(
            NotificationKind::OrderReady,
            "Your Order is Ready!",
            format!(
                "Your order #{} is now being prepared for delivery!",
                order_id.short()
            ),
        )
        .for_order(order_id.clone());
        if let Err(e) = self.notifications.send(draft).await {
            warn!(order_id = %order_id, error = %e, "Ready notification failed");
        }
        true
    }

    async fn send_delivery_notice(&self) {
        let draft = NotificationDraft::new(
            NotificationKind::Delivery,
            "Out for Delivery!",
            "Your order is on its way! Expected delivery in 20-30 minutes.",
        )
        .for_order(self.order_id.clone());
        match self.notifications.send(draft).await {
            Ok(_) => debug!(order_id = %self.order_id, "Delivery notice sent"),
            Err(e) => warn!(order_id = %self.order_id, error = %e, "Delivery notice failed"),
        }
    }
}
