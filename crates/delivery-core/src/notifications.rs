//! Notification inbox and delivery
//!
//! Notifications are stored newest first. Every notification is persisted
//! before it is handed to the [`Notifier`]; a delivery failure is logged
//! and the stored record is kept.

use async_trait::async_trait;
use delivery_api::{AppNotification, DeepLink, NotificationDraft, NotificationKind};
use delivery_store::{JsonStoreExt, KvStore};
use delivery_util::{DeliveryError, NotificationId, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::keys;

/// Platform seam: shows a notification to the user
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, notification: &AppNotification) -> Result<()>;
}

/// Notifier that only writes to the log
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, notification: &AppNotification) -> Result<()> {
        info!(
            id = %notification.id,
            kind = ?notification.kind,
            title = %notification.title,
            deeplink = %notification.deep_link(),
            "Notification"
        );
        Ok(())
    }
}

/// Notifier that records what it was given, for tests and dry runs
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<AppNotification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later delivery fail, or succeed again
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn delivered(&self) -> Vec<AppNotification> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn delivered_kinds(&self) -> Vec<NotificationKind> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|n| n.kind)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, notification: &AppNotification) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::internal("notifier unavailable"));
        }
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification.clone());
        Ok(())
    }
}

pub struct NotificationService {
    store: Arc<dyn KvStore>,
    notifier: Arc<dyn Notifier>,
    scheduled: Mutex<HashMap<NotificationId, JoinHandle<()>>>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn KvStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            scheduled: Mutex::new(HashMap::new()),
        }
    }

    fn persist(&self, notification: &AppNotification) -> Result<()> {
        self.store
            .modify(keys::NOTIFICATIONS, |all: &mut Vec<AppNotification>| {
                all.insert(0, notification.clone());
                Ok::<_, DeliveryError>(())
            })
    }

    /// Store a notification and deliver it now
    pub async fn send(&self, draft: NotificationDraft) -> Result<AppNotification> {
        let notification = draft.into_notification(delivery_util::now());
        self.persist(&notification)?;

        if let Err(e) = self.notifier.deliver(&notification).await {
            warn!(id = %notification.id, error = %e, "Notification delivery failed");
        }
        debug!(id = %notification.id, kind = ?notification.kind, "Notification sent");
        Ok(notification)
    }

    /// Store a notification stamped `delay` in the future and deliver it
    /// once the delay has passed
    pub async fn schedule(
        &self,
        draft: NotificationDraft,
        delay: Duration,
    ) -> Result<AppNotification> {
        let fire_at = delivery_util::add_duration(delivery_util::now(), delay);
        let notification = draft.into_notification(fire_at);
        self.persist(&notification)?;

        let notifier = self.notifier.clone();
        let pending = notification.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = notifier.deliver(&pending).await {
                warn!(id = %pending.id, error = %e, "Scheduled notification delivery failed");
            }
        });

        let mut scheduled = self.scheduled.lock().unwrap_or_else(PoisonError::into_inner);
        scheduled.retain(|_, h| !h.is_finished());
        scheduled.insert(notification.id.clone(), handle);

        info!(id = %notification.id, delay_secs = delay.as_secs(), "Notification scheduled");
        Ok(notification)
    }

    /// Stop a pending scheduled delivery. The stored record stays.
    pub fn cancel_scheduled(&self, id: &NotificationId) -> bool {
        let handle = self
            .scheduled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        match handle {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                debug!(id = %id, "Scheduled notification cancelled");
                true
            }
            _ => false,
        }
    }

    /// Newest first
    pub fn all(&self) -> Result<Vec<AppNotification>> {
        Ok(self.store.load_or_default(keys::NOTIFICATIONS)?)
    }

    pub fn unread_count(&self) -> Result<usize> {
        Ok(self.all()?.iter().filter(|n| !n.read).count())
    }

    pub fn mark_read(&self, id: &NotificationId) -> Result<()> {
        self.store
            .modify(keys::NOTIFICATIONS, |all: &mut Vec<AppNotification>| {
                let n = all
                    .iter_mut()
                    .find(|n| &n.id == id)
                    .ok_or_else(|| DeliveryError::not_found(format!("notification {id}")))?;
                n.read = true;
                Ok(())
            })
    }

    pub fn mark_all_read(&self) -> Result<()> {
        self.store
            .modify(keys::NOTIFICATIONS, |all: &mut Vec<AppNotification>| {
                all.iter_mut().for_each(|n| n.read = true);
                Ok::<_, DeliveryError>(())
            })
    }

    pub fn delete(&self, id: &NotificationId) -> Result<()> {
        self.cancel_scheduled(id);
        self.store
            .modify(keys::NOTIFICATIONS, |all: &mut Vec<AppNotification>| {
                let before = all.len();
                all.retain(|n| &n.id != id);
                if all.len() == before {
                    return Err(DeliveryError::not_found(format!("notification {id}")));
                }
                Ok(())
            })
    }

    /// Drop every stored notification and pending delivery
    pub fn clear_all(&self) -> Result<()> {
        let mut scheduled = self.scheduled.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, handle) in scheduled.drain() {
            handle.abort();
        }
        drop(scheduled);

        self.store.remove(keys::NOTIFICATIONS)?;
        info!("Notifications cleared");
        Ok(())
    }

    pub fn screen_for(kind: NotificationKind) -> &'static str {
        kind.screen()
    }

    pub fn deep_link_for(notification: &AppNotification) -> DeepLink {
        notification.deep_link()
    }
}

impl Drop for NotificationService {
    fn drop(&mut self) {
        let scheduled = self.scheduled.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, handle) in scheduled.drain() {
            handle.abort();
        }
    }
}
