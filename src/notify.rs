use std::{
    collections::BTreeMap,
    sync::{Mutex, PoisonError},
};

use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

/// Id shared by every notification this service raises, so a new failure
/// replaces the previous one instead of stacking up.
pub const NOTIFICATION_ID: &str = "wiser_notification";
pub const NOTIFICATION_TITLE: &str = "Wiser Component Setup";

/// A persistent, user-visible message. It stays visible until dismissed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            id: NOTIFICATION_ID.to_owned(),
            title: NOTIFICATION_TITLE.to_owned(),
            message: message.into(),
        }
    }
}

/// Persistent notification sink provided by the host.
pub trait Notifier: Send + Sync {
    /// Create or replace the notification with `notification.id`.
    fn create(&self, notification: Notification);

    fn dismiss(&self, id: &str);
}

/// Notifier for the standalone host: logs every notification and keeps the
/// active ones so the API can list them.
#[derive(Default)]
pub struct LogNotifier {
    active: Mutex<BTreeMap<String, Notification>>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Vec<Notification> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

impl Notifier for LogNotifier {
    fn create(&self, notification: Notification) {
        warn!(
            id = %notification.id,
            title = %notification.title,
            message = %notification.message,
            "Persistent notification"
        );
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(notification.id.clone(), notification);
    }

    fn dismiss(&self, id: &str) {
        let removed = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        if removed.is_some() {
            info!(id = %id, "Persistent notification dismissed");
        }
    }
}
