//! User-visible notification sinks.
//!
//! Failed writes and blacklisted entities are surfaced here instead of
//! being returned up the stack; local state is left untouched.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::clock::now_ms;
use crate::util::{EntityId, EntityKind};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    /// Informational.
    Info,
    /// Something was skipped.
    Warning,
    /// A write or refresh failed.
    Error,
}

/// Notification structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Notification identifier.
    pub notification_id: String,
    /// Kind of the affected entity.
    pub entity_kind: EntityKind,
    /// Affected entity.
    pub entity_id: EntityId,
    /// Severity.
    pub level: NotificationLevel,
    /// Message shown to the user.
    pub message: String,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
}

/// Notification sink abstraction.
///
/// `notify` must not block: no network calls, no store writes.
pub trait NotificationSink: Send + Sync {
    /// Record a notification.
    fn notify(&self, notification: Notification);
}

/// Bounded in-memory sink; clones share the same buffer.
#[derive(Clone)]
pub struct InMemoryNotificationSink {
    notifications: Arc<Mutex<VecDeque<Notification>>>,
    max_notifications: usize,
}

impl InMemoryNotificationSink {
    /// Create a new in-memory sink with a bounded buffer.
    pub fn new(max_notifications: usize) -> Self {
        Self {
            notifications: Arc::new(Mutex::new(VecDeque::with_capacity(max_notifications))),
            max_notifications,
        }
    }

    /// Retrieve a snapshot of stored notifications, oldest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().iter().cloned().collect()
    }

    /// Number of stored notifications.
    pub fn len(&self) -> usize {
        self.notifications.lock().len()
    }

    /// Whether nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.notifications.lock().is_empty()
    }

    /// Drop all stored notifications.
    pub fn clear(&self) {
        self.notifications.lock().clear();
    }
}

impl NotificationSink for InMemoryNotificationSink {
    fn notify(&self, notification: Notification) {
        let mut buffer = self.notifications.lock();
        if self.max_notifications == 0 {
            return;
        }
        if buffer.len() >= self.max_notifications {
            buffer.pop_front();
        }
        buffer.push_back(notification);
    }
}

/// Sink that only logs; for embedders that surface notifications elsewhere.
#[derive(Clone, Copy, Default)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => tracing::error!(
                kind = %notification.entity_kind,
                id = %notification.entity_id,
                "{}",
                notification.message
            ),
            NotificationLevel::Warning => tracing::warn!(
                kind = %notification.entity_kind,
                id = %notification.entity_id,
                "{}",
                notification.message
            ),
            NotificationLevel::Info => tracing::info!(
                kind = %notification.entity_kind,
                id = %notification.entity_id,
                "{}",
                notification.message
            ),
        }
    }
}

/// Helper to build a notification from context.
pub fn build_notification(
    entity_kind: EntityKind,
    entity_id: impl Into<EntityId>,
    level: NotificationLevel,
    message: impl Into<String>,
) -> Notification {
    Notification {
        notification_id: Uuid::new_v4().to_string(),
        entity_kind,
        entity_id: entity_id.into(),
        level,
        message: message.into(),
        created_at_ms: now_ms(),
    }
}
