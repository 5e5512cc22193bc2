//! In-process update bus.
//!
//! Publishing is synchronous: every matching subscriber is called before
//! `publish` returns, in registration order. The subscription set is
//! snapshotted at the start of each publish, so subscribe/unsubscribe calls
//! made during delivery apply from the next publish on.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use super::manifest::ManifestRegistry;
use crate::infra::store::Node;
use crate::util::clock::now_ms;
use crate::util::{EntityId, EntityKind, FieldId};

/// "Fields X of entity Y changed", as seen by one subscriber.
#[derive(Debug, Clone)]
pub struct UpdateEvent {
    /// Identifier shared by every copy of one publish call.
    pub event_id: Uuid,
    /// Kind of the publishing entity.
    pub publisher_kind: EntityKind,
    /// Identifier of the publishing entity.
    pub publisher_id: EntityId,
    /// Changed fields this subscriber declared interest in.
    pub relevant_field_ids: Vec<FieldId>,
    /// Entity data after the change.
    pub payload: Arc<Node>,
    /// Publish time in milliseconds since the epoch.
    pub timestamp_ms: u128,
}

impl UpdateEvent {
    /// Whether `field_id` is among the relevant fields.
    pub fn touches(&self, field_id: &str) -> bool {
        self.relevant_field_ids.iter().any(|f| *f == field_id)
    }
}

/// Receiver of update events.
pub trait UpdateHandler: Send + Sync {
    /// Handle one event. Events are partial patches: apply idempotently.
    fn on_update(&self, event: &UpdateEvent);
}

impl<F> UpdateHandler for F
where
    F: Fn(&UpdateEvent) + Send + Sync,
{
    fn on_update(&self, event: &UpdateEvent) {
        self(event);
    }
}

struct Subscription {
    subscriber_id: EntityId,
    subscriber_kind: EntityKind,
    handler: Weak<dyn UpdateHandler>,
}

/// Outcome of one publish call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    /// Subscribers the event was delivered to.
    pub delivered: usize,
    /// Matching subscribers whose handler had already been dropped.
    pub skipped: usize,
    /// Changed fields dropped because the publisher does not declare them.
    pub undeclared_fields: usize,
}

/// Manifest-filtered publish/subscribe bus.
#[derive(Clone)]
pub struct UpdateBus {
    registry: ManifestRegistry,
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
}

impl UpdateBus {
    /// Bus filtering by `registry`.
    pub fn new(registry: ManifestRegistry) -> Self {
        Self {
            registry,
            subscriptions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Manifests used for filtering.
    pub const fn registry(&self) -> &ManifestRegistry {
        &self.registry
    }

    /// Register `handler` for the entity `subscriber_id` of `subscriber_kind`.
    ///
    /// The bus keeps only a weak reference; dropping the last strong
    /// reference tears the subscriber down. Subscribing the same entity again
    /// replaces its handler but keeps its place in delivery order. Ids are
    /// scoped by kind.
    pub fn subscribe(
        &self,
        subscriber_id: impl Into<EntityId>,
        subscriber_kind: EntityKind,
        handler: &Arc<dyn UpdateHandler>,
    ) {
        let subscriber_id = subscriber_id.into();
        let handler = Arc::downgrade(handler);
        let mut subs = self.subscriptions.lock();
        if let Some(existing) = subs
            .iter_mut()
            .find(|s| s.subscriber_kind == subscriber_kind && s.subscriber_id == subscriber_id)
        {
            existing.handler = handler;
            tracing::debug!(subscriber = %subscriber_id, "subscription replaced");
            return;
        }
        tracing::debug!(subscriber = %subscriber_id, kind = %subscriber_kind, "subscribed");
        subs.push(Subscription {
            subscriber_id,
            subscriber_kind,
            handler,
        });
    }

    /// Remove a subscriber. Returns whether it was registered.
    pub fn unsubscribe(&self, subscriber_kind: EntityKind, subscriber_id: &str) -> bool {
        let mut subs = self.subscriptions.lock();
        let before = subs.len();
        subs.retain(|s| !(s.subscriber_kind == subscriber_kind && s.subscriber_id == subscriber_id));
        let removed = subs.len() != before;
        if removed {
            tracing::debug!(subscriber = %subscriber_id, kind = %subscriber_kind, "unsubscribed");
        }
        removed
    }

    /// Number of registered subscribers, including torn-down ones not yet pruned.
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Broadcast that `changed_fields` of an entity changed.
    pub fn publish(
        &self,
        publisher_kind: EntityKind,
        publisher_id: &str,
        payload: Node,
        changed_fields: &[FieldId],
    ) -> PublishReport {
        let mut report = PublishReport::default();
        let declared: Vec<FieldId> = changed_fields
            .iter()
            .copied()
            .filter(|f| {
                let ok = self.registry.does_publish(publisher_kind, f);
                if !ok {
                    tracing::debug!(kind = %publisher_kind, field = f, "field not published by manifest; dropped");
                }
                ok
            })
            .collect();
        report.undeclared_fields = changed_fields.len() - declared.len();
        if declared.is_empty() {
            return report;
        }

        let targets: Vec<(EntityId, Weak<dyn UpdateHandler>, Vec<FieldId>)> = {
            let mut subs = self.subscriptions.lock();
            subs.retain(|s| s.handler.strong_count() > 0);
            subs.iter()
                .filter_map(|s| {
                    let wanted = self.registry.subscribed_fields(s.subscriber_kind, publisher_kind);
                    let relevant: Vec<FieldId> = declared
                        .iter()
                        .copied()
                        .filter(|f| wanted.contains(f))
                        .collect();
                    (!relevant.is_empty()).then(|| (s.subscriber_id.clone(), s.handler.clone(), relevant))
                })
                .collect()
        };

        let event_id = Uuid::new_v4();
        let payload = Arc::new(payload);
        let timestamp_ms = now_ms();
        for (subscriber_id, handler, relevant_field_ids) in targets {
            let Some(handler) = handler.upgrade() else {
                tracing::debug!(subscriber = %subscriber_id, "subscriber torn down before delivery");
                report.skipped += 1;
                continue;
            };
            let event = UpdateEvent {
                event_id,
                publisher_kind,
                publisher_id: publisher_id.to_string(),
                relevant_field_ids,
                payload: Arc::clone(&payload),
                timestamp_ms,
            };
            handler.on_update(&event);
            report.delivered += 1;
        }

        tracing::debug!(
            kind = %publisher_kind,
            publisher = %publisher_id,
            fields = ?declared,
            delivered = report.delivered,
            "update published"
        );
        report
    }
}
