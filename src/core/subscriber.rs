//! Bus subscribers for entities.
//!
//! An [`EntitySubscriber`] asks the loop guard before touching anything.
//! Accepted events are merged into a per-publisher view as partial patches,
//! then the refresh callback runs.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use super::bus::{UpdateEvent, UpdateHandler};
use super::loop_guard::{GuardVerdict, LoopGuard};
use super::model::node_keys;
use crate::infra::store::Node;
use crate::util::clock::now_ms;
use crate::util::{EntityId, EntityKey, EntityKind};

/// Callback run after an accepted event has been applied.
pub type RefreshFn = Arc<dyn Fn(&UpdateEvent) + Send + Sync>;

/// Counters for one subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubscriberStats {
    /// Events applied and refreshed.
    pub accepted: u64,
    /// Events rejected as an echo of the subscriber's own write.
    pub rejected_echo: u64,
    /// Events rejected inside the settle window.
    pub rejected_too_recent: u64,
}

/// One entity listening on the bus.
pub struct EntitySubscriber {
    key: EntityKey,
    guard: LoopGuard,
    refresh: RefreshFn,
    clock: fn() -> u128,
    view: Mutex<HashMap<EntityKey, Node>>,
    stats: Mutex<SubscriberStats>,
}

impl EntitySubscriber {
    /// Subscriber for entity `id` of `kind`.
    pub fn new(id: impl Into<EntityId>, kind: EntityKind, guard: LoopGuard, refresh: RefreshFn) -> Self {
        Self {
            key: EntityKey::new(kind, id),
            guard,
            refresh,
            clock: now_ms,
            view: Mutex::new(HashMap::new()),
            stats: Mutex::new(SubscriberStats::default()),
        }
    }

    /// Replace the millisecond clock used for guard decisions.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> u128) -> Self {
        self.clock = clock;
        self
    }

    /// Subscriber entity id.
    pub fn id(&self) -> &str {
        &self.key.id
    }

    /// Subscriber entity kind.
    pub const fn kind(&self) -> EntityKind {
        self.key.kind
    }

    /// Subscriber entity kind and id.
    pub const fn key(&self) -> &EntityKey {
        &self.key
    }

    /// Counters so far.
    pub fn stats(&self) -> SubscriberStats {
        *self.stats.lock()
    }

    /// Last known fields of a publisher, as patched by accepted events.
    pub fn view_of(&self, publisher_kind: EntityKind, publisher_id: &str) -> Option<Node> {
        self.view
            .lock()
            .get(&EntityKey::new(publisher_kind, publisher_id))
            .cloned()
    }

    fn apply(&self, publisher: EntityKey, event: &UpdateEvent) {
        let mut view = self.view.lock();
        let known = view.entry(publisher).or_default();
        for field in &event.relevant_field_ids {
            for key in node_keys(field) {
                if let Some(value) = event.payload.get(key) {
                    known.insert(key.to_string(), value.clone());
                }
            }
        }
    }
}

impl UpdateHandler for EntitySubscriber {
    fn on_update(&self, event: &UpdateEvent) {
        let publisher = EntityKey::new(event.publisher_kind, event.publisher_id.clone());
        if publisher == self.key {
            self.stats.lock().rejected_echo += 1;
            return;
        }
        let verdict = self.guard.evaluate(&self.key, &publisher, (self.clock)());
        {
            let mut stats = self.stats.lock();
            match verdict {
                GuardVerdict::Accept => stats.accepted += 1,
                GuardVerdict::RejectEcho => stats.rejected_echo += 1,
                GuardVerdict::RejectTooRecent => stats.rejected_too_recent += 1,
            }
        }
        if !verdict.is_accepted() {
            return;
        }
        self.apply(publisher, event);
        tracing::debug!(
            subscriber = %self.key,
            publisher = %event.publisher_id,
            fields = ?event.relevant_field_ids,
            "update applied"
        );
        (self.refresh)(event);
    }
}
