//! Debounced persistence gateway.
//!
//! Turns bursts of local edits into one store write per entity, publishes
//! the changed fields once the write lands, and reports failures as
//! notifications. Local state is never rolled back here.

use std::sync::Arc;
use std::time::Duration;

use super::bus::UpdateBus;
use super::debounce::{DebounceScheduler, Spawn};
use super::error::PlanningError;
use super::loop_guard::LoopGuard;
use super::notify::{build_notification, NotificationLevel, NotificationSink};
use crate::infra::store::{Edge, GraphStore, Node};
use crate::util::{EntityKey, EntityKind, FieldId};

/// Identity of a debounced write: one pending write per entity.
pub type WriteKey = EntityKey;

/// Fields to write and the field ids to publish once written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingWrite {
    /// Partial node (merge semantics).
    pub fields: Node,
    /// Field ids to broadcast after a successful write.
    pub changed_fields: Vec<FieldId>,
}

impl PendingWrite {
    /// Write of `fields`, announcing `changed_fields`.
    pub fn new(fields: Node, changed_fields: &[FieldId]) -> Self {
        Self {
            fields,
            changed_fields: changed_fields.to_vec(),
        }
    }

    /// Fold a superseded write into this one.
    ///
    /// Keys set by both take this write's value; keys only the superseded
    /// write set are kept, along with its changed field ids.
    fn absorb(&mut self, superseded: Self) {
        let mut fields = superseded.fields;
        fields.extend(std::mem::take(&mut self.fields));
        self.fields = fields;
        for field in superseded.changed_fields {
            if !self.changed_fields.contains(&field) {
                self.changed_fields.push(field);
            }
        }
    }
}

/// Gateway timing knobs.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Kinds whose writes get a second, unconditional write.
    pub redundant_write_kinds: Vec<EntityKind>,
    /// Delay between the debounced write and the redundant one.
    pub redundant_write_delay: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            redundant_write_kinds: vec![EntityKind::Provider],
            redundant_write_delay: Duration::from_millis(50),
        }
    }
}

struct GatewayInner {
    store: Arc<dyn GraphStore>,
    bus: UpdateBus,
    guard: LoopGuard,
    notifications: Arc<dyn NotificationSink>,
    settings: GatewaySettings,
}

/// Debounced write path to the graph store.
pub struct PersistenceGateway<S> {
    inner: Arc<GatewayInner>,
    debounce: DebounceScheduler<WriteKey, PendingWrite, S>,
    spawner: S,
}

impl<S: Clone> Clone for PersistenceGateway<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            debounce: self.debounce.clone(),
            spawner: self.spawner.clone(),
        }
    }
}

impl<S> PersistenceGateway<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Create a gateway from components.
    pub fn new(
        store: Arc<dyn GraphStore>,
        bus: UpdateBus,
        guard: LoopGuard,
        notifications: Arc<dyn NotificationSink>,
        settings: GatewaySettings,
        spawner: S,
    ) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                store,
                bus,
                guard,
                notifications,
                settings,
            }),
            debounce: DebounceScheduler::new(spawner.clone()),
            spawner,
        }
    }

    /// Schedule `write` for `key` after `delay`, replacing any pending write.
    ///
    /// The pending write's fields are merged under the new ones, so an
    /// earlier edit to a different field is still written and announced.
    pub fn schedule(&self, key: WriteKey, write: PendingWrite, delay: Duration) {
        let mut write = write;
        if let Some(superseded) = self.debounce.take(&key) {
            write.absorb(superseded);
            tracing::debug!(key = %key, "pending write superseded");
        }
        let gateway = self.clone();
        self.debounce.schedule(key, write, delay, move |key, write| async move {
            // Failures are already surfaced as notifications.
            let _ = gateway.perform(key, write).await;
        });
    }

    /// Perform the pending write for `key` now.
    ///
    /// Returns `Ok(None)` when nothing was pending.
    pub async fn commit_now(&self, key: &WriteKey) -> Result<Option<Node>, PlanningError> {
        match self.debounce.take(key) {
            Some(write) => self.perform(key.clone(), write).await.map(Some),
            None => Ok(None),
        }
    }

    /// Perform every pending write now, e.g. on teardown.
    pub async fn flush_all(&self) -> Vec<(WriteKey, Result<Node, PlanningError>)> {
        let mut results = Vec::new();
        for (key, write) in self.debounce.drain() {
            let result = self.perform(key.clone(), write).await;
            results.push((key, result));
        }
        results
    }

    /// Drop the pending write for `key`. Returns whether one existed.
    pub fn cancel(&self, key: &WriteKey) -> bool {
        let cancelled = self.debounce.cancel(key);
        if cancelled {
            tracing::debug!(key = %key, "pending write cancelled");
        }
        cancelled
    }

    /// Whether a write is pending for `key`.
    pub fn is_pending(&self, key: &WriteKey) -> bool {
        self.debounce.is_pending(key)
    }

    /// Number of pending writes.
    pub fn pending_len(&self) -> usize {
        self.debounce.pending_len()
    }

    /// Re-read an entity from the store.
    pub async fn refresh(&self, kind: EntityKind, id: &str) -> Result<Option<Node>, PlanningError> {
        self.ensure_not_blacklisted(kind, id)?;
        self.inner.store.get_node(kind, id).await.map_err(|e| {
            tracing::warn!(kind = %kind, id, error = %e, "refresh failed");
            e
        })
    }

    /// Delete an entity, dropping any pending write for it first.
    pub async fn delete(&self, kind: EntityKind, id: &str) -> Result<(), PlanningError> {
        self.cancel(&WriteKey::new(kind, id));
        self.ensure_not_blacklisted(kind, id)?;
        self.inner.store.delete_node(kind, id).await.inspect_err(|e| {
            self.notify_failure(kind, id, &format!("Could not delete {kind}: {e}"));
        })
    }

    /// Create an edge whose source is an entity of `kind`.
    pub async fn create_edge(&self, kind: EntityKind, edge: Edge) -> Result<Edge, PlanningError> {
        self.ensure_not_blacklisted(kind, &edge.source)?;
        let source = edge.source.clone();
        self.inner.store.create_edge(kind, edge).await.inspect_err(|e| {
            self.notify_failure(kind, &source, &format!("Could not link {kind}: {e}"));
        })
    }

    /// Delete an edge whose source is `source_id`.
    pub async fn delete_edge(&self, kind: EntityKind, source_id: &str, edge_id: &str) -> Result<(), PlanningError> {
        self.ensure_not_blacklisted(kind, source_id)?;
        self.inner.store.delete_edge(kind, edge_id).await.inspect_err(|e| {
            self.notify_failure(kind, source_id, &format!("Could not unlink {kind}: {e}"));
        })
    }

    fn ensure_not_blacklisted(&self, kind: EntityKind, id: &str) -> Result<(), PlanningError> {
        if !self.inner.store.is_blacklisted(id) {
            return Ok(());
        }
        tracing::warn!(kind = %kind, id, "entity is blacklisted; skipping store access");
        self.inner.notifications.notify(build_notification(
            kind,
            id,
            NotificationLevel::Warning,
            format!("Changes to this {kind} cannot be saved right now"),
        ));
        Err(PlanningError::Blacklisted {
            kind,
            id: id.to_string(),
        })
    }

    fn notify_failure(&self, kind: EntityKind, id: &str, message: &str) {
        tracing::error!(kind = %kind, id, "{message}");
        self.inner
            .notifications
            .notify(build_notification(kind, id, NotificationLevel::Error, message));
    }

    async fn perform(&self, key: WriteKey, write: PendingWrite) -> Result<Node, PlanningError> {
        self.ensure_not_blacklisted(key.kind, &key.id)?;

        let result = {
            let _updating = self.inner.guard.local_update(&key);
            match self
                .inner
                .store
                .update_node(key.kind, &key.id, write.fields.clone())
                .await
            {
                Ok(node) => {
                    tracing::info!(key = %key, fields = ?write.changed_fields, "write committed");
                    self.inner
                        .bus
                        .publish(key.kind, &key.id, node.clone(), &write.changed_fields);
                    Ok(node)
                }
                Err(e) => {
                    self.notify_failure(key.kind, &key.id, &format!("Could not save {}: {e}", key.kind));
                    Err(e)
                }
            }
        };

        if self.inner.settings.redundant_write_kinds.contains(&key.kind) {
            self.schedule_redundant_write(key, write.fields);
        }
        result
    }

    fn schedule_redundant_write(&self, key: WriteKey, fields: Node) {
        let inner = Arc::clone(&self.inner);
        let delay = inner.settings.redundant_write_delay;
        self.spawner.spawn(async move {
            tokio::time::sleep(delay).await;
            if inner.store.is_blacklisted(&key.id) {
                return;
            }
            match inner.store.update_node(key.kind, &key.id, fields).await {
                Ok(_) => tracing::debug!(key = %key, "redundant write committed"),
                Err(e) => tracing::warn!(key = %key, error = %e, "redundant write failed"),
            }
        });
    }
}
