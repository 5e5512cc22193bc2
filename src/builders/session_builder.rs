//! Builders to assemble a planning session from configuration.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::core::{
    InMemoryNotificationSink, LoopGuard, ManifestRegistry, NotificationSink, PlanningError, PlanningSession,
    Spawn, UpdateBus,
};
use crate::infra::{GraphStore, InMemoryGraphStore};

/// Build a session over `store` using the built-in manifests.
pub fn build_session<S>(
    cfg: &EngineConfig,
    store: Arc<dyn GraphStore>,
    notifications: Arc<dyn NotificationSink>,
    spawner: S,
) -> Result<PlanningSession<S>, PlanningError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    cfg.validate()
        .map_err(|e| PlanningError::InvalidConfig(format!("config invalid: {e}")))?;

    let registry = ManifestRegistry::builtin();
    for (subscriber, publisher, field) in registry.dangling_subscriptions() {
        tracing::warn!(%subscriber, %publisher, field, "subscription to a field nobody publishes");
    }

    let bus = UpdateBus::new(registry);
    let guard = LoopGuard::new(cfg.loop_guard_window_ms);
    tracing::info!(
        debounce_ms = cfg.debounce_ms,
        loop_guard_window_ms = cfg.loop_guard_window_ms,
        redundant_write_kinds = ?cfg.redundant_write_kinds,
        "planning session built"
    );
    Ok(PlanningSession::new(
        store,
        bus,
        guard,
        notifications,
        cfg.session_settings(),
        spawner,
    ))
}

/// A session over the in-memory store, with handles to inspect it.
pub struct InMemorySession<S> {
    /// The session.
    pub session: PlanningSession<S>,
    /// The backing store.
    pub store: Arc<InMemoryGraphStore>,
    /// Notifications raised by the session.
    pub notifications: InMemoryNotificationSink,
}

/// Build a session over a fresh [`InMemoryGraphStore`].
pub fn build_in_memory_session<S>(cfg: &EngineConfig, spawner: S) -> Result<InMemorySession<S>, PlanningError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    let store = Arc::new(InMemoryGraphStore::new());
    let notifications = InMemoryNotificationSink::new(cfg.notification_buffer);
    let session = build_session(
        cfg,
        Arc::clone(&store) as Arc<dyn GraphStore>,
        Arc::new(notifications.clone()),
        spawner,
    )?;
    Ok(InMemorySession {
        session,
        store,
        notifications,
    })
}
