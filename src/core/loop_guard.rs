//! Loop guard: suppresses self-echoes and bursts of updates.
//!
//! This is a heuristic (updating flag plus a settle window), not a causal
//! clock. A legitimate update that lands inside the window is dropped and
//! picked up by the next unrelated update or a manual refresh.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::util::EntityKey;

/// Why an inbound update was accepted or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardVerdict {
    /// Process the update.
    Accept,
    /// The subscriber is mid-write; the update is presumed to be its own echo.
    RejectEcho,
    /// An update from the same publisher was accepted within the settle window.
    RejectTooRecent,
}

impl GuardVerdict {
    /// Whether the update should be processed.
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// Per-subscriber bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct SubscriberState {
    /// Number of open local-update scopes; non-zero while a write is in flight.
    pub updating_depth: usize,
    /// Last accepted update time per publisher, in ms.
    pub last_accepted: HashMap<EntityKey, u128>,
}

impl SubscriberState {
    /// Whether any local write is in flight.
    pub const fn is_updating(&self) -> bool {
        self.updating_depth > 0
    }
}

/// Shared loop guard; clones observe the same state.
#[derive(Debug, Clone)]
pub struct LoopGuard {
    window_ms: u64,
    states: Arc<Mutex<HashMap<EntityKey, SubscriberState>>>,
}

impl LoopGuard {
    /// Guard with a settle window of `window_ms`.
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Settle window in milliseconds.
    pub const fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Whether an update from `publisher` was accepted less than the window ago.
    pub fn is_update_too_recent(&self, subscriber: &EntityKey, publisher: &EntityKey, now_ms: u128) -> bool {
        self.states
            .lock()
            .get(subscriber)
            .and_then(|s| s.last_accepted.get(publisher))
            .is_some_and(|last| now_ms.saturating_sub(*last) < u128::from(self.window_ms))
    }

    /// Whether `subscriber` has a local write in flight.
    pub fn is_updating(&self, subscriber: &EntityKey) -> bool {
        self.states.lock().get(subscriber).is_some_and(SubscriberState::is_updating)
    }

    /// Mark the start of a locally initiated write. Calls nest.
    pub fn begin_local_update(&self, subscriber: &EntityKey) {
        self.states
            .lock()
            .entry(subscriber.clone())
            .or_default()
            .updating_depth += 1;
    }

    /// Mark the end of one locally initiated write.
    ///
    /// The subscriber stops counting as updating once every begun write has ended.
    pub fn end_local_update(&self, subscriber: &EntityKey) {
        if let Some(state) = self.states.lock().get_mut(subscriber) {
            state.updating_depth = state.updating_depth.saturating_sub(1);
        }
    }

    /// Hold the updating flag until the returned scope is dropped.
    pub fn local_update(&self, subscriber: &EntityKey) -> LocalUpdateScope {
        self.begin_local_update(subscriber);
        LocalUpdateScope {
            guard: self.clone(),
            subscriber: subscriber.clone(),
        }
    }

    /// Decide whether `subscriber` should process an update from `publisher`.
    ///
    /// An accepted update stamps `now_ms` as the last accepted time.
    pub fn evaluate(&self, subscriber: &EntityKey, publisher: &EntityKey, now_ms: u128) -> GuardVerdict {
        let mut states = self.states.lock();
        let state = states.entry(subscriber.clone()).or_default();
        if state.is_updating() {
            tracing::debug!(subscriber = %subscriber, publisher = %publisher, "update rejected: subscriber is writing");
            return GuardVerdict::RejectEcho;
        }
        if let Some(last) = state.last_accepted.get(publisher) {
            if now_ms.saturating_sub(*last) < u128::from(self.window_ms) {
                tracing::debug!(subscriber = %subscriber, publisher = %publisher, "update rejected: inside settle window");
                return GuardVerdict::RejectTooRecent;
            }
        }
        state.last_accepted.insert(publisher.clone(), now_ms);
        GuardVerdict::Accept
    }

    /// Snapshot of one subscriber's state.
    pub fn state(&self, subscriber: &EntityKey) -> Option<SubscriberState> {
        self.states.lock().get(subscriber).cloned()
    }

    /// Drop all bookkeeping for a torn-down subscriber.
    pub fn forget(&self, subscriber: &EntityKey) {
        self.states.lock().remove(subscriber);
    }
}

/// Ends one local update on drop.
#[must_use = "the local update ends when the scope is dropped"]
pub struct LocalUpdateScope {
    guard: LoopGuard,
    subscriber: EntityKey,
}

impl Drop for LocalUpdateScope {
    fn drop(&mut self) {
        self.guard.end_local_update(&self.subscriber);
    }
}
