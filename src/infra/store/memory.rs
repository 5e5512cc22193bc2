//! In-memory graph store for development and testing.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Edge, GraphStore, Node};
use crate::core::PlanningError;
use crate::util::clock::now_ms;
use crate::util::{EntityId, EntityKind};

/// A write observed by the in-memory store.
#[derive(Debug, Clone)]
pub struct WriteRecord {
    /// Kind of the written entity.
    pub kind: EntityKind,
    /// Identifier of the written entity.
    pub id: EntityId,
    /// Partial fields supplied by the caller.
    pub fields: Node,
    /// Whether the write was applied (false when a failure was injected).
    pub succeeded: bool,
    /// Timestamp milliseconds.
    pub at_ms: u128,
}

#[derive(Default)]
struct StoreState {
    nodes: HashMap<(EntityKind, EntityId), Node>,
    edges: HashMap<String, (EntityKind, Edge)>,
    blacklist: HashSet<EntityId>,
    failing_ids: HashSet<EntityId>,
    fail_next: usize,
    writes: Vec<WriteRecord>,
}

impl StoreState {
    fn should_fail(&mut self, id: &str) -> bool {
        if self.failing_ids.contains(id) {
            return true;
        }
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return true;
        }
        false
    }
}

/// Merge-semantics node store with failure injection, a blacklist and a write log.
#[derive(Default)]
pub struct InMemoryGraphStore {
    state: Mutex<StoreState>,
}

impl InMemoryGraphStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a node without recording a write.
    pub fn insert_node(&self, kind: EntityKind, id: impl Into<EntityId>, node: Node) {
        let id = id.into();
        let mut node = node;
        node.insert("id".into(), id.clone().into());
        self.state.lock().nodes.insert((kind, id), node);
    }

    /// Snapshot of a stored node.
    pub fn node(&self, kind: EntityKind, id: &str) -> Option<Node> {
        self.state.lock().nodes.get(&(kind, id.to_string())).cloned()
    }

    /// Mark an entity as known-broken.
    pub fn blacklist(&self, id: impl Into<EntityId>) {
        self.state.lock().blacklist.insert(id.into());
    }

    /// Fail the next `count` write operations regardless of target.
    pub fn fail_next_writes(&self, count: usize) {
        self.state.lock().fail_next = count;
    }

    /// Fail every operation targeting `id` until [`Self::recover`] is called.
    pub fn fail_always_for(&self, id: impl Into<EntityId>) {
        self.state.lock().failing_ids.insert(id.into());
    }

    /// Clear injected failures for `id`.
    pub fn recover(&self, id: &str) {
        self.state.lock().failing_ids.remove(id);
    }

    /// All write attempts, in order.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state.lock().writes.clone()
    }

    /// Number of write attempts targeting `id`.
    pub fn write_count_for(&self, id: &str) -> usize {
        self.state.lock().writes.iter().filter(|w| w.id == id).count()
    }

    /// Stored edges.
    pub fn edges(&self) -> Vec<Edge> {
        self.state.lock().edges.values().map(|(_, e)| e.clone()).collect()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn get_node(&self, kind: EntityKind, id: &str) -> Result<Option<Node>, PlanningError> {
        let state = self.state.lock();
        if state.failing_ids.contains(id) {
            return Err(PlanningError::Store(format!("read of {kind}/{id} failed")));
        }
        Ok(state.nodes.get(&(kind, id.to_string())).cloned())
    }

    async fn update_node(&self, kind: EntityKind, id: &str, partial: Node) -> Result<Node, PlanningError> {
        let mut state = self.state.lock();
        let failed = state.should_fail(id);
        state.writes.push(WriteRecord {
            kind,
            id: id.to_string(),
            fields: partial.clone(),
            succeeded: !failed,
            at_ms: now_ms(),
        });
        if failed {
            return Err(PlanningError::Store(format!("write to {kind}/{id} failed")));
        }
        let node = state.nodes.entry((kind, id.to_string())).or_default();
        node.insert("id".into(), id.into());
        node.extend(partial);
        Ok(node.clone())
    }

    async fn delete_node(&self, kind: EntityKind, id: &str) -> Result<(), PlanningError> {
        let mut state = self.state.lock();
        if state.should_fail(id) {
            return Err(PlanningError::Store(format!("delete of {kind}/{id} failed")));
        }
        state.nodes.remove(&(kind, id.to_string()));
        state
            .edges
            .retain(|_, (_, edge)| edge.source != id && edge.target != id);
        Ok(())
    }

    async fn create_edge(&self, kind: EntityKind, edge: Edge) -> Result<Edge, PlanningError> {
        let mut state = self.state.lock();
        if state.should_fail(&edge.source) {
            return Err(PlanningError::Store(format!("edge {} failed", edge.id)));
        }
        state.edges.insert(edge.id.clone(), (kind, edge.clone()));
        Ok(edge)
    }

    async fn delete_edge(&self, _kind: EntityKind, edge_id: &str) -> Result<(), PlanningError> {
        let mut state = self.state.lock();
        if state.should_fail(edge_id) {
            return Err(PlanningError::Store(format!("edge {edge_id} delete failed")));
        }
        state.edges.remove(edge_id);
        Ok(())
    }

    fn is_blacklisted(&self, id: &str) -> bool {
        self.state.lock().blacklist.contains(id)
    }
}
