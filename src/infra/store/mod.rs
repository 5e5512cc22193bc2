//! Graph store boundary.
//!
//! The engine never talks to the graph database directly; it goes through
//! [`GraphStore`], which the collaboration layer implements. The in-memory
//! implementation doubles as the test fake.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::PlanningError;
use crate::util::{EntityId, EntityKind};

pub use memory::{InMemoryGraphStore, WriteRecord};

/// Stored representation of an entity: a flat JSON object.
pub type Node = serde_json::Map<String, serde_json::Value>;

/// Relationship between two entities (e.g. team membership).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Edge identifier.
    pub id: String,
    /// Source entity.
    pub source: EntityId,
    /// Target entity.
    pub target: EntityId,
    /// Relationship label, e.g. `member_of`.
    pub label: String,
}

impl Edge {
    /// Edge with an id derived from its endpoints and label.
    pub fn between(source: impl Into<EntityId>, target: impl Into<EntityId>, label: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        let label = label.into();
        Self {
            id: format!("{source}-{label}-{target}"),
            source,
            target,
            label,
        }
    }
}

/// Persistence contract consumed by the engine.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Fetch a node, or `None` if it does not exist.
    async fn get_node(&self, kind: EntityKind, id: &str) -> Result<Option<Node>, PlanningError>;

    /// Merge `partial` into the node (unspecified fields are preserved) and return the result.
    async fn update_node(&self, kind: EntityKind, id: &str, partial: Node) -> Result<Node, PlanningError>;

    /// Delete a node.
    async fn delete_node(&self, kind: EntityKind, id: &str) -> Result<(), PlanningError>;

    /// Create an edge.
    async fn create_edge(&self, kind: EntityKind, edge: Edge) -> Result<Edge, PlanningError>;

    /// Delete an edge by id.
    async fn delete_edge(&self, kind: EntityKind, edge_id: &str) -> Result<(), PlanningError>;

    /// Whether the entity is known to be broken; no I/O should be attempted for it.
    fn is_blacklisted(&self, id: &str) -> bool;
}
