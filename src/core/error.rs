//! Error types for engine operations.

use thiserror::Error;

use crate::util::{EntityId, EntityKind};

/// Errors produced by engine components.
///
/// None of these are fatal: every variant leaves local state usable, at worst
/// stale until the next successful write or refresh.
#[derive(Debug, Error)]
pub enum PlanningError {
    /// Backing store read or write failed.
    #[error("store error: {0}")]
    Store(String),
    /// Entity is blacklisted; no read or write is attempted.
    #[error("entity {kind}/{id} is blacklisted")]
    Blacklisted {
        /// Kind of the blacklisted entity.
        kind: EntityKind,
        /// Identifier of the blacklisted entity.
        id: EntityId,
    },
    /// Entity is not known locally or in the store.
    #[error("entity {kind}/{id} not found")]
    NotFound {
        /// Kind of the missing entity.
        kind: EntityKind,
        /// Identifier of the missing entity.
        id: EntityId,
    },
    /// Engine configuration failed validation.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
