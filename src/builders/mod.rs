//! Builders to construct sessions from configuration.

pub mod session_builder;

pub use session_builder::{build_in_memory_session, build_session, InMemorySession};
