//! # Planning Engine
//!
//! Resource allocation and cross-entity synchronization for a collaborative
//! planning workspace.
//!
//! Team members, teams and work items (features, options, providers) live in
//! a shared graph store. This crate keeps a local view of them consistent
//! while users edit concurrently, and answers one question quickly: is this
//! person over-committed in this time window?
//!
//! ## Key Features
//!
//! - **Capacity math**: weekly capacity, allocation percentages and capacity
//!   over arbitrary date windows, projected through working days.
//! - **Week buckets**: ISO calendar weeks, inclusive/exclusive overlap and
//!   per-week load sums.
//! - **Over-allocation verdict**: window totals plus per-week overload, as an
//!   advisory signal that never blocks an edit.
//! - **Manifest-scoped bus**: entities declare which fields they publish and
//!   which fields of other kinds they consume; events are narrowed per
//!   subscriber.
//! - **Loop guard**: self-echo and settle-window suppression so cascades
//!   between entities terminate.
//! - **Debounced writes**: one store write per entity per burst of edits,
//!   with commit-now, cancel, flush and a redundant write for unreliable kinds.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use planning_engine::builders::build_in_memory_session;
//! use planning_engine::config::EngineConfig;
//! use planning_engine::runtime::TokioSpawner;
//! use planning_engine::util::EntityKind;
//!
//! let spawner = TokioSpawner::current().expect("inside a tokio runtime");
//! let built = build_in_memory_session(&EngineConfig::default(), spawner)?;
//! let session = built.session;
//!
//! session.load(EntityKind::Team, "team-1").await?;
//! session.set_team_allocation("team-1", "member-1", 50.0)?;
//! let verdict = session.member_availability("member-1", window, 0.0);
//! if verdict.is_over_allocated {
//!     println!("over by {:.1}h", verdict.over_allocated_by);
//! }
//! session.flush_all().await;
//! ```
//!
//! For complete flows, see:
//! - `tests/allocation_test.rs` - availability across overlapping work items
//! - `tests/sync_engine_test.rs` - publish, guard and debounce behavior end to end

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Allocation math, entity synchronization and the planning session.
pub mod core;
/// Engine configuration.
pub mod config;
/// Builders to construct sessions from configuration.
pub mod builders;
/// Graph store boundary and field codecs.
pub mod infra;
/// Runtime adapters.
pub mod runtime;
/// Shared utilities.
pub mod util;
