//! Allocation math, entity synchronization and the planning session.

pub mod aggregator;
pub mod bus;
pub mod calendar;
pub mod capacity;
pub mod debounce;
pub mod error;
pub mod gateway;
pub mod loop_guard;
pub mod manifest;
pub mod membership;
pub mod model;
pub mod notify;
pub mod session;
pub mod subscriber;

pub use aggregator::{
    aggregate, derive_allocation_records, AllocationRecord, Availability, AvailabilityQuery, WeekOverload,
};
pub use bus::{PublishReport, UpdateBus, UpdateEvent, UpdateHandler};
pub use calendar::{DateWindow, WeekBucket};
pub use debounce::{DebounceScheduler, Spawn};
pub use error::{AppResult, PlanningError};
pub use gateway::{GatewaySettings, PendingWrite, PersistenceGateway, WriteKey};
pub use loop_guard::{GuardVerdict, LoopGuard};
pub use manifest::{EntityManifest, FieldDescriptor, ManifestRegistry};
pub use membership::{AllocationChange, AllocationSource, CapacityResolution};
pub use model::{AllocatedMember, RosterEntry, Team, TeamAllocation, TeamMember, WorkItem};
pub use notify::{
    build_notification, InMemoryNotificationSink, LogNotificationSink, Notification, NotificationLevel,
    NotificationSink,
};
pub use session::{PlanningSession, SessionSettings};
pub use subscriber::{EntitySubscriber, RefreshFn, SubscriberStats};
