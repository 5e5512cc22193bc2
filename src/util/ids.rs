//! Shared identifiers: entity kinds, entity ids and the field-id vocabulary.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a persisted entity (team member, team or work item).
pub type EntityId = String;

/// Identifier of a publishable field, as declared in entity manifests.
pub type FieldId = &'static str;

/// Kind of entity placed on the planning canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// An individual contributor with a weekly schedule.
    TeamMember,
    /// A group of members with per-member allocation percentages.
    Team,
    /// A feature work item.
    Feature,
    /// An option (alternative plan) work item.
    Option,
    /// A provider (external vendor) work item.
    Provider,
}

impl EntityKind {
    /// Every entity kind, in manifest declaration order.
    pub const ALL: [Self; 5] = [
        Self::TeamMember,
        Self::Team,
        Self::Feature,
        Self::Option,
        Self::Provider,
    ];

    /// Stable label used in logs and store node types.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TeamMember => "team_member",
            Self::Team => "team",
            Self::Feature => "feature",
            Self::Option => "option",
            Self::Provider => "provider",
        }
    }

    /// Whether this kind carries a timeframe and team allocations.
    pub const fn is_work_item(self) -> bool {
        matches!(self, Self::Feature | Self::Option | Self::Provider)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entity addressed by kind and id.
///
/// Ids are only unique within a kind, so guard state, subscriptions and
/// pending writes are all keyed by both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    /// Entity kind.
    pub kind: EntityKind,
    /// Entity id.
    pub id: EntityId,
}

impl EntityKey {
    /// Key for an entity.
    pub fn new(kind: EntityKind, id: impl Into<EntityId>) -> Self {
        Self { kind, id: id.into() }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Field ids shared by manifests, store nodes and update events.
pub mod fields {
    use super::FieldId;

    /// Display title of any entity.
    pub const TITLE: FieldId = "title";
    /// Free-text description.
    pub const DESCRIPTION: FieldId = "description";
    /// Member roles.
    pub const ROLES: FieldId = "roles";
    /// Member working hours per day.
    pub const HOURS_PER_DAY: FieldId = "hoursPerDay";
    /// Member working days per week.
    pub const DAYS_PER_WEEK: FieldId = "daysPerWeek";
    /// Member weekly capacity (explicit or derived).
    pub const WEEKLY_CAPACITY: FieldId = "weeklyCapacity";
    /// Member fallback team-allocation percentage.
    pub const TEAM_ALLOCATION_PERCENT: FieldId = "teamAllocationPercent";
    /// Derived member capacity after the team-allocation percentage.
    pub const EFFECTIVE_CAPACITY: FieldId = "effectiveCapacity";
    /// Team roster.
    pub const ROSTER: FieldId = "roster";
    /// Work item team allocations.
    pub const TEAM_ALLOCATIONS: FieldId = "teamAllocations";
    /// Work item start/end dates.
    pub const TIMEFRAME: FieldId = "timeframe";
    /// Work item goals.
    pub const GOALS: FieldId = "goals";
    /// Work item risks.
    pub const RISKS: FieldId = "risks";
    /// Provider cost lines.
    pub const COSTS: FieldId = "costs";
}
