//! Entity manifests: which fields each entity kind publishes, and which
//! (kind, field) pairs it subscribes to.
//!
//! Manifests are total. A field left out of `publishes` is never broadcast,
//! and a subscription naming an undeclared field simply never fires.

use serde::Serialize;

use crate::util::{fields, EntityKind, FieldId};

/// A publishable field of an entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    /// Field id used in update events.
    pub id: FieldId,
    /// Human-readable name.
    pub name: &'static str,
    /// Path of the value inside the entity payload.
    pub path: &'static str,
    /// Whether subscribers must react to changes (e.g. capacity, roster).
    pub critical: bool,
}

const fn field(id: FieldId, name: &'static str, path: &'static str, critical: bool) -> FieldDescriptor {
    FieldDescriptor { id, name, path, critical }
}

/// Publish/subscribe declaration for one entity kind.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EntityManifest {
    /// Entity kind this manifest describes.
    pub kind: EntityKind,
    /// Fields this kind broadcasts.
    pub publishes: &'static [FieldDescriptor],
    /// Fields of other kinds this kind listens to.
    pub subscribes: &'static [(EntityKind, &'static [FieldId])],
}

impl EntityManifest {
    /// Descriptor of a published field.
    pub fn published(&self, field_id: &str) -> Option<&'static FieldDescriptor> {
        self.publishes.iter().find(|f| f.id == field_id)
    }

    /// Fields subscribed to on `publisher`.
    pub fn fields_of(&self, publisher: EntityKind) -> &'static [FieldId] {
        self.subscribes
            .iter()
            .find(|(kind, _)| *kind == publisher)
            .map(|(_, ids)| *ids)
            .unwrap_or_default()
    }
}

const TITLE: FieldDescriptor = field(fields::TITLE, "Title", "title", false);
const DESCRIPTION: FieldDescriptor = field(fields::DESCRIPTION, "Description", "description", false);
const TIMEFRAME: FieldDescriptor = field(fields::TIMEFRAME, "Timeframe", "startDate,endDate", true);
const TEAM_ALLOCATIONS: FieldDescriptor =
    field(fields::TEAM_ALLOCATIONS, "Team allocations", "teamAllocations", true);
const GOALS: FieldDescriptor = field(fields::GOALS, "Goals", "goals", false);
const RISKS: FieldDescriptor = field(fields::RISKS, "Risks", "risks", false);

const MEMBER_FIELDS: &[FieldId] = &[
    fields::TITLE,
    fields::HOURS_PER_DAY,
    fields::DAYS_PER_WEEK,
    fields::WEEKLY_CAPACITY,
    fields::EFFECTIVE_CAPACITY,
];
const TEAM_FIELDS: &[FieldId] = &[fields::TITLE, fields::ROSTER];
const WORK_ITEM_FIELDS: &[FieldId] = &[fields::TITLE, fields::TEAM_ALLOCATIONS, fields::TIMEFRAME];
const MEMBER_CAPACITY_FIELDS: &[FieldId] =
    &[fields::TITLE, fields::WEEKLY_CAPACITY, fields::EFFECTIVE_CAPACITY];
const WORK_ITEM_SUBSCRIPTIONS: &[(EntityKind, &[FieldId])] = &[
    (EntityKind::Team, TEAM_FIELDS),
    (EntityKind::TeamMember, MEMBER_CAPACITY_FIELDS),
];

static BUILTIN: [EntityManifest; 5] = [
    EntityManifest {
        kind: EntityKind::TeamMember,
        publishes: &[
            TITLE,
            field(fields::ROLES, "Roles", "roles", false),
            field(fields::HOURS_PER_DAY, "Hours per day", "hoursPerDay", true),
            field(fields::DAYS_PER_WEEK, "Days per week", "daysPerWeek", true),
            field(fields::WEEKLY_CAPACITY, "Weekly capacity", "weeklyCapacity", true),
            field(fields::EFFECTIVE_CAPACITY, "Effective capacity", "effectiveCapacity", true),
        ],
        subscribes: &[
            (EntityKind::Team, TEAM_FIELDS),
            (EntityKind::Feature, WORK_ITEM_FIELDS),
            (EntityKind::Option, WORK_ITEM_FIELDS),
            (EntityKind::Provider, WORK_ITEM_FIELDS),
        ],
    },
    EntityManifest {
        kind: EntityKind::Team,
        publishes: &[
            TITLE,
            DESCRIPTION,
            field(fields::ROSTER, "Roster", "roster", true),
        ],
        subscribes: &[(EntityKind::TeamMember, MEMBER_FIELDS)],
    },
    EntityManifest {
        kind: EntityKind::Feature,
        publishes: &[TITLE, DESCRIPTION, TIMEFRAME, TEAM_ALLOCATIONS, GOALS, RISKS],
        subscribes: WORK_ITEM_SUBSCRIPTIONS,
    },
    EntityManifest {
        kind: EntityKind::Option,
        publishes: &[TITLE, DESCRIPTION, TIMEFRAME, TEAM_ALLOCATIONS, RISKS],
        subscribes: WORK_ITEM_SUBSCRIPTIONS,
    },
    EntityManifest {
        kind: EntityKind::Provider,
        publishes: &[
            TITLE,
            DESCRIPTION,
            TIMEFRAME,
            TEAM_ALLOCATIONS,
            field(fields::COSTS, "Costs", "costs", false),
        ],
        subscribes: WORK_ITEM_SUBSCRIPTIONS,
    },
];

/// Lookup over a fixed set of manifests.
#[derive(Debug, Clone, Copy)]
pub struct ManifestRegistry {
    manifests: &'static [EntityManifest],
}

impl Default for ManifestRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ManifestRegistry {
    /// Manifests for members, teams and the three work item kinds.
    pub fn builtin() -> Self {
        Self { manifests: &BUILTIN }
    }

    /// Registry over custom manifests.
    pub const fn new(manifests: &'static [EntityManifest]) -> Self {
        Self { manifests }
    }

    /// Manifest for `kind`, if declared.
    pub fn manifest(&self, kind: EntityKind) -> Option<&'static EntityManifest> {
        self.manifests.iter().find(|m| m.kind == kind)
    }

    /// Whether `kind` broadcasts `field_id`.
    pub fn does_publish(&self, kind: EntityKind, field_id: &str) -> bool {
        self.manifest(kind).and_then(|m| m.published(field_id)).is_some()
    }

    /// Whether `subscriber` listens to any field of `publisher`.
    pub fn does_subscribe_to(&self, subscriber: EntityKind, publisher: EntityKind) -> bool {
        !self.subscribed_fields(subscriber, publisher).is_empty()
    }

    /// Fields of `publisher` that `subscriber` listens to.
    pub fn subscribed_fields(&self, subscriber: EntityKind, publisher: EntityKind) -> &'static [FieldId] {
        self.manifest(subscriber)
            .map(|m| m.fields_of(publisher))
            .unwrap_or_default()
    }

    /// Whether `field_id` is a critical field of `kind`.
    pub fn is_critical(&self, kind: EntityKind, field_id: &str) -> bool {
        self.manifest(kind)
            .and_then(|m| m.published(field_id))
            .is_some_and(|f| f.critical)
    }

    /// Kinds that receive `field_id` when `publisher` broadcasts it.
    ///
    /// Empty when the publisher does not declare the field.
    pub fn subscribers_for(&self, publisher: EntityKind, field_id: &str) -> Vec<EntityKind> {
        if !self.does_publish(publisher, field_id) {
            return Vec::new();
        }
        self.manifests
            .iter()
            .filter(|m| m.fields_of(publisher).iter().any(|f| *f == field_id))
            .map(|m| m.kind)
            .collect()
    }

    /// Subscriptions naming a field the publisher never declares.
    ///
    /// These never fire; a non-empty result is a configuration mistake.
    pub fn dangling_subscriptions(&self) -> Vec<(EntityKind, EntityKind, FieldId)> {
        let mut dangling = Vec::new();
        for manifest in self.manifests {
            for (publisher, ids) in manifest.subscribes {
                for id in *ids {
                    if !self.does_publish(*publisher, id) {
                        dangling.push((manifest.kind, *publisher, *id));
                    }
                }
            }
        }
        dangling
    }
}
