//! Planning session: local entity cache plus the edit control flow.
//!
//! Every edit is applied to the cache first and then scheduled as a
//! debounced write. Writes publish on success; failures leave the cache as
//! edited and surface as notifications. Roster and schedule edits also
//! republish the member's derived `effectiveCapacity`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::NaiveDate;
use parking_lot::Mutex;

use super::aggregator::{aggregate, derive_allocation_records, Availability, AvailabilityQuery};
use super::bus::{PublishReport, UpdateBus, UpdateEvent, UpdateHandler};
use super::calendar::DateWindow;
use super::capacity::DEFAULT_DAYS_PER_WEEK;
use super::debounce::Spawn;
use super::error::PlanningError;
use super::gateway::{GatewaySettings, PendingWrite, PersistenceGateway, WriteKey};
use super::loop_guard::LoopGuard;
use super::membership::{
    capacity_payload, remove_from_roster, resolve_effective_capacity, set_allocation_percent,
    AllocationChange, CapacityResolution,
};
use super::model::{node_keys, Team, TeamMember, WorkItem, ROSTER_CODEC, TEAM_ALLOCATIONS_CODEC};
use super::notify::{build_notification, NotificationLevel, NotificationSink};
use super::subscriber::{EntitySubscriber, RefreshFn};
use crate::infra::codec::FieldCodec;
use crate::infra::store::{Edge, GraphStore, Node};
use crate::util::{fields, EntityId, EntityKey, EntityKind};

/// Label of team-to-member edges.
pub const MEMBER_EDGE_LABEL: &str = "has_member";

const MEMBER_SCHEDULE_FIELDS: &[&str] = &[
    fields::HOURS_PER_DAY,
    fields::DAYS_PER_WEEK,
    fields::WEEKLY_CAPACITY,
    fields::EFFECTIVE_CAPACITY,
];

/// Session timing and defaults.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Quiet period before an edit is written.
    pub debounce: Duration,
    /// Weekly capacity assumed for members the session knows nothing about.
    pub default_weekly_capacity: f64,
    /// Gateway knobs.
    pub gateway: GatewaySettings,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            default_weekly_capacity: super::capacity::DEFAULT_WEEKLY_CAPACITY,
            gateway: GatewaySettings::default(),
        }
    }
}

#[derive(Default)]
struct Cache {
    members: HashMap<EntityId, TeamMember>,
    teams: BTreeMap<EntityId, Team>,
    work_items: BTreeMap<EntityId, WorkItem>,
}

impl Cache {
    fn apply_node(&mut self, kind: EntityKind, id: &str, node: &Node) {
        match kind {
            EntityKind::TeamMember => {
                self.members.insert(id.to_string(), TeamMember::from_node(id, node));
            }
            EntityKind::Team => {
                self.teams.insert(id.to_string(), Team::from_node(id, node));
            }
            EntityKind::Feature | EntityKind::Option | EntityKind::Provider => {
                self.work_items
                    .insert(id.to_string(), WorkItem::from_node(kind, id, node));
            }
        }
    }

    /// Capacity of `member_id` on `team_id`, or on the first team listing
    /// the member when no team is given.
    fn capacity_of(&self, member_id: &str, team_id: Option<&str>, default_weekly: f64) -> CapacityResolution {
        let entry = match team_id {
            Some(team_id) => self.teams.get(team_id).and_then(|t| t.roster_entry(member_id)),
            None => self.teams.values().find_map(|t| t.roster_entry(member_id)),
        };
        resolve_effective_capacity(self.members.get(member_id), entry, default_weekly)
    }
}

struct SessionInner {
    bus: UpdateBus,
    guard: LoopGuard,
    notifications: Arc<dyn NotificationSink>,
    settings: SessionSettings,
    cache: Mutex<Cache>,
    subscribers: Mutex<HashMap<EntityKey, Arc<dyn UpdateHandler>>>,
}

/// Orchestrates optimistic edits, debounced writes and derived republishes.
pub struct PlanningSession<S> {
    inner: Arc<SessionInner>,
    gateway: PersistenceGateway<S>,
    spawner: S,
}

impl<S: Clone> Clone for PlanningSession<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            gateway: self.gateway.clone(),
            spawner: self.spawner.clone(),
        }
    }
}

impl<S> PlanningSession<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Assemble a session over `store`.
    pub fn new(
        store: Arc<dyn GraphStore>,
        bus: UpdateBus,
        guard: LoopGuard,
        notifications: Arc<dyn NotificationSink>,
        settings: SessionSettings,
        spawner: S,
    ) -> Self {
        let gateway = PersistenceGateway::new(
            store,
            bus.clone(),
            guard.clone(),
            Arc::clone(&notifications),
            settings.gateway.clone(),
            spawner.clone(),
        );
        Self {
            inner: Arc::new(SessionInner {
                bus,
                guard,
                notifications,
                settings,
                cache: Mutex::new(Cache::default()),
                subscribers: Mutex::new(HashMap::new()),
            }),
            gateway,
            spawner,
        }
    }

    /// Update bus shared by the session's subscribers.
    pub fn bus(&self) -> &UpdateBus {
        &self.inner.bus
    }

    /// Loop guard shared by the session's subscribers.
    pub fn guard(&self) -> &LoopGuard {
        &self.inner.guard
    }

    /// Write path.
    pub const fn gateway(&self) -> &PersistenceGateway<S> {
        &self.gateway
    }

    /// Session settings.
    pub fn settings(&self) -> &SessionSettings {
        &self.inner.settings
    }

    // ----- cache -----

    /// Put a member into the local cache without writing it.
    pub fn upsert_member(&self, member: TeamMember) {
        self.inner.cache.lock().members.insert(member.id.clone(), member);
    }

    /// Put a team into the local cache without writing it.
    pub fn upsert_team(&self, team: Team) {
        self.inner.cache.lock().teams.insert(team.id.clone(), team);
    }

    /// Put a work item into the local cache without writing it.
    pub fn upsert_work_item(&self, item: WorkItem) {
        self.inner.cache.lock().work_items.insert(item.id.clone(), item);
    }

    /// Cached member.
    pub fn member(&self, id: &str) -> Option<TeamMember> {
        self.inner.cache.lock().members.get(id).cloned()
    }

    /// Cached team.
    pub fn team(&self, id: &str) -> Option<Team> {
        self.inner.cache.lock().teams.get(id).cloned()
    }

    /// Cached work item.
    pub fn work_item(&self, id: &str) -> Option<WorkItem> {
        self.inner.cache.lock().work_items.get(id).cloned()
    }

    /// Read an entity from the store into the cache.
    ///
    /// Returns whether the store had it.
    ///
    /// # Errors
    ///
    /// Blacklisted entities and store failures are returned unchanged; the
    /// cache keeps its previous value.
    pub async fn load(&self, kind: EntityKind, id: &str) -> Result<bool, PlanningError> {
        let Some(node) = self.gateway.refresh(kind, id).await? else {
            return Ok(false);
        };
        self.inner.cache.lock().apply_node(kind, id, &node);
        Ok(true)
    }

    // ----- edits -----

    /// Rename any cached entity.
    ///
    /// # Errors
    ///
    /// [`PlanningError::NotFound`] if the entity is not cached.
    pub fn rename(&self, kind: EntityKind, id: &str, title: &str) -> Result<(), PlanningError> {
        {
            let mut cache = self.inner.cache.lock();
            let name = match kind {
                EntityKind::TeamMember => cache.members.get_mut(id).map(|m| &mut m.name),
                EntityKind::Team => cache.teams.get_mut(id).map(|t| &mut t.name),
                _ => cache
                    .work_items
                    .get_mut(id)
                    .filter(|w| w.kind == kind)
                    .map(|w| &mut w.name),
            }
            .ok_or_else(|| not_found(kind, id))?;
            title.clone_into(name);
        }
        let mut node = Node::new();
        node.insert(fields::TITLE.into(), title.into());
        self.schedule(kind, id, node, &[fields::TITLE]);
        Ok(())
    }

    /// Change a member's schedule. The explicit weekly override is replaced
    /// by the derived value.
    ///
    /// # Errors
    ///
    /// [`PlanningError::NotFound`] if the member is not cached.
    pub fn update_member_schedule(
        &self,
        member_id: &str,
        hours_per_day: Option<f64>,
        days_per_week: Option<f64>,
    ) -> Result<CapacityResolution, PlanningError> {
        let (node, resolution) = {
            let mut cache = self.inner.cache.lock();
            let member = cache
                .members
                .get_mut(member_id)
                .ok_or_else(|| not_found(EntityKind::TeamMember, member_id))?;
            if hours_per_day.is_some() {
                member.hours_per_day = hours_per_day;
            }
            if days_per_week.is_some() {
                member.days_per_week = days_per_week;
            }
            member.weekly_capacity = None;
            let mut node = member.to_fields();
            let resolution = cache.capacity_of(member_id, None, self.inner.settings.default_weekly_capacity);
            node.extend(capacity_payload(member_id, &resolution));
            node.remove("id");
            node.remove(fields::TEAM_ALLOCATION_PERCENT);
            (node, resolution)
        };
        tracing::debug!(member = member_id, capacity = resolution.effective_capacity, "member schedule edited");
        self.schedule(EntityKind::TeamMember, member_id, node, MEMBER_SCHEDULE_FIELDS);
        Ok(resolution)
    }

    /// Set `member_id`'s allocation percentage on `team_id`.
    ///
    /// The roster write is debounced; the member's new effective capacity
    /// is republished at once with the team marked as writing, so the team
    /// does not react to its own change.
    ///
    /// # Errors
    ///
    /// [`PlanningError::NotFound`] if the team is not cached.
    pub fn set_team_allocation(
        &self,
        team_id: &str,
        member_id: &str,
        percent: f64,
    ) -> Result<AllocationChange, PlanningError> {
        let (change, node) = {
            let mut cache = self.inner.cache.lock();
            let team = cache
                .teams
                .get_mut(team_id)
                .ok_or_else(|| not_found(EntityKind::Team, team_id))?;
            let change = set_allocation_percent(team, member_id, percent);
            (change, roster_node(team))
        };
        if !change.is_change() {
            return Ok(change);
        }
        self.schedule(EntityKind::Team, team_id, node, &[fields::ROSTER]);
        self.republish_capacity(member_id, team_id);
        Ok(change)
    }

    /// Add a member to a team roster and link them.
    ///
    /// # Errors
    ///
    /// [`PlanningError::NotFound`] if the team is not cached; edge failures
    /// are returned after the local roster has been updated.
    pub async fn add_member_to_team(
        &self,
        team_id: &str,
        member_id: &str,
        percent: f64,
    ) -> Result<AllocationChange, PlanningError> {
        let change = self.set_team_allocation(team_id, member_id, percent)?;
        if change.previous.is_none() {
            self.gateway
                .create_edge(EntityKind::Team, Edge::between(team_id, member_id, MEMBER_EDGE_LABEL))
                .await?;
        }
        Ok(change)
    }

    /// Remove a member from a team roster and unlink them.
    ///
    /// Returns whether the member was on the roster.
    ///
    /// # Errors
    ///
    /// [`PlanningError::NotFound`] if the team is not cached; edge failures
    /// are returned after the local roster has been updated.
    pub async fn remove_member_from_team(&self, team_id: &str, member_id: &str) -> Result<bool, PlanningError> {
        let node = {
            let mut cache = self.inner.cache.lock();
            let team = cache
                .teams
                .get_mut(team_id)
                .ok_or_else(|| not_found(EntityKind::Team, team_id))?;
            if remove_from_roster(team, member_id).is_none() {
                return Ok(false);
            }
            roster_node(team)
        };
        self.schedule(EntityKind::Team, team_id, node, &[fields::ROSTER]);
        self.republish_capacity(member_id, team_id);
        let edge = Edge::between(team_id, member_id, MEMBER_EDGE_LABEL);
        self.gateway
            .delete_edge(EntityKind::Team, team_id, &edge.id)
            .await?;
        Ok(true)
    }

    /// Assign `hours` of `member_id` to a work item under `team_id`.
    ///
    /// Returns the member's availability over the item's timeframe, if it has
    /// one. Over-allocation is advisory: the edit is kept and a warning
    /// notification is raised.
    ///
    /// # Errors
    ///
    /// [`PlanningError::NotFound`] if the work item is not cached.
    pub fn assign_member_hours(
        &self,
        work_item_id: &str,
        team_id: &str,
        member_id: &str,
        hours: f64,
    ) -> Result<Option<Availability>, PlanningError> {
        let (kind, window, node) = {
            let mut cache = self.inner.cache.lock();
            let member_name = cache
                .members
                .get(member_id)
                .map_or_else(|| member_id.to_string(), |m| m.name.clone());
            let item = cache
                .work_items
                .get_mut(work_item_id)
                .ok_or_else(|| not_found(EntityKind::Feature, work_item_id))?;
            let previous = item.set_member_hours(team_id, member_id, &member_name, hours);
            tracing::debug!(work_item = work_item_id, member = member_id, previous, hours, "hours assigned");
            let mut node = Node::new();
            node.insert(
                fields::TEAM_ALLOCATIONS.into(),
                TEAM_ALLOCATIONS_CODEC.encode(&item.team_allocations),
            );
            (item.kind, item.timeframe, node)
        };
        self.schedule(kind, work_item_id, node, &[fields::TEAM_ALLOCATIONS]);

        let Some(window) = window else {
            return Ok(None);
        };
        let availability = self.member_availability(member_id, window, 0.0);
        if availability.is_over_allocated {
            tracing::warn!(
                member = member_id,
                over_by = availability.over_allocated_by,
                weeks = availability.over_allocated_weeks.len(),
                "member over-allocated"
            );
            self.inner.notifications.notify(build_notification(
                EntityKind::TeamMember,
                member_id,
                NotificationLevel::Warning,
                format!(
                    "Over-allocated by {:.1} hours between {} and {}",
                    availability.over_allocated_by, window.start, window.end
                ),
            ));
        }
        Ok(Some(availability))
    }

    /// Move a work item's timeframe.
    ///
    /// # Errors
    ///
    /// [`PlanningError::NotFound`] if the work item is not cached.
    pub fn set_timeframe(&self, work_item_id: &str, start: NaiveDate, end: NaiveDate) -> Result<(), PlanningError> {
        let (kind, node) = {
            let mut cache = self.inner.cache.lock();
            let item = cache
                .work_items
                .get_mut(work_item_id)
                .ok_or_else(|| not_found(EntityKind::Feature, work_item_id))?;
            item.timeframe = Some(DateWindow::new(start, end));
            let all = item.to_fields();
            let node: Node = node_keys(fields::TIMEFRAME)
                .into_iter()
                .filter_map(|k| all.get(k).map(|v| (k.to_string(), v.clone())))
                .collect();
            (item.kind, node)
        };
        self.schedule(kind, work_item_id, node, &[fields::TIMEFRAME]);
        Ok(())
    }

    // ----- derived state -----

    /// Effective capacity of a member, on `team_id` or on their first team.
    pub fn member_capacity(&self, member_id: &str, team_id: Option<&str>) -> CapacityResolution {
        self.inner
            .cache
            .lock()
            .capacity_of(member_id, team_id, self.inner.settings.default_weekly_capacity)
    }

    /// Availability of a member over `window`, from every cached work item.
    pub fn member_availability(&self, member_id: &str, window: DateWindow, exclude_hours: f64) -> Availability {
        let (query, records) = {
            let cache = self.inner.cache.lock();
            let resolution = cache.capacity_of(member_id, None, self.inner.settings.default_weekly_capacity);
            let days_per_week = cache
                .members
                .get(member_id)
                .map_or(DEFAULT_DAYS_PER_WEEK, TeamMember::days_per_week_or_default);
            let records = derive_allocation_records(member_id, cache.work_items.values());
            let query = AvailabilityQuery {
                member_id: member_id.to_string(),
                effective_weekly_capacity: resolution.effective_capacity,
                days_per_week,
                window,
                exclude_hours,
            };
            (query, records)
        };
        aggregate(&query, &records)
    }

    /// Publish `member_id`'s capacity on `team_id` while the team is marked
    /// as writing.
    pub fn republish_capacity(&self, member_id: &str, team_id: &str) -> PublishReport {
        let resolution = self.member_capacity(member_id, Some(team_id));
        let _team_writing = self.inner.guard.local_update(&EntityKey::new(EntityKind::Team, team_id));
        let report = self.inner.bus.publish(
            EntityKind::TeamMember,
            member_id,
            capacity_payload(member_id, &resolution),
            &[fields::EFFECTIVE_CAPACITY],
        );
        tracing::debug!(
            member = member_id,
            team = team_id,
            capacity = resolution.effective_capacity,
            delivered = report.delivered,
            "effective capacity republished"
        );
        report
    }

    // ----- subscribers -----

    /// Subscribe entity `id` of `kind` to the bus. Accepted updates reload
    /// the entity from the store unless it has a write pending.
    pub fn attach_subscriber(&self, kind: EntityKind, id: &str) -> Arc<EntitySubscriber> {
        let key = WriteKey::new(kind, id);
        let gateway = self.gateway.clone();
        let spawner = self.spawner.clone();
        let session: Weak<SessionInner> = Arc::downgrade(&self.inner);
        let refresh: RefreshFn = Arc::new(move |event: &UpdateEvent| {
            if gateway.is_pending(&key) {
                tracing::debug!(key = %key, event = %event.event_id, "local edit pending; refresh skipped");
                return;
            }
            let gateway = gateway.clone();
            let session = session.clone();
            let key = key.clone();
            spawner.spawn(async move {
                match gateway.refresh(key.kind, &key.id).await {
                    Ok(Some(node)) => {
                        if let Some(inner) = session.upgrade() {
                            inner.cache.lock().apply_node(key.kind, &key.id, &node);
                        }
                    }
                    Ok(None) => tracing::debug!(key = %key, "refreshed entity no longer exists"),
                    Err(e) => tracing::debug!(key = %key, error = %e, "refresh failed"),
                }
            });
        });
        self.attach_subscriber_with(kind, id, refresh)
    }

    /// Subscribe entity `id` with a custom refresh callback.
    pub fn attach_subscriber_with(&self, kind: EntityKind, id: &str, refresh: RefreshFn) -> Arc<EntitySubscriber> {
        let subscriber = Arc::new(EntitySubscriber::new(id, kind, self.inner.guard.clone(), refresh));
        let handler: Arc<dyn UpdateHandler> = subscriber.clone();
        self.inner.bus.subscribe(id, kind, &handler);
        self.inner
            .subscribers
            .lock()
            .insert(subscriber.key().clone(), handler);
        subscriber
    }

    /// Tear a subscriber down. Returns whether it was attached.
    pub fn detach_subscriber(&self, kind: EntityKind, id: &str) -> bool {
        let key = EntityKey::new(kind, id);
        let removed = self.inner.subscribers.lock().remove(&key).is_some();
        self.inner.bus.unsubscribe(kind, id);
        self.inner.guard.forget(&key);
        removed
    }

    // ----- write control -----

    /// Write an entity's pending edit now.
    ///
    /// # Errors
    ///
    /// Same as the debounced write: blacklist or store failure.
    pub async fn commit_now(&self, kind: EntityKind, id: &str) -> Result<Option<Node>, PlanningError> {
        self.gateway.commit_now(&WriteKey::new(kind, id)).await
    }

    /// Write every pending edit now, e.g. before shutdown.
    pub async fn flush_all(&self) -> Vec<(WriteKey, Result<Node, PlanningError>)> {
        self.gateway.flush_all().await
    }

    fn schedule(&self, kind: EntityKind, id: &str, node: Node, changed: &[&'static str]) {
        self.gateway.schedule(
            WriteKey::new(kind, id),
            PendingWrite::new(node, changed),
            self.inner.settings.debounce,
        );
    }
}

fn roster_node(team: &Team) -> Node {
    let mut node = Node::new();
    node.insert(fields::ROSTER.into(), ROSTER_CODEC.encode(&team.roster));
    node
}

fn not_found(kind: EntityKind, id: &str) -> PlanningError {
    PlanningError::NotFound {
        kind,
        id: id.to_string(),
    }
}
