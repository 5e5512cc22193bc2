//! Domain entities and their conversion to and from store nodes.
//!
//! Composite fields go through [`JsonListCodec`] in both directions, so a
//! node read back from the store decodes the same whether the backend kept
//! the encoded text or handed back a parsed array.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::calendar::DateWindow;
use super::capacity;
use crate::infra::codec::{FieldCodec, JsonListCodec};
use crate::infra::store::Node;
use crate::util::{fields, EntityId, EntityKind};

/// Codec for team rosters.
pub const ROSTER_CODEC: JsonListCodec<RosterEntry> = JsonListCodec::new(fields::ROSTER);
/// Codec for work item team allocations.
pub const TEAM_ALLOCATIONS_CODEC: JsonListCodec<TeamAllocation> =
    JsonListCodec::new(fields::TEAM_ALLOCATIONS);
/// Codec for work item goals.
pub const GOALS_CODEC: JsonListCodec<Value> = JsonListCodec::new(fields::GOALS);
/// Codec for work item risks.
pub const RISKS_CODEC: JsonListCodec<Value> = JsonListCodec::new(fields::RISKS);

const START_DATE: &str = "startDate";
const END_DATE: &str = "endDate";

/// Node keys holding a published field. Most fields are stored under their
/// own id; the timeframe is split into start and end dates.
pub fn node_keys(field_id: &str) -> Vec<&str> {
    if field_id == fields::TIMEFRAME {
        vec![START_DATE, END_DATE]
    } else {
        vec![field_id]
    }
}

fn text(node: &Node, key: &str) -> Option<String> {
    node.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Numbers may arrive as JSON numbers or as numeric text.
fn number(node: &Node, key: &str) -> Option<f64> {
    match node.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Dates may arrive as `YYYY-MM-DD` or as a full timestamp.
fn date(node: &Node, key: &str) -> Option<NaiveDate> {
    let raw = node.get(key)?.as_str()?;
    NaiveDate::parse_from_str(raw.get(..10).unwrap_or(raw), "%Y-%m-%d").ok()
}

fn put_number(node: &mut Node, key: &str, value: Option<f64>) {
    if let Some(v) = value.and_then(serde_json::Number::from_f64) {
        node.insert(key.into(), Value::Number(v));
    }
}

/// An individual contributor with a weekly schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    /// Entity id.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Working hours per day.
    pub hours_per_day: Option<f64>,
    /// Working days per week.
    pub days_per_week: Option<f64>,
    /// Explicit weekly capacity override.
    pub weekly_capacity: Option<f64>,
    /// Fallback team allocation, used only when no roster entry exists.
    pub team_allocation_percent: Option<f64>,
}

impl TeamMember {
    /// Member with the standard schedule.
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            hours_per_day: None,
            days_per_week: None,
            weekly_capacity: None,
            team_allocation_percent: None,
        }
    }

    /// Builder-style schedule setter.
    #[must_use]
    pub fn with_schedule(mut self, hours_per_day: f64, days_per_week: f64) -> Self {
        self.hours_per_day = Some(hours_per_day);
        self.days_per_week = Some(days_per_week);
        self
    }

    /// Explicit override if present, otherwise derived from the schedule.
    pub fn weekly_capacity(&self) -> f64 {
        self.weekly_capacity
            .filter(|c| c.is_finite() && *c >= 0.0)
            .unwrap_or_else(|| capacity::weekly_capacity(self.hours_per_day, self.days_per_week))
    }

    /// Days per week, defaulted.
    pub fn days_per_week_or_default(&self) -> f64 {
        self.days_per_week
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(capacity::DEFAULT_DAYS_PER_WEEK)
    }

    /// Decode from a store node.
    pub fn from_node(id: &str, node: &Node) -> Self {
        Self {
            id: id.to_string(),
            name: text(node, fields::TITLE).unwrap_or_default(),
            hours_per_day: number(node, fields::HOURS_PER_DAY),
            days_per_week: number(node, fields::DAYS_PER_WEEK),
            weekly_capacity: number(node, fields::WEEKLY_CAPACITY),
            team_allocation_percent: number(node, fields::TEAM_ALLOCATION_PERCENT),
        }
    }

    /// Encode for storage.
    pub fn to_fields(&self) -> Node {
        let mut node = Node::new();
        node.insert(fields::TITLE.into(), self.name.clone().into());
        put_number(&mut node, fields::HOURS_PER_DAY, self.hours_per_day);
        put_number(&mut node, fields::DAYS_PER_WEEK, self.days_per_week);
        put_number(&mut node, fields::WEEKLY_CAPACITY, Some(self.weekly_capacity()));
        put_number(&mut node, fields::TEAM_ALLOCATION_PERCENT, self.team_allocation_percent);
        node
    }
}

/// Hours a roster member has earmarked for one work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItemShare {
    /// Work item id.
    pub work_item_id: EntityId,
    /// Hours earmarked.
    #[serde(default)]
    pub hours: f64,
}

/// One member's place on a team roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    /// Member id.
    pub member_id: EntityId,
    /// Share of the member's weekly capacity committed to this team.
    #[serde(default = "full_allocation")]
    pub allocation_percent: f64,
    /// Role on the team.
    #[serde(default)]
    pub role: Option<String>,
    /// Day the member joined.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Per-work-item earmarks.
    #[serde(default)]
    pub per_work_item_allocations: Vec<WorkItemShare>,
}

const fn full_allocation() -> f64 {
    100.0
}

impl RosterEntry {
    /// Entry at the given allocation percentage.
    pub fn new(member_id: impl Into<EntityId>, allocation_percent: f64) -> Self {
        Self {
            member_id: member_id.into(),
            allocation_percent: capacity::clamp_percentage(allocation_percent),
            role: None,
            start_date: None,
            per_work_item_allocations: Vec::new(),
        }
    }
}

/// A group of members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    /// Entity id.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Ordered roster.
    pub roster: Vec<RosterEntry>,
}

impl Team {
    /// Team with an empty roster.
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            roster: Vec::new(),
        }
    }

    /// Roster entry for `member_id`.
    pub fn roster_entry(&self, member_id: &str) -> Option<&RosterEntry> {
        self.roster.iter().find(|e| e.member_id == member_id)
    }

    /// Mutable roster entry for `member_id`.
    pub fn roster_entry_mut(&mut self, member_id: &str) -> Option<&mut RosterEntry> {
        self.roster.iter_mut().find(|e| e.member_id == member_id)
    }

    /// Decode from a store node.
    pub fn from_node(id: &str, node: &Node) -> Self {
        Self {
            id: id.to_string(),
            name: text(node, fields::TITLE).unwrap_or_default(),
            roster: ROSTER_CODEC.decode(node.get(fields::ROSTER)),
        }
    }

    /// Encode for storage.
    pub fn to_fields(&self) -> Node {
        let mut node = Node::new();
        node.insert(fields::TITLE.into(), self.name.clone().into());
        node.insert(fields::ROSTER.into(), ROSTER_CODEC.encode(&self.roster));
        node
    }
}

/// A member assigned to a team allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocatedMember {
    /// Member id.
    pub member_id: EntityId,
    /// Member display name at assignment time.
    #[serde(default)]
    pub name: String,
    /// Total hours over the work item's timeframe.
    #[serde(default)]
    pub hours: f64,
}

/// Hours a work item requests from one team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamAllocation {
    /// Team id.
    pub team_id: EntityId,
    /// Hours requested from the team.
    #[serde(default)]
    pub requested_hours: f64,
    /// Members who have been assigned hours.
    #[serde(default)]
    pub allocated_members: Vec<AllocatedMember>,
}

/// A feature, option or provider drawing on team hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    /// Entity id.
    pub id: EntityId,
    /// Feature, option or provider.
    pub kind: EntityKind,
    /// Display name.
    pub name: String,
    /// Start and end dates, if scheduled.
    pub timeframe: Option<DateWindow>,
    /// Per-team requests and assignments.
    pub team_allocations: Vec<TeamAllocation>,
    /// Opaque goal entries.
    pub goals: Vec<Value>,
    /// Opaque risk entries.
    pub risks: Vec<Value>,
}

impl WorkItem {
    /// Unscheduled work item.
    pub fn new(id: impl Into<EntityId>, kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            timeframe: None,
            team_allocations: Vec::new(),
            goals: Vec::new(),
            risks: Vec::new(),
        }
    }

    /// Builder-style timeframe setter.
    #[must_use]
    pub fn with_timeframe(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.timeframe = Some(DateWindow::new(start, end));
        self
    }

    /// Total hours assigned to `member_id` across all teams.
    pub fn member_hours(&self, member_id: &str) -> f64 {
        self.team_allocations
            .iter()
            .flat_map(|a| &a.allocated_members)
            .filter(|m| m.member_id == member_id)
            .map(|m| m.hours)
            .sum()
    }

    /// Set a member's hours under `team_id`, creating the allocation and
    /// assignment as needed. Returns the previous hours.
    pub fn set_member_hours(
        &mut self,
        team_id: &str,
        member_id: &str,
        member_name: &str,
        hours: f64,
    ) -> f64 {
        let hours = if hours.is_finite() { hours.max(0.0) } else { 0.0 };
        let allocation = if let Some(pos) = self.team_allocations.iter().position(|a| a.team_id == team_id) {
            &mut self.team_allocations[pos]
        } else {
            self.team_allocations.push(TeamAllocation {
                team_id: team_id.to_string(),
                requested_hours: 0.0,
                allocated_members: Vec::new(),
            });
            let last = self.team_allocations.len() - 1;
            &mut self.team_allocations[last]
        };
        if let Some(member) = allocation
            .allocated_members
            .iter_mut()
            .find(|m| m.member_id == member_id)
        {
            return std::mem::replace(&mut member.hours, hours);
        }
        allocation.allocated_members.push(AllocatedMember {
            member_id: member_id.to_string(),
            name: member_name.to_string(),
            hours,
        });
        0.0
    }

    /// Decode from a store node.
    pub fn from_node(kind: EntityKind, id: &str, node: &Node) -> Self {
        let timeframe = match (date(node, START_DATE), date(node, END_DATE)) {
            (Some(start), Some(end)) => Some(DateWindow::new(start, end)),
            (Some(day), None) | (None, Some(day)) => Some(DateWindow::new(day, day)),
            (None, None) => None,
        };
        Self {
            id: id.to_string(),
            kind,
            name: text(node, fields::TITLE).unwrap_or_default(),
            timeframe,
            team_allocations: TEAM_ALLOCATIONS_CODEC.decode(node.get(fields::TEAM_ALLOCATIONS)),
            goals: GOALS_CODEC.decode(node.get(fields::GOALS)),
            risks: RISKS_CODEC.decode(node.get(fields::RISKS)),
        }
    }

    /// Encode for storage.
    pub fn to_fields(&self) -> Node {
        let mut node = Node::new();
        node.insert(fields::TITLE.into(), self.name.clone().into());
        if let Some(window) = self.timeframe {
            node.insert(START_DATE.into(), window.start.to_string().into());
            node.insert(END_DATE.into(), window.end.to_string().into());
        }
        node.insert(
            fields::TEAM_ALLOCATIONS.into(),
            TEAM_ALLOCATIONS_CODEC.encode(&self.team_allocations),
        );
        node.insert(fields::GOALS.into(), GOALS_CODEC.encode(&self.goals));
        node.insert(fields::RISKS.into(), RISKS_CODEC.encode(&self.risks));
        node
    }
}
