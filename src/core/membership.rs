//! Team membership and the team-allocation percentage.
//!
//! The percentage is one fact with one owner: the roster entry. A member's
//! own `team_allocation_percent` is read only when the member is on no
//! roster. Hours per day/week are owned by the member. Effective capacity is
//! derived from both and republished whenever either side changes.

use serde::Serialize;

use super::capacity::{clamp_percentage, effective_capacity};
use super::model::{RosterEntry, Team, TeamMember};
use crate::infra::store::Node;
use crate::util::fields;

/// Where the allocation percentage of a capacity resolution came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationSource {
    /// The team roster entry.
    Roster,
    /// The member's own fallback percentage (member is on no roster).
    MemberFallback,
    /// Neither the member nor a roster entry is known.
    Default,
}

/// Effective weekly capacity and how it was derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityResolution {
    /// Weekly capacity before the allocation percentage.
    pub weekly_capacity: f64,
    /// Allocation percentage applied.
    pub allocation_percent: f64,
    /// `weekly_capacity * allocation_percent / 100`.
    pub effective_capacity: f64,
    /// Origin of the percentage.
    pub source: AllocationSource,
}

/// Resolve a member's effective weekly capacity.
///
/// With neither a member record nor a roster entry the result is
/// `default_weekly` at 100%.
pub fn resolve_effective_capacity(
    member: Option<&TeamMember>,
    roster_entry: Option<&RosterEntry>,
    default_weekly: f64,
) -> CapacityResolution {
    let weekly_capacity = member.map_or(default_weekly, TeamMember::weekly_capacity);
    let (allocation_percent, source) = match (roster_entry, member) {
        (Some(entry), _) => (entry.allocation_percent, AllocationSource::Roster),
        (None, Some(m)) => (
            m.team_allocation_percent.unwrap_or(100.0),
            AllocationSource::MemberFallback,
        ),
        (None, None) => (100.0, AllocationSource::Default),
    };
    let allocation_percent = clamp_percentage(allocation_percent);
    CapacityResolution {
        weekly_capacity,
        allocation_percent,
        effective_capacity: effective_capacity(weekly_capacity, allocation_percent, None, None),
        source,
    }
}

/// Change to a roster percentage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllocationChange {
    /// Percentage before the change; `None` if the member was added.
    pub previous: Option<f64>,
    /// Percentage after the change.
    pub current: f64,
}

impl AllocationChange {
    /// Whether anything changed.
    pub fn is_change(&self) -> bool {
        self.previous.is_none_or(|p| (p - self.current).abs() > f64::EPSILON)
    }
}

/// Set `member_id`'s percentage on `team`, adding a roster entry if needed.
///
/// This is the only mutation path for the percentage.
pub fn set_allocation_percent(team: &mut Team, member_id: &str, percent: f64) -> AllocationChange {
    let current = clamp_percentage(percent);
    if let Some(entry) = team.roster_entry_mut(member_id) {
        let previous = std::mem::replace(&mut entry.allocation_percent, current);
        return AllocationChange {
            previous: Some(previous),
            current,
        };
    }
    team.roster.push(RosterEntry::new(member_id, current));
    AllocationChange {
        previous: None,
        current,
    }
}

/// Remove `member_id` from `team`'s roster.
pub fn remove_from_roster(team: &mut Team, member_id: &str) -> Option<RosterEntry> {
    let pos = team.roster.iter().position(|e| e.member_id == member_id)?;
    Some(team.roster.remove(pos))
}

/// Fields published on behalf of a member when its capacity is re-derived.
pub fn capacity_payload(member_id: &str, resolution: &CapacityResolution) -> Node {
    let mut node = Node::new();
    node.insert("id".into(), member_id.into());
    for (key, value) in [
        (fields::WEEKLY_CAPACITY, resolution.weekly_capacity),
        (fields::TEAM_ALLOCATION_PERCENT, resolution.allocation_percent),
        (fields::EFFECTIVE_CAPACITY, resolution.effective_capacity),
    ] {
        if let Some(n) = serde_json::Number::from_f64(value) {
            node.insert(key.into(), n.into());
        }
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_percentage_wins_over_member_fallback() {
        let mut member = TeamMember::new("m1", "Ada");
        member.team_allocation_percent = Some(100.0);
        let entry = RosterEntry::new("m1", 50.0);

        let resolved = resolve_effective_capacity(Some(&member), Some(&entry), 40.0);
        assert_eq!(resolved.effective_capacity, 20.0);
        assert_eq!(resolved.source, AllocationSource::Roster);
    }

    #[test]
    fn member_without_roster_uses_own_percentage() {
        let mut member = TeamMember::new("m1", "Ada").with_schedule(6.0, 5.0);
        member.team_allocation_percent = Some(50.0);
        let resolved = resolve_effective_capacity(Some(&member), None, 40.0);
        assert_eq!(resolved.effective_capacity, 15.0);
        assert_eq!(resolved.source, AllocationSource::MemberFallback);
    }

    #[test]
    fn unknown_member_gets_default_capacity() {
        let resolved = resolve_effective_capacity(None, None, 40.0);
        assert_eq!(resolved.effective_capacity, 40.0);
        assert_eq!(resolved.source, AllocationSource::Default);
    }

    #[test]
    fn set_allocation_percent_adds_then_updates() {
        let mut team = Team::new("t1", "Core");
        let added = set_allocation_percent(&mut team, "m1", 60.0);
        assert_eq!(added.previous, None);
        assert!(added.is_change());

        let updated = set_allocation_percent(&mut team, "m1", 140.0);
        assert_eq!(updated.previous, Some(60.0));
        assert_eq!(updated.current, 100.0);
        assert_eq!(team.roster.len(), 1);

        assert!(!set_allocation_percent(&mut team, "m1", 100.0).is_change());
        assert!(remove_from_roster(&mut team, "m1").is_some());
        assert!(team.roster.is_empty());
    }

    #[test]
    fn capacity_payload_carries_derived_fields() {
        let resolution = resolve_effective_capacity(None, Some(&RosterEntry::new("m1", 25.0)), 40.0);
        let payload = capacity_payload("m1", &resolution);
        assert_eq!(payload[fields::EFFECTIVE_CAPACITY], 10.0);
        assert_eq!(payload[fields::TEAM_ALLOCATION_PERCENT], 25.0);
    }
}
