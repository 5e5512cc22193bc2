//! Allocation aggregation and the over-allocation verdict.
//!
//! The verdict is advisory. Nothing here blocks a write; callers surface
//! `over_allocated_by` and the offending weeks as a warning.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::calendar::{working_days, DateWindow, WeekBucket};
use super::capacity::effective_capacity;
use super::model::WorkItem;
use crate::util::EntityId;

const EPSILON: f64 = 1e-9;

/// A member's derived commitment to one work item.
///
/// Never persisted; rebuilt from work items on every aggregation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationRecord {
    /// Member id.
    pub member_id: EntityId,
    /// Work item id.
    pub work_item_id: EntityId,
    /// Work item display name.
    pub work_item_name: String,
    /// First day of the work item.
    pub start_date: NaiveDate,
    /// Last day of the work item (inclusive).
    pub end_date: NaiveDate,
    /// `total_hours` spread evenly over the weeks spanned.
    pub weekly_hours: f64,
    /// Hours assigned over the whole timeframe.
    pub total_hours: f64,
}

impl AllocationRecord {
    /// Record spreading `total_hours` evenly over the ISO weeks of `window`.
    pub fn spread(
        member_id: impl Into<EntityId>,
        work_item_id: impl Into<EntityId>,
        work_item_name: impl Into<String>,
        window: DateWindow,
        total_hours: f64,
    ) -> Self {
        let weeks = window.buckets().len().max(1);
        #[allow(clippy::cast_precision_loss)]
        let weekly_hours = total_hours / weeks as f64;
        Self {
            member_id: member_id.into(),
            work_item_id: work_item_id.into(),
            work_item_name: work_item_name.into(),
            start_date: window.start,
            end_date: window.end,
            weekly_hours,
            total_hours,
        }
    }

    /// Inclusive date window of the record.
    pub fn window(&self) -> DateWindow {
        DateWindow::new(self.start_date, self.end_date)
    }
}

/// Build `member_id`'s allocation records from work items.
///
/// Items without a timeframe or without hours for the member contribute nothing.
pub fn derive_allocation_records<'a, I>(member_id: &str, work_items: I) -> Vec<AllocationRecord>
where
    I: IntoIterator<Item = &'a WorkItem>,
{
    work_items
        .into_iter()
        .filter_map(|item| {
            let hours = item.member_hours(member_id);
            if hours <= 0.0 {
                return None;
            }
            let Some(window) = item.timeframe else {
                tracing::debug!(work_item = %item.id, "skipping unscheduled work item");
                return None;
            };
            Some(AllocationRecord::spread(member_id, &item.id, &item.name, window, hours))
        })
        .collect()
}

/// Inputs for one availability check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    /// Member being checked.
    pub member_id: EntityId,
    /// Weekly capacity after the team allocation percentage.
    pub effective_weekly_capacity: f64,
    /// Member's working days per week.
    pub days_per_week: f64,
    /// Window the verdict is for.
    pub window: DateWindow,
    /// Hours of the allocation being edited, excluded so it does not count against itself.
    pub exclude_hours: f64,
}

/// A week whose summed weekly hours exceed capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekOverload {
    /// The week.
    pub week: WeekBucket,
    /// Hours committed in that week.
    pub allocated_hours: f64,
    /// Hours over capacity.
    pub excess: f64,
}

/// Availability verdict for one member and window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    /// Member checked.
    pub member_id: EntityId,
    /// Capacity over the whole window.
    pub total_capacity: f64,
    /// Hours committed by records overlapping the window.
    pub total_allocated_hours: f64,
    /// `max(0, total_capacity - total_allocated_hours)`.
    pub available_hours: f64,
    /// `max(0, total_allocated_hours - total_capacity)`.
    pub over_allocated_by: f64,
    /// Whether any hours remain and nothing is over-committed.
    pub available: bool,
    /// Over-committed in the window total or in any single week of the window.
    pub is_over_allocated: bool,
    /// Summed weekly hours per week, across all records.
    pub weekly_load: BTreeMap<WeekBucket, f64>,
    /// Weeks inside the window whose load exceeds weekly capacity.
    pub over_allocated_weeks: Vec<WeekOverload>,
    /// Work items whose records overlap the window.
    pub contributing_work_items: Vec<EntityId>,
}

/// Sum a member's allocations and compare them with capacity.
pub fn aggregate(query: &AvailabilityQuery, records: &[AllocationRecord]) -> Availability {
    let weekly_capacity = query.effective_weekly_capacity.max(0.0);
    let own: Vec<&AllocationRecord> = records
        .iter()
        .filter(|r| r.member_id == query.member_id)
        .collect();

    let mut weekly_load: BTreeMap<WeekBucket, f64> = BTreeMap::new();
    for record in &own {
        for week in record.window().buckets() {
            *weekly_load.entry(week).or_default() += record.weekly_hours;
        }
    }

    let over_allocated_weeks: Vec<WeekOverload> = query
        .window
        .buckets()
        .filter_map(|week| {
            let allocated = weekly_load.get(&week).copied().unwrap_or(0.0);
            let excess = allocated - weekly_capacity;
            (excess > EPSILON).then_some(WeekOverload {
                week,
                allocated_hours: allocated,
                excess,
            })
        })
        .collect();

    let overlapping: Vec<&&AllocationRecord> = own
        .iter()
        .filter(|r| r.window().overlaps(&query.window))
        .collect();
    let allocated: f64 = overlapping.iter().map(|r| r.total_hours).sum();
    let total_allocated_hours = (allocated - query.exclude_hours.max(0.0)).max(0.0);

    let days = working_days(query.window.start, query.window.end, query.days_per_week);
    let total_capacity = effective_capacity(weekly_capacity, 100.0, Some(days), Some(query.days_per_week));

    let available_hours = (total_capacity - total_allocated_hours).max(0.0);
    let over_allocated_by = (total_allocated_hours - total_capacity).max(0.0);
    let over_by_window = over_allocated_by > EPSILON;

    let verdict = Availability {
        member_id: query.member_id.clone(),
        total_capacity,
        total_allocated_hours,
        available_hours,
        over_allocated_by,
        available: available_hours > EPSILON && !over_by_window,
        is_over_allocated: over_by_window || !over_allocated_weeks.is_empty(),
        weekly_load,
        over_allocated_weeks,
        contributing_work_items: overlapping.iter().map(|r| r.work_item_id.clone()).collect(),
    };

    if verdict.is_over_allocated {
        tracing::info!(
            member = %query.member_id,
            allocated = verdict.total_allocated_hours,
            capacity = verdict.total_capacity,
            over_by = verdict.over_allocated_by,
            weeks = verdict.over_allocated_weeks.len(),
            "member over-allocated"
        );
    }
    verdict
}
