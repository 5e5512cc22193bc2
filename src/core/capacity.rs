//! Capacity arithmetic for team members.
//!
//! Every function here is total: missing or nonsensical inputs fall back to
//! standard defaults instead of failing, so a caller can always render a
//! usable allocation slider.

/// Standard working hours per day when a member has none recorded.
pub const DEFAULT_HOURS_PER_DAY: f64 = 8.0;
/// Standard working days per week when a member has none recorded.
pub const DEFAULT_DAYS_PER_WEEK: f64 = 5.0;
/// Weekly capacity assumed for a member with no roster entry.
pub const DEFAULT_WEEKLY_CAPACITY: f64 = DEFAULT_HOURS_PER_DAY * DEFAULT_DAYS_PER_WEEK;

fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

/// Weekly capacity from a daily/weekly schedule: `hours_per_day * days_per_week`.
///
/// Missing, negative or non-finite inputs fall back to 8 h/day and 5 days/week.
pub fn weekly_capacity(hours_per_day: Option<f64>, days_per_week: Option<f64>) -> f64 {
    let hours = usable(hours_per_day).unwrap_or(DEFAULT_HOURS_PER_DAY);
    let days = usable(days_per_week).unwrap_or(DEFAULT_DAYS_PER_WEEK);
    hours * days
}

/// Clamp a percentage to `[0, 100]`, treating non-finite input as 0.
pub fn clamp_percentage(percentage: f64) -> f64 {
    if percentage.is_finite() {
        percentage.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Capacity after applying an allocation percentage.
///
/// Without `duration_days` this is the weekly rate. With a duration the weekly
/// rate is projected over `duration_days / days_per_week` weeks.
pub fn effective_capacity(
    weekly_capacity: f64,
    allocation_percent: f64,
    duration_days: Option<f64>,
    days_per_week: Option<f64>,
) -> f64 {
    let weekly = usable(Some(weekly_capacity)).unwrap_or(0.0);
    let weekly_effective = weekly * clamp_percentage(allocation_percent) / 100.0;
    match usable(duration_days) {
        None => weekly_effective,
        Some(days) => {
            let per_week = usable(days_per_week)
                .filter(|d| *d > 0.0)
                .unwrap_or(DEFAULT_DAYS_PER_WEEK);
            weekly_effective * days / per_week
        }
    }
}

/// Hours represented by `percentage` of `capacity`, clamped to `[0, capacity]`.
pub fn hours_from_percentage(percentage: f64, capacity: f64) -> f64 {
    let Some(capacity) = usable(Some(capacity)) else {
        return 0.0;
    };
    (capacity * clamp_percentage(percentage) / 100.0).clamp(0.0, capacity)
}

/// Percentage of `capacity` represented by `hours`.
///
/// Hours are clamped to `[0, capacity]`; a capacity of zero yields 0.
pub fn percentage_from_hours(hours: f64, capacity: f64) -> f64 {
    let Some(capacity) = usable(Some(capacity)).filter(|c| *c > 0.0) else {
        return 0.0;
    };
    let hours = if hours.is_finite() { hours.clamp(0.0, capacity) } else { 0.0 };
    hours / capacity * 100.0
}
