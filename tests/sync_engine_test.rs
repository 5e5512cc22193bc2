//! Integration tests for cross-entity synchronization.
//!
//! This test validates:
//! 1. Events reach exactly the subscribers whose manifests declare the field
//! 2. The loop guard rejects echoes and collapses bursts
//! 3. Rapid edits coalesce into one write carrying every edited field
//! 4. commit_now, flush_all, blacklist and failure handling
//! 5. Redundant writes for providers
//! 6. Roster edits republish the member's effective capacity

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use planning_engine::builders::{build_in_memory_session, InMemorySession};
use planning_engine::config::EngineConfig;
use planning_engine::core::{
    EntitySubscriber, NotificationLevel, PlanningError, RefreshFn, RosterEntry, Team, TeamMember, UpdateEvent,
    WorkItem,
};
use planning_engine::infra::Node;
use planning_engine::runtime::TokioSpawner;
use planning_engine::util::{fields, EntityKey, EntityKind};
use serde_json::json;

fn node(value: serde_json::Value) -> Node {
    value.as_object().cloned().unwrap()
}

fn recording() -> (RefreshFn, Arc<Mutex<Vec<UpdateEvent>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (Arc::new(move |event: &UpdateEvent| sink.lock().push(event.clone())), seen)
}

fn setup() -> InMemorySession<TokioSpawner> {
    let built = build_in_memory_session(&EngineConfig::default(), TokioSpawner::current().unwrap()).unwrap();
    let session = &built.session;

    session.upsert_member(TeamMember::new("m", "Morgan").with_schedule(8.0, 5.0));
    let mut team = Team::new("t", "Platform");
    team.roster.push(RosterEntry::new("m", 100.0));
    session.upsert_team(team);
    session.upsert_work_item(WorkItem::new("f", EntityKind::Feature, "Search"));
    session.upsert_work_item(WorkItem::new("p", EntityKind::Provider, "Vendor"));
    built
}

async fn past_debounce() {
    tokio::time::sleep(Duration::from_millis(600)).await;
}

#[tokio::test(start_paused = true)]
async fn test_publish_reaches_only_declared_subscribers() {
    let built = setup();
    let bus = built.session.bus();
    let (team_refresh, team_seen) = recording();
    let (feature_refresh, feature_seen) = recording();
    let _team = built.session.attach_subscriber_with(EntityKind::Team, "t", team_refresh);
    let _feature = built.session.attach_subscriber_with(EntityKind::Feature, "f", feature_refresh);

    // Teams consume member hours; features only consume capacity.
    let report = bus.publish(EntityKind::TeamMember, "m", node(json!({"hoursPerDay": 6})), &[fields::HOURS_PER_DAY]);
    assert_eq!(report.delivered, 1);
    assert_eq!(team_seen.lock().len(), 1);
    assert!(feature_seen.lock().is_empty());

    // Nobody subscribes to member roles.
    let report = bus.publish(EntityKind::TeamMember, "m2", node(json!({"roles": "[]"})), &[fields::ROLES]);
    assert_eq!(report.delivered, 0);
    assert_eq!(team_seen.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_roster_change_republishes_effective_capacity() {
    let built = setup();
    let (refresh, seen) = recording();
    let feature = built.session.attach_subscriber_with(EntityKind::Feature, "f", refresh);

    let change = built.session.set_team_allocation("t", "m", 50.0).unwrap();
    assert_eq!(change.previous, Some(100.0));

    let events = seen.lock().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].publisher_kind, EntityKind::TeamMember);
    assert_eq!(events[0].relevant_field_ids, vec![fields::EFFECTIVE_CAPACITY]);
    assert_eq!(events[0].payload[fields::EFFECTIVE_CAPACITY], 20.0);
    assert_eq!(feature.view_of(EntityKind::TeamMember, "m").unwrap()[fields::EFFECTIVE_CAPACITY], 20.0);
}

#[tokio::test(start_paused = true)]
async fn test_team_ignores_its_own_echo() {
    let built = setup();
    let (team_refresh, team_seen) = recording();
    let team = built.session.attach_subscriber_with(EntityKind::Team, "t", team_refresh);

    built.session.set_team_allocation("t", "m", 50.0).unwrap();
    assert!(team_seen.lock().is_empty());
    assert_eq!(team.stats().rejected_echo, 1);
    assert!(!built.session.guard().is_updating(&EntityKey::new(EntityKind::Team, "t")));
}

#[tokio::test(start_paused = true)]
async fn test_burst_from_one_publisher_collapses() {
    let built = setup();
    let (refresh, seen) = recording();
    let feature: Arc<EntitySubscriber> = built.session.attach_subscriber_with(EntityKind::Feature, "f", refresh);

    built.session.set_team_allocation("t", "m", 50.0).unwrap();
    built.session.set_team_allocation("t", "m", 60.0).unwrap();

    assert_eq!(seen.lock().len(), 1);
    let stats = feature.stats();
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.rejected_too_recent, 1);
}

#[tokio::test(start_paused = true)]
async fn test_rapid_edits_coalesce_into_one_write() {
    let built = setup();
    for hours in [4.0, 5.0, 6.0, 7.0, 7.5] {
        built.session.update_member_schedule("m", Some(hours), None).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(built.store.write_count_for("m"), 0);

    past_debounce().await;
    assert_eq!(built.store.write_count_for("m"), 1);
    let stored = built.store.node(EntityKind::TeamMember, "m").unwrap();
    assert_eq!(stored[fields::HOURS_PER_DAY], 7.5);
    assert_eq!(stored[fields::WEEKLY_CAPACITY], 37.5);
    assert_eq!(stored[fields::EFFECTIVE_CAPACITY], 37.5);
}

#[tokio::test(start_paused = true)]
async fn test_edits_to_different_fields_share_one_write() {
    let built = setup();
    let (refresh, seen) = recording();
    let _member = built.session.attach_subscriber_with(EntityKind::TeamMember, "m", refresh);

    built.session.rename(EntityKind::Feature, "f", "New title").unwrap();
    let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let end = chrono::NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
    built.session.set_timeframe("f", start, end).unwrap();

    past_debounce().await;
    assert_eq!(built.store.write_count_for("f"), 1);
    let stored = built.store.node(EntityKind::Feature, "f").unwrap();
    assert_eq!(stored[fields::TITLE], "New title");
    assert_eq!(stored["startDate"], "2024-01-01");
    assert_eq!(stored["endDate"], "2024-01-05");

    let events = seen.lock().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].publisher_id, "f");
    assert!(events[0].touches(fields::TITLE));
    assert!(events[0].touches(fields::TIMEFRAME));
    assert_eq!(events[0].payload[fields::TITLE], "New title");
    assert_eq!(events[0].payload["startDate"], "2024-01-01");
    assert_eq!(events[0].payload["endDate"], "2024-01-05");
}

#[tokio::test(start_paused = true)]
async fn test_successful_write_publishes_changed_fields() {
    let built = setup();
    let (refresh, seen) = recording();
    let _member = built.session.attach_subscriber_with(EntityKind::TeamMember, "m", refresh);

    built.session.rename(EntityKind::Team, "t", "Core Platform").unwrap();
    assert!(seen.lock().is_empty());

    past_debounce().await;
    let events = seen.lock().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].publisher_id, "t");
    assert_eq!(events[0].relevant_field_ids, vec![fields::TITLE]);
    assert_eq!(events[0].payload[fields::TITLE], "Core Platform");
}

#[tokio::test(start_paused = true)]
async fn test_commit_now_writes_once() {
    let built = setup();
    built.session.rename(EntityKind::Feature, "f", "Search v2").unwrap();

    let written = built.session.commit_now(EntityKind::Feature, "f").await.unwrap();
    assert!(written.is_some());
    assert_eq!(built.store.write_count_for("f"), 1);

    past_debounce().await;
    assert_eq!(built.store.write_count_for("f"), 1);
    assert!(built.session.commit_now(EntityKind::Feature, "f").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_flush_all_commits_everything_pending() {
    let built = setup();
    built.session.rename(EntityKind::Feature, "f", "Search v2").unwrap();
    built.session.set_team_allocation("t", "m", 80.0).unwrap();
    assert_eq!(built.session.gateway().pending_len(), 2);

    let results = built.session.flush_all().await;
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|(_, r)| r.is_ok()));
    assert_eq!(built.session.gateway().pending_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_blacklisted_entity_is_never_written() {
    let built = setup();
    built.store.blacklist("f");
    built.session.rename(EntityKind::Feature, "f", "Broken").unwrap();

    past_debounce().await;
    assert_eq!(built.store.write_count_for("f"), 0);
    let notifications = built.notifications.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].level, NotificationLevel::Warning);
    assert_eq!(notifications[0].entity_id, "f");

    built.session.rename(EntityKind::Feature, "f", "Still broken").unwrap();
    let err = built.session.commit_now(EntityKind::Feature, "f").await.unwrap_err();
    assert!(matches!(err, PlanningError::Blacklisted { .. }));
    assert!(matches!(
        built.session.load(EntityKind::Feature, "f").await,
        Err(PlanningError::Blacklisted { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_failed_write_keeps_local_state() {
    let built = setup();
    built.store.fail_always_for("t");
    let (refresh, seen) = recording();
    let _member = built.session.attach_subscriber_with(EntityKind::TeamMember, "m", refresh);

    built.session.set_team_allocation("t", "m", 30.0).unwrap();
    past_debounce().await;

    let writes = built.store.writes();
    assert_eq!(writes.len(), 1);
    assert!(!writes[0].succeeded);
    assert!(seen.lock().is_empty());

    let team = built.session.team("t").unwrap();
    assert_eq!(team.roster_entry("m").unwrap().allocation_percent, 30.0);

    let errors: Vec<_> = built
        .notifications
        .notifications()
        .into_iter()
        .filter(|n| n.level == NotificationLevel::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].entity_kind, EntityKind::Team);
}

#[tokio::test(start_paused = true)]
async fn test_provider_gets_redundant_write() {
    let built = setup();
    built.session.rename(EntityKind::Provider, "p", "Vendor B").unwrap();
    built.session.rename(EntityKind::Feature, "f", "Search v2").unwrap();

    tokio::time::sleep(Duration::from_millis(510)).await;
    assert_eq!(built.store.write_count_for("p"), 1);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(built.store.write_count_for("p"), 2);
    assert_eq!(built.store.write_count_for("f"), 1);
    let writes: Vec<_> = built.store.writes().into_iter().filter(|w| w.id == "p").collect();
    assert_eq!(writes[0].fields, writes[1].fields);
}

#[tokio::test(start_paused = true)]
async fn test_accepted_update_reloads_subscriber_from_store() {
    let built = setup();
    built
        .store
        .insert_node(EntityKind::TeamMember, "m", node(json!({"title": "Morgan", "hoursPerDay": 8})));
    assert!(built.session.load(EntityKind::TeamMember, "m").await.unwrap());
    let member = built.session.attach_subscriber(EntityKind::TeamMember, "m");

    built
        .store
        .insert_node(EntityKind::TeamMember, "m", node(json!({"title": "Morgan", "hoursPerDay": 6})));
    built
        .session
        .bus()
        .publish(EntityKind::Team, "t", node(json!({"title": "Platform"})), &[fields::TITLE]);
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_eq!(member.stats().accepted, 1);
    assert_eq!(built.session.member("m").unwrap().hours_per_day, Some(6.0));
}

#[tokio::test(start_paused = true)]
async fn test_pending_edit_is_not_overwritten_by_refresh() {
    let built = setup();
    built
        .store
        .insert_node(EntityKind::TeamMember, "m", node(json!({"title": "Morgan", "hoursPerDay": 8})));
    let _member = built.session.attach_subscriber(EntityKind::TeamMember, "m");

    built.session.update_member_schedule("m", Some(4.0), None).unwrap();
    built
        .session
        .bus()
        .publish(EntityKind::Team, "t", node(json!({"title": "Platform"})), &[fields::TITLE]);
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_eq!(built.session.member("m").unwrap().hours_per_day, Some(4.0));
}

#[tokio::test(start_paused = true)]
async fn test_membership_edges_follow_roster() {
    let built = setup();
    built.session.upsert_member(TeamMember::new("n", "Noor"));

    let change = built.session.add_member_to_team("t", "n", 40.0).await.unwrap();
    assert_eq!(change.previous, None);
    assert_eq!(built.store.edges().len(), 1);
    assert_eq!(built.session.member_capacity("n", Some("t")).effective_capacity, 16.0);

    assert!(built.session.remove_member_from_team("t", "n").await.unwrap());
    assert!(built.store.edges().is_empty());
    assert!(built.session.team("t").unwrap().roster_entry("n").is_none());
    assert!(!built.session.remove_member_from_team("t", "n").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_detached_subscriber_stops_receiving() {
    let built = setup();
    let (refresh, seen) = recording();
    let _feature = built.session.attach_subscriber_with(EntityKind::Feature, "f", refresh);
    assert!(built.session.detach_subscriber(EntityKind::Feature, "f"));

    built.session.set_team_allocation("t", "m", 50.0).unwrap();
    assert!(seen.lock().is_empty());
    assert!(!built.session.detach_subscriber(EntityKind::Feature, "f"));
}
