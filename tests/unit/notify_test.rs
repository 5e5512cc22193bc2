//! Tests for notification sinks

use planning_engine::core::{
    build_notification, InMemoryNotificationSink, LogNotificationSink, NotificationLevel, NotificationSink,
};
use planning_engine::util::EntityKind;

#[test]
fn test_in_memory_notification_sink() {
    let sink = InMemoryNotificationSink::new(10);

    sink.notify(build_notification(
        EntityKind::Team,
        "t1",
        NotificationLevel::Error,
        "Could not save team",
    ));

    let notifications = sink.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].entity_id, "t1");
    assert_eq!(notifications[0].entity_kind, EntityKind::Team);
    assert_eq!(notifications[0].level, NotificationLevel::Error);
    assert!(!notifications[0].notification_id.is_empty());
}

#[test]
fn test_notification_sink_overflow() {
    let sink = InMemoryNotificationSink::new(2);

    for id in ["m1", "m2", "m3"] {
        sink.notify(build_notification(EntityKind::TeamMember, id, NotificationLevel::Info, "saved"));
    }

    let notifications = sink.notifications();
    assert_eq!(notifications.len(), 2);
    assert_eq!(notifications[0].entity_id, "m2"); // First one popped
    assert_eq!(notifications[1].entity_id, "m3");
}

#[test]
fn test_clones_share_buffer() {
    let sink = InMemoryNotificationSink::new(5);
    let handle = sink.clone();
    handle.notify(build_notification(EntityKind::Provider, "p1", NotificationLevel::Warning, "skipped"));
    assert_eq!(sink.len(), 1);
    sink.clear();
    assert!(handle.is_empty());
}

#[test]
fn test_log_sink_accepts_every_level() {
    let sink = LogNotificationSink;
    for level in [NotificationLevel::Info, NotificationLevel::Warning, NotificationLevel::Error] {
        sink.notify(build_notification(EntityKind::Feature, "f1", level, "message"));
    }
}

#[test]
fn test_notification_serializes_camel_case() {
    let n = build_notification(EntityKind::Team, "t1", NotificationLevel::Warning, "blacklisted");
    let json = serde_json::to_value(&n).unwrap();
    assert_eq!(json["entityKind"], "team");
    assert_eq!(json["level"], "warning");
}
