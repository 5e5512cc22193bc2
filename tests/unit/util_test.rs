//! Tests for utility functions

use planning_engine::util::{fields, now_ms, EntityKind};

#[test]
fn test_entity_kind_labels() {
    assert_eq!(EntityKind::TeamMember.to_string(), "team_member");
    assert_eq!(EntityKind::Provider.as_str(), "provider");
    assert_eq!(serde_json::to_string(&EntityKind::Team).unwrap(), "\"team\"");
    let parsed: EntityKind = serde_json::from_str("\"option\"").unwrap();
    assert_eq!(parsed, EntityKind::Option);
}

#[test]
fn test_work_item_kinds() {
    let work_items: Vec<EntityKind> = EntityKind::ALL.into_iter().filter(|k| k.is_work_item()).collect();
    assert_eq!(work_items, vec![EntityKind::Feature, EntityKind::Option, EntityKind::Provider]);
}

#[test]
fn test_field_ids_match_store_keys() {
    assert_eq!(fields::EFFECTIVE_CAPACITY, "effectiveCapacity");
    assert_eq!(fields::TEAM_ALLOCATIONS, "teamAllocations");
    assert_eq!(fields::ROSTER, "roster");
}

#[test]
fn test_now_ms_is_monotonic_enough() {
    let a = now_ms();
    let b = now_ms();
    assert!(a > 0);
    assert!(b >= a);
}
