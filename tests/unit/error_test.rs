//! Tests for error types

use planning_engine::core::{AppResult, PlanningError};
use planning_engine::util::EntityKind;

#[test]
fn test_store_error() {
    let err = PlanningError::Store("connection reset".to_string());
    assert_eq!(format!("{}", err), "store error: connection reset");
}

#[test]
fn test_blacklisted_error() {
    let err = PlanningError::Blacklisted {
        kind: EntityKind::Provider,
        id: "p1".to_string(),
    };
    assert_eq!(format!("{}", err), "entity provider/p1 is blacklisted");
}

#[test]
fn test_not_found_error() {
    let err = PlanningError::NotFound {
        kind: EntityKind::TeamMember,
        id: "m9".to_string(),
    };
    assert_eq!(format!("{}", err), "entity team_member/m9 not found");
}

#[test]
fn test_invalid_config_error() {
    let err = PlanningError::InvalidConfig("debounce_ms must be greater than 0".to_string());
    assert_eq!(format!("{}", err), "invalid config: debounce_ms must be greater than 0");
}

#[test]
fn test_app_result_wraps_planning_error() {
    fn load() -> AppResult<()> {
        Err::<(), _>(PlanningError::Store("timeout".into()))?;
        Ok(())
    }
    let err = load().unwrap_err();
    assert!(err.downcast_ref::<PlanningError>().is_some());
}
