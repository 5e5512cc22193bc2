//! Tests for configuration validation

use std::collections::HashMap;
use std::time::Duration;

use planning_engine::config::EngineConfig;
use planning_engine::util::EntityKind;

#[test]
fn test_default_config_is_valid() {
    let cfg = EngineConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.debounce_ms, 500);
    assert_eq!(cfg.loop_guard_window_ms, 200);
    assert_eq!(cfg.redundant_write_delay_ms, 50);
    assert_eq!(cfg.redundant_write_kinds, vec![EntityKind::Provider]);
    assert_eq!(cfg.default_weekly_capacity, 40.0);
}

#[test]
fn test_invalid_debounce() {
    let cfg = EngineConfig {
        debounce_ms: 0,
        ..EngineConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_invalid_default_capacity() {
    let cfg = EngineConfig {
        default_weekly_capacity: -1.0,
        ..EngineConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_redundant_delay_required_only_when_enabled() {
    let enabled = EngineConfig {
        redundant_write_delay_ms: 0,
        ..EngineConfig::default()
    };
    assert!(enabled.validate().is_err());

    let disabled = EngineConfig {
        redundant_write_delay_ms: 0,
        redundant_write_kinds: Vec::new(),
        ..EngineConfig::default()
    };
    assert!(disabled.validate().is_ok());
}

#[test]
fn test_from_json_str_fills_defaults() {
    let cfg = EngineConfig::from_json_str(r#"{"debounce_ms": 250, "redundant_write_kinds": ["provider", "option"]}"#)
        .expect("valid config");
    assert_eq!(cfg.debounce_ms, 250);
    assert_eq!(cfg.loop_guard_window_ms, 200);
    assert_eq!(cfg.redundant_write_kinds, vec![EntityKind::Provider, EntityKind::Option]);
}

#[test]
fn test_from_json_str_rejects_invalid() {
    assert!(EngineConfig::from_json_str(r#"{"debounce_ms": 0}"#).is_err());
    assert!(EngineConfig::from_json_str("not json").is_err());
}

#[test]
fn test_from_vars_overrides_defaults() {
    let vars: HashMap<&str, &str> = [
        ("PLANNER_DEBOUNCE_MS", "300"),
        ("PLANNER_REDUNDANT_WRITE_KINDS", "provider, feature"),
        ("PLANNER_DEFAULT_WEEKLY_CAPACITY", "37.5"),
    ]
    .into_iter()
    .collect();
    let cfg = EngineConfig::from_vars(|k| vars.get(k).map(|v| (*v).to_string())).expect("valid vars");
    assert_eq!(cfg.debounce_ms, 300);
    assert_eq!(cfg.redundant_write_kinds, vec![EntityKind::Provider, EntityKind::Feature]);
    assert_eq!(cfg.default_weekly_capacity, 37.5);
    assert_eq!(cfg.notification_buffer, 100);
}

#[test]
fn test_from_vars_rejects_garbage() {
    let bad_number = EngineConfig::from_vars(|k| (k == "PLANNER_DEBOUNCE_MS").then(|| "soon".to_string()));
    assert!(bad_number.is_err());

    let bad_kind = EngineConfig::from_vars(|k| (k == "PLANNER_REDUNDANT_WRITE_KINDS").then(|| "vendor".to_string()));
    assert!(bad_kind.unwrap_err().contains("vendor"));
}

#[test]
fn test_session_settings_mapping() {
    let settings = EngineConfig::default().session_settings();
    assert_eq!(settings.debounce, Duration::from_millis(500));
    assert_eq!(settings.gateway.redundant_write_delay, Duration::from_millis(50));
    assert_eq!(settings.gateway.redundant_write_kinds, vec![EntityKind::Provider]);
}
