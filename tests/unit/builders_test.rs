//! Tests for builder modules

use planning_engine::builders::build_in_memory_session;
use planning_engine::config::EngineConfig;
use planning_engine::core::PlanningError;
use planning_engine::runtime::TokioSpawner;

#[tokio::test]
async fn test_build_in_memory_session() {
    let cfg = EngineConfig {
        debounce_ms: 120,
        ..EngineConfig::default()
    };
    let built = build_in_memory_session(&cfg, TokioSpawner::current().unwrap()).expect("session");
    assert_eq!(built.session.settings().debounce.as_millis(), 120);
    assert_eq!(built.session.guard().window_ms(), 200);
    assert_eq!(built.session.gateway().pending_len(), 0);
    assert!(built.notifications.is_empty());
    assert!(built.store.writes().is_empty());
}

#[tokio::test]
async fn test_build_rejects_invalid_config() {
    let cfg = EngineConfig {
        notification_buffer: 0,
        ..EngineConfig::default()
    };
    let result = build_in_memory_session(&cfg, TokioSpawner::current().unwrap());
    assert!(matches!(result, Err(PlanningError::InvalidConfig(_))));
}
