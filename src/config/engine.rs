//! Engine configuration structures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{GatewaySettings, SessionSettings};
use crate::util::EntityKind;

/// Prefix of the environment variables read by [`EngineConfig::from_env`].
pub const ENV_PREFIX: &str = "PLANNER_";

/// Root engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Quiet period before an edit is written, in ms.
    pub debounce_ms: u64,
    /// Loop-guard settle window, in ms.
    pub loop_guard_window_ms: u64,
    /// Delay of the redundant write after the debounced one, in ms.
    pub redundant_write_delay_ms: u64,
    /// Kinds that get a redundant write.
    pub redundant_write_kinds: Vec<EntityKind>,
    /// Weekly capacity for members with no member record and no roster entry.
    pub default_weekly_capacity: f64,
    /// Size of the in-memory notification buffer.
    pub notification_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            loop_guard_window_ms: 200,
            redundant_write_delay_ms: 50,
            redundant_write_kinds: vec![EntityKind::Provider],
            default_weekly_capacity: 40.0,
            notification_buffer: 100,
        }
    }
}

impl EngineConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.debounce_ms == 0 {
            return Err("debounce_ms must be greater than 0".into());
        }
        if self.loop_guard_window_ms == 0 {
            return Err("loop_guard_window_ms must be greater than 0".into());
        }
        if !self.default_weekly_capacity.is_finite() || self.default_weekly_capacity <= 0.0 {
            return Err("default_weekly_capacity must be a positive number".into());
        }
        if self.notification_buffer == 0 {
            return Err("notification_buffer must be greater than 0".into());
        }
        if !self.redundant_write_kinds.is_empty() && self.redundant_write_delay_ms == 0 {
            return Err("redundant_write_delay_ms must be greater than 0 when redundant writes are enabled".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overridden by `PLANNER_*` variables, after loading `.env`
    /// if one exists.
    ///
    /// `PLANNER_REDUNDANT_WRITE_KINDS` is a comma-separated list such as
    /// `provider,option`; an empty value disables redundant writes.
    pub fn from_env() -> Result<Self, String> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(format!("failed to load .env: {e}"));
            }
        }
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Defaults overridden through a variable lookup, e.g. a map in tests.
    pub fn from_vars<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut cfg = Self::default();
        if let Some(v) = var("DEBOUNCE_MS") {
            cfg.debounce_ms = parse_var("DEBOUNCE_MS", &v)?;
        }
        if let Some(v) = var("LOOP_GUARD_WINDOW_MS") {
            cfg.loop_guard_window_ms = parse_var("LOOP_GUARD_WINDOW_MS", &v)?;
        }
        if let Some(v) = var("REDUNDANT_WRITE_DELAY_MS") {
            cfg.redundant_write_delay_ms = parse_var("REDUNDANT_WRITE_DELAY_MS", &v)?;
        }
        if let Some(v) = var("REDUNDANT_WRITE_KINDS") {
            cfg.redundant_write_kinds = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    serde_json::from_value::<EntityKind>(serde_json::Value::String(s.to_string()))
                        .map_err(|_| format!("unknown entity kind `{s}` in REDUNDANT_WRITE_KINDS"))
                })
                .collect::<Result<_, _>>()?;
        }
        if let Some(v) = var("DEFAULT_WEEKLY_CAPACITY") {
            cfg.default_weekly_capacity = parse_var("DEFAULT_WEEKLY_CAPACITY", &v)?;
        }
        if let Some(v) = var("NOTIFICATION_BUFFER") {
            cfg.notification_buffer = parse_var("NOTIFICATION_BUFFER", &v)?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Session settings derived from this configuration.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            debounce: Duration::from_millis(self.debounce_ms),
            default_weekly_capacity: self.default_weekly_capacity,
            gateway: GatewaySettings {
                redundant_write_kinds: self.redundant_write_kinds.clone(),
                redundant_write_delay: Duration::from_millis(self.redundant_write_delay_ms),
            },
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| format!("{ENV_PREFIX}{name}: {e}"))
}
