//! Settings loading with deep merge and environment variable overrides.
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::ChatSettings;

/// Resolve the path to the settings file (`~/.orion/chat.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".orion").join("chat.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ChatSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON or out-of-range values are
/// errors.
pub fn load_settings_from_path(path: &Path) -> Result<ChatSettings> {
    let defaults = serde_json::to_value(ChatSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: ChatSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `ORION_*` environment variable overrides.
///
/// Invalid values are ignored with a warning (file/default value stays).
pub fn apply_env_overrides(settings: &mut ChatSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Override logic with an injectable lookup so it can be tested without
/// touching the process environment.
pub fn apply_overrides(settings: &mut ChatSettings, lookup: impl Fn(&str) -> Option<String>) {
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let millis = |name: &str| {
        let val = lookup(name)?;
        let parsed = parse_u64_range(&val, 0, 600_000);
        if parsed.is_none() {
            tracing::warn!(key = name, value = %val, "invalid millisecond env var, ignoring");
        }
        parsed
    };
    let capacity = |name: &str| {
        let val = lookup(name)?;
        let parsed = parse_usize_range(&val, 1, 1 << 20);
        if parsed.is_none() {
            tracing::warn!(key = name, value = %val, "invalid capacity env var, ignoring");
        }
        parsed
    };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = string("ORION_WS_URL") {
        settings.server.ws_url = v;
    }
    if let Some(v) = string("ORION_BASE_URL") {
        settings.server.base_url = v;
    }
    if let Some(v) = millis("ORION_REQUEST_TIMEOUT_MS") {
        settings.server.request_timeout_ms = v;
    }

    // ── Timing ──────────────────────────────────────────────────────
    if let Some(v) = millis("ORION_TIMELINE_BATCH_MS") {
        settings.timing.timeline_batch_ms = v;
    }
    if let Some(v) = millis("ORION_ROSTER_SAMPLE_MS") {
        settings.timing.roster_sample_ms = v;
    }
    if let Some(v) = millis("ORION_UPLOAD_PROGRESS_THROTTLE_MS") {
        settings.timing.upload_progress_throttle_ms = v;
    }
    if let Some(v) = millis("ORION_HISTORY_DEBOUNCE_MS") {
        settings.timing.history_debounce_ms = v;
    }
    if let Some(v) = millis("ORION_NICK_DEBOUNCE_MS") {
        settings.timing.nick_debounce_ms = v;
    }

    // ── Channel ─────────────────────────────────────────────────────
    if let Some(v) = capacity("ORION_INBOUND_CAPACITY") {
        settings.channel.inbound_capacity = v;
    }
    if let Some(v) = capacity("ORION_OUTBOUND_CAPACITY") {
        settings.channel.outbound_capacity = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = string("ORION_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = lookup("ORION_LOG_JSON") {
        match parse_bool(&v) {
            Some(b) => settings.logging.json = b,
            None => tracing::warn!(key = "ORION_LOG_JSON", value = %v, "invalid boolean env var, ignoring"),
        }
    }
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
