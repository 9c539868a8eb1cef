//! # orion-settings
//!
//! Configuration for the Orion chat client, loaded in three layers
//! (in priority order):
//! 1. **Compiled defaults**: [`ChatSettings::default()`]
//! 2. **User file**: `~/.orion/chat.json` (deep-merged over defaults)
//! 3. **Environment variables**: `ORION_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

static SETTINGS: OnceLock<ChatSettings> = OnceLock::new();

/// Get the global settings instance, loading it on first access.
///
/// Falls back to compiled defaults if loading fails.
pub fn get_settings() -> &'static ChatSettings {
    SETTINGS.get_or_init(|| load_settings().unwrap_or_default())
}

/// Initialize the global settings with a specific value.
///
/// Returns the settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: ChatSettings) -> std::result::Result<(), ChatSettings> {
    SETTINGS.set(settings)
}
