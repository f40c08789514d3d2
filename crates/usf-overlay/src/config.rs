//! Overlay configuration.
//!
//! Persisted as a JSON file next to the host's other settings. Every key
//! is optional; missing keys take their default.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::OverlayError;

/// Configuration for the overlay service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OverlayConfig {
    /// Show chat above player heads by rewriting the display name instead
    /// of decorating the chat line (default: `false`).
    pub chat_above_heads: bool,
    /// Display name template for above-heads mode. Placeholders:
    /// `{group}`, `{prefix}`, `{name}`, `{suffix}` or positionally
    /// `{0}`..`{3}` in the same order.
    pub chat_above_heads_format: String,
    /// Chat lines starting with this are commands and are not formatted.
    pub command_specifier: String,
    /// Silent command marker, also excluded from formatting.
    pub command_silent_specifier: String,
    /// Permission required to chat at all.
    pub chat_permission: String,
    /// Upper bound for the record lookup made at login, in milliseconds
    /// (default: 2000).
    pub lookup_timeout_ms: u64,
    /// How many times the display name restore is broadcast before giving
    /// up (default: 3).
    pub restore_attempts: u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            chat_above_heads: false,
            chat_above_heads_format: "{group}{prefix}{name}{suffix}".into(),
            command_specifier: "/".into(),
            command_silent_specifier: ".".into(),
            chat_permission: "tshock.canchat".into(),
            lookup_timeout_ms: 2000,
            restore_attempts: 3,
        }
    }
}

impl OverlayConfig {
    /// Read the configuration at `path`, or the defaults when the file
    /// does not exist yet.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, OverlayError> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No overlay config found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), OverlayError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), OverlayError> {
        if self.command_specifier.is_empty() || self.command_silent_specifier.is_empty() {
            return Err(OverlayError::Config(
                "command specifiers must not be empty".into(),
            ));
        }
        if self.chat_permission.trim().is_empty() {
            return Err(OverlayError::Config("chatPermission must not be empty".into()));
        }
        Ok(())
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("usf-{}-{name}.json", std::process::id()))
    }

    #[test]
    fn missing_keys_take_defaults() {
        let config: OverlayConfig = serde_json::from_str(r#"{"chatAboveHeads": true}"#).unwrap();
        assert!(config.chat_above_heads);
        assert_eq!(config.command_specifier, "/");
        assert_eq!(config.lookup_timeout(), Duration::from_millis(2000));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let path = temp_path("missing");
        let _ = fs::remove_file(&path);
        assert_eq!(OverlayConfig::load(&path).unwrap(), OverlayConfig::default());
    }

    #[test]
    fn save_then_load_keeps_values() {
        let path = temp_path("roundtrip");
        let config = OverlayConfig {
            chat_above_heads: true,
            chat_above_heads_format: "{1}{2}".into(),
            ..Default::default()
        };
        config.save(&path).unwrap();
        let loaded = OverlayConfig::load(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn empty_command_specifier_is_rejected() {
        let config = OverlayConfig {
            command_specifier: String::new(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(OverlayError::Config(_))));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = temp_path("malformed");
        fs::write(&path, "{ not json").unwrap();
        let result = OverlayConfig::load(&path);
        let _ = fs::remove_file(&path);
        assert!(matches!(result, Err(OverlayError::Json(_))));
    }
}
