//! TOML-based application configuration.
//!
//! Stores:
//! - The canonical reference timezone used for every calendar-day computation
//! - Session lifecycle policy (staleness, streak threshold, overnight handling)
//! - Notification settings
//! - Storage tuning
//!
//! Configuration is stored at `~/.config/focusroom/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::calendar::CanonicalZone;
use crate::error::ConfigError;
use crate::session::OvernightPolicy;

/// Calendar configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Offset of the canonical timezone, e.g. "+09:00". Never host-local time.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: u32,
    /// Minimum minutes a completed session needs to count toward the streak.
    #[serde(default = "default_min_streak_minutes")]
    pub min_streak_minutes: u32,
    #[serde(default = "default_planned_minutes")]
    pub default_planned_minutes: u32,
    #[serde(default)]
    pub overnight_policy: OvernightPolicy,
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// When set, celebrations are POSTed here as JSON.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Overrides `~/.config/focusroom/focusroom.db`.
    #[serde(default)]
    pub database_path: Option<String>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/focusroom/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

// Default functions
fn default_utc_offset() -> String {
    "+00:00".into()
}
fn default_stale_after_hours() -> u32 {
    24
}
fn default_min_streak_minutes() -> u32 {
    15
}
fn default_planned_minutes() -> u32 {
    25
}
fn default_true() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    3
}
fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            utc_offset: default_utc_offset(),
        }
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            stale_after_hours: default_stale_after_hours(),
            min_streak_minutes: default_min_streak_minutes(),
            default_planned_minutes: default_planned_minutes(),
            overnight_policy: OvernightPolicy::default(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_busy_timeout_ms(),
            database_path: None,
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    // Optional strings are null until set; "none" clears them again.
                    serde_json::Value::Null if value.eq_ignore_ascii_case("none") => {
                        serde_json::Value::Null
                    }
                    serde_json::Value::String(_) if value.eq_ignore_ascii_case("none") => {
                        serde_json::Value::Null
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Location of the config file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there if the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Reject values that parse but cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.zone()?;
        if self.sessions.stale_after_hours == 0 {
            return Err(ConfigError::InvalidValue {
                key: "sessions.stale_after_hours".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// The canonical reference timezone.
    pub fn zone(&self) -> Result<CanonicalZone, ConfigError> {
        CanonicalZone::parse(&self.calendar.utc_offset)
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.calendar.utc_offset, "+00:00");
        assert_eq!(parsed.sessions.min_streak_minutes, 15);
        assert_eq!(parsed.sessions.overnight_policy, OvernightPolicy::Block);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let parsed: Config = toml::from_str("[calendar]\nutc_offset = \"+09:00\"\n").unwrap();
        assert_eq!(parsed.sessions.stale_after_hours, 24);
        assert_eq!(parsed.notifications.timeout_secs, 3);
        assert_eq!(parsed.zone().unwrap().offset().local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("sessions.stale_after_hours").as_deref(), Some("24"));
        assert_eq!(cfg.get("calendar.utc_offset").as_deref(), Some("+00:00"));
        assert_eq!(cfg.get("sessions.overnight_policy").as_deref(), Some("block"));
        assert!(cfg.get("sessions.missing_key").is_none());
    }

    #[test]
    fn set_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.set("notifications.enabled", "false").unwrap();
        cfg.set("sessions.min_streak_minutes", "20").unwrap();
        cfg.set("calendar.utc_offset", "-05:00").unwrap();
        cfg.set("sessions.overnight_policy", "close").unwrap();
        assert!(!cfg.notifications.enabled);
        assert_eq!(cfg.sessions.min_streak_minutes, 20);
        assert_eq!(cfg.sessions.overnight_policy, OvernightPolicy::Close);
        assert_eq!(cfg.zone().unwrap().offset().local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn optional_strings_can_be_set_and_cleared() {
        let mut cfg = Config::default();
        cfg.set("notifications.webhook_url", "https://hooks.example.com/x")
            .unwrap();
        assert_eq!(
            cfg.notifications.webhook_url.as_deref(),
            Some("https://hooks.example.com/x")
        );
        cfg.set("notifications.webhook_url", "none").unwrap();
        assert!(cfg.notifications.webhook_url.is_none());
    }

    #[test]
    fn set_rejects_unknown_keys_and_bad_values() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("sessions.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(cfg.set("notifications.enabled", "maybe").is_err());
        assert!(cfg.set("calendar.utc_offset", "Europe/Paris").is_err());
        assert!(cfg.set("sessions.overnight_policy", "ignore").is_err());
        assert!(cfg.set("sessions.stale_after_hours", "0").is_err());
        assert_eq!(cfg.calendar.utc_offset, "+00:00");
    }

    #[test]
    fn load_from_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.sessions.default_planned_minutes, 25);

        let mut edited = cfg.clone();
        edited.set("sessions.default_planned_minutes", "50").unwrap();
        edited.save_to(&path).unwrap();
        assert_eq!(
            Config::load_from(&path).unwrap().sessions.default_planned_minutes,
            50
        );
    }

    #[test]
    fn load_from_rejects_invalid_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[calendar]\nutc_offset = \"local\"\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
