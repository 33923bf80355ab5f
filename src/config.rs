//! Persisted settings: cascade tuning knobs, per-family token ceilings and
//! tokenizer initialization bounds.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::context::budget::{CascadeSettings, ProviderLimits};

/// Directory name under the platform config dir
const APP_IDENTIFIER: &str = "diffsqueeze";
const CONFIG_FILE: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Config directory not found")]
    NoConfigDir,
    #[error("Settings file already exists: {0}")]
    AlreadyExists(PathBuf),
}

impl Serialize for ConfigError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// User settings. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub cascade: CascadeSettings,
    pub limits: ProviderLimits,
    pub tokenizer_init_timeout_secs: u64,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cascade: CascadeSettings::default(),
            limits: ProviderLimits::default(),
            tokenizer_init_timeout_secs: 30,
            log_level: "warn".to_string(),
        }
    }
}

impl Settings {
    pub fn tokenizer_init_timeout(&self) -> Duration {
        Duration::from_secs(self.tokenizer_init_timeout_secs)
    }
}

/// Atomic write: write to a .tmp sibling then rename into place.
fn atomic_write(path: &Path, contents: &str) -> Result<(), ConfigError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Location of the settings file
pub fn get_config_path_cli() -> Result<PathBuf, ConfigError> {
    let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join(APP_IDENTIFIER).join(CONFIG_FILE))
}

/// Load settings from `path`; defaults when the file does not exist
pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No settings file, using defaults");
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(path)?;
    let settings: Settings = serde_json::from_str(&content)?;
    Ok(settings)
}

/// Save settings to `path`, creating parent directories
pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(settings)?;
    atomic_write(path, &content)?;
    Ok(())
}

/// Write `settings` to `path` unless a file is already there (or `overwrite`)
pub fn init_settings_at(path: &Path, settings: &Settings, overwrite: bool) -> Result<(), ConfigError> {
    if path.exists() && !overwrite {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }
    save_settings_to(path, settings)?;
    tracing::info!(path = %path.display(), "Wrote settings file");
    Ok(())
}

/// Load settings from the platform config directory
pub fn load_settings_cli() -> Result<Settings, ConfigError> {
    load_settings_from(&get_config_path_cli()?)
}

/// Create the settings file in the platform config directory
pub fn init_settings_cli(settings: &Settings, overwrite: bool) -> Result<PathBuf, ConfigError> {
    let path = get_config_path_cli()?;
    init_settings_at(&path, settings, overwrite)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ModelFamily;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.cascade.reserved_tokens, 600);
        assert_eq!(settings.tokenizer_init_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut settings = Settings::default();
        settings.cascade.max_key_changes = 8;
        settings.limits.set(&ModelFamily::Ollama, 4096);
        save_settings_to(&path, &settings).unwrap();

        let loaded = load_settings_from(&path).unwrap();
        assert_eq!(loaded, settings);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"cascade": {"reservedTokens": 1000}, "logLevel": "debug"}"#).unwrap();

        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.cascade.reserved_tokens, 1000);
        assert_eq!(settings.cascade.importance_threshold, 3);
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.limits, ProviderLimits::default());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_settings_from(&path), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_init_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diffsqueeze").join("config.json");

        init_settings_at(&path, &Settings::default(), false).unwrap();
        assert_eq!(load_settings_from(&path).unwrap(), Settings::default());

        let mut changed = Settings::default();
        changed.log_level = "debug".to_string();
        assert!(matches!(
            init_settings_at(&path, &changed, false),
            Err(ConfigError::AlreadyExists(_))
        ));
        assert_eq!(load_settings_from(&path).unwrap().log_level, "warn");

        init_settings_at(&path, &changed, true).unwrap();
        assert_eq!(load_settings_from(&path).unwrap().log_level, "debug");
    }
}
