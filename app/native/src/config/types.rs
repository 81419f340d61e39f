//! Configuration types for rxdesk.
//!
//! The configuration file supports JSONC format (JSON with comments).
//! Both single-line (`//`) and multi-line (`/* */`) comments are allowed.
//! Every field is optional; a missing file behaves like `{}`.

use std::fs;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constants::{
    APP_ID, DEFAULT_RENDER_TIMEOUT_MS, DEFAULT_RESIZE_DEBOUNCE_MS, MINIMUM_WINDOW_HEIGHT,
    MINIMUM_WINDOW_WIDTH,
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct RxdeskConfig {
    /// Where documents are kept.
    pub storage: StorageConfig,

    /// Debounce and render deadlines.
    pub timing: TimingConfig,

    /// Window constraints.
    pub window: WindowConfig,

    /// Default log filter, e.g. `"debug"` or `"rxdesk_lib=trace"`.
    /// The `RXDESK_LOG` environment variable takes precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// Document storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageConfig {
    /// Path of the store snapshot file.
    /// Defaults to `store.json` inside the cache directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl StorageConfig {
    /// Returns the configured path with a leading `~` expanded.
    #[must_use]
    pub fn resolved_path(&self) -> Option<PathBuf> {
        let raw = self.path.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        if let Some(rest) = raw.strip_prefix("~/") {
            return dirs::home_dir().map(|home| home.join(rest));
        }
        Some(PathBuf::from(raw))
    }
}

/// Timing settings, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct TimingConfig {
    /// Quiet period after the last native resize before the size is stored.
    pub resize_debounce_ms: u64,

    /// How long a window may take to render its card.
    pub render_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            resize_debounce_ms: DEFAULT_RESIZE_DEBOUNCE_MS,
            render_timeout_ms: DEFAULT_RENDER_TIMEOUT_MS,
        }
    }
}

/// Window constraints, in pixels.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct WindowConfig {
    /// Smallest width a card window can be given.
    pub min_width: i32,

    /// Smallest height a card window can be given.
    pub min_height: i32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            min_width: MINIMUM_WINDOW_WIDTH,
            min_height: MINIMUM_WINDOW_HEIGHT,
        }
    }
}

/// Errors that can occur when loading the configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// No configuration file was found in any of the expected locations.
    NotFound,
    /// The configuration file exists but could not be read.
    IoError(std::io::Error),
    /// The configuration file contains invalid JSON.
    ParseError(serde_json::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(
                f,
                "No configuration file found. Expected at ~/.config/rxdesk/config.jsonc \
                or ~/.rxdesk.jsonc"
            ),
            Self::IoError(err) => write!(f, "Failed to read configuration file: {err}"),
            Self::ParseError(err) => write!(f, "Failed to parse configuration file: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(err) => Some(err),
            Self::ParseError(err) => Some(err),
            Self::NotFound => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self { Self::IoError(err) }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self { Self::ParseError(err) }
}

/// Configuration file names to search for (in priority order).
const CONFIG_FILE_NAMES: &[&str] = &["config.jsonc", "config.json"];

/// Dotfile names in the home directory.
const HOME_CONFIG_FILE_NAMES: &[&str] = &[".rxdesk.jsonc", ".rxdesk.json"];

/// Returns the possible configuration file paths in priority order.
///
/// 1. `$XDG_CONFIG_HOME/rxdesk/config.jsonc` or `config.json`, if set
/// 2. `~/.config/rxdesk/config.jsonc` or `config.json`
/// 3. The platform config directory, e.g. `~/Library/Application Support/rxdesk/`
/// 4. `~/.rxdesk.jsonc` or `~/.rxdesk.json`
#[must_use]
pub fn config_paths() -> Vec<PathBuf> {
    fn push_dir(dir: &Path, paths: &mut Vec<PathBuf>) {
        for filename in CONFIG_FILE_NAMES {
            let path = dir.join(filename);
            // XDG_CONFIG_HOME may be ~/.config
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }

    let mut paths = Vec::new();

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        push_dir(&PathBuf::from(xdg_config).join(APP_ID), &mut paths);
    }

    if let Some(home) = dirs::home_dir() {
        push_dir(&home.join(".config").join(APP_ID), &mut paths);
    }

    if let Some(config_dir) = dirs::config_dir() {
        push_dir(&config_dir.join(APP_ID), &mut paths);
    }

    if let Some(home) = dirs::home_dir() {
        for filename in HOME_CONFIG_FILE_NAMES {
            paths.push(home.join(filename));
        }
    }

    paths
}

/// Loads the configuration from the first available config file.
///
/// # Errors
///
/// Returns `ConfigError::NotFound` if no configuration file exists in any of the expected locations.
/// Returns `ConfigError::IoError` if a configuration file exists but could not be read.
/// Returns `ConfigError::ParseError` if the configuration file contains invalid JSON.
pub fn load_config() -> Result<(RxdeskConfig, PathBuf), ConfigError> {
    for path in config_paths() {
        if path.exists() {
            return load_config_from_path(&path);
        }
    }

    Err(ConfigError::NotFound)
}

/// Loads the configuration from a specific file.
///
/// # Errors
///
/// Returns `ConfigError::NotFound` if the file does not exist, and the same
/// read and parse errors as [`load_config`].
pub fn load_config_from_path(path: &Path) -> Result<(RxdeskConfig, PathBuf), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound);
    }
    let file = fs::File::open(path)?;
    let reader = json_comments::StripComments::new(file);
    let config: RxdeskConfig = serde_json::from_reader(reader)?;
    Ok((config, path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config_uses_built_in_timings() {
        let config = RxdeskConfig::default();
        assert_eq!(config.timing.resize_debounce_ms, 1000);
        assert_eq!(config.timing.render_timeout_ms, 10_000);
        assert_eq!(config.window.min_width, 185);
        assert_eq!(config.window.min_height, 80);
        assert!(config.storage.path.is_none());
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let json = r#"{ "timing": { "resizeDebounceMs": 250 } }"#;
        let config: RxdeskConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.timing.resize_debounce_ms, 250);
        assert_eq!(config.timing.render_timeout_ms, 10_000);
        assert_eq!(config.window.min_width, 185);
    }

    #[test]
    fn test_config_from_jsonc_file() {
        let mut file = tempfile::Builder::new().suffix(".jsonc").tempfile().unwrap();
        writeln!(
            file,
            r#"{{
                // where the notes live
                "storage": {{ "path": "/tmp/notes.json" }},
                /* tighter windows */
                "window": {{ "minWidth": 100, "minHeight": 50 }},
                "logLevel": "debug"
            }}"#
        )
        .unwrap();

        let (config, path) = load_config_from_path(file.path()).unwrap();
        assert_eq!(path, file.path());
        assert_eq!(config.storage.resolved_path(), Some(PathBuf::from("/tmp/notes.json")));
        assert_eq!(config.window.min_width, 100);
        assert_eq!(config.window.min_height, 50);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{ not json").unwrap();
        let result = load_config_from_path(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config_from_path(&dir.path().join("absent.jsonc"));
        assert!(matches!(result, Err(ConfigError::NotFound)));
    }

    #[test]
    fn test_blank_storage_path_resolves_to_none() {
        let storage = StorageConfig { path: Some("  ".to_string()) };
        assert_eq!(storage.resolved_path(), None);
    }

    #[test]
    fn test_config_paths_are_not_empty() {
        let paths = config_paths();
        assert!(!paths.is_empty() || std::env::var("HOME").is_err());
    }

    #[test]
    fn test_config_error_display() {
        let msg = ConfigError::NotFound.to_string();
        assert!(msg.contains("No configuration file found"));
    }
}
