//! Configuration module for rxdesk.
//!
//! The configuration is loaded once, lazily, from the first file found by
//! [`config_paths`] or from the path given with `--config`. A missing or broken
//! file is not fatal: the defaults are used and a warning is logged.

pub mod types;

use std::path::PathBuf;
use std::sync::OnceLock;

pub use types::{
    ConfigError, RxdeskConfig, StorageConfig, TimingConfig, WindowConfig, config_paths,
    load_config as load_config_default, load_config_from_path,
};

/// Global configuration instance, loaded once at startup.
static CONFIG: OnceLock<RxdeskConfig> = OnceLock::new();

/// Path to the currently loaded configuration file.
static CONFIG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Custom config path override (set via CLI --config flag).
static CUSTOM_CONFIG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Sets a custom configuration file path to use instead of the default search paths.
///
/// This must be called before `get_config()` to take effect.
///
/// # Returns
///
/// `true` if the path was set successfully, `false` if a path was already set.
pub fn set_custom_config_path(path: PathBuf) -> bool { CUSTOM_CONFIG_PATH.set(path).is_ok() }

fn load_or_default() -> RxdeskConfig {
    let result = CUSTOM_CONFIG_PATH
        .get()
        .map_or_else(load_config_default, |path| load_config_from_path(path));

    match result {
        Ok((config, path)) => {
            let _ = CONFIG_PATH.set(path);
            config
        }
        Err(ConfigError::NotFound) => RxdeskConfig::default(),
        Err(err) => {
            tracing::warn!(error = %err, "failed to load configuration, using defaults");
            RxdeskConfig::default()
        }
    }
}

/// Returns the global configuration instance, initializing it if necessary.
pub fn get_config() -> &'static RxdeskConfig { CONFIG.get_or_init(load_or_default) }

/// Returns the path to the loaded configuration file, if any.
pub fn get_config_path() -> Option<&'static PathBuf> { CONFIG_PATH.get() }

/// Returns the JSON Schema of the configuration file, pretty-printed.
#[must_use]
pub fn print_schema() -> String {
    let schema = schemars::schema_for!(RxdeskConfig);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string())
}
