//! Cache directory utilities.
//!
//! The cache directory holds the IPC socket and, unless configured otherwise,
//! the store snapshot. It is `~/Library/Caches/rxdesk/` on macOS and
//! `$XDG_CACHE_HOME/rxdesk/` on Linux, with `/tmp/rxdesk/` as a fallback.

use std::path::PathBuf;

use crate::constants::APP_ID;

/// File name of the default store snapshot.
const STORE_FILENAME: &str = "store.json";

/// Returns the root cache directory for the application.
#[must_use]
pub fn get_cache_dir() -> PathBuf {
    dirs::cache_dir().map_or_else(|| PathBuf::from(format!("/tmp/{APP_ID}")), |cache| cache.join(APP_ID))
}

/// Returns the store snapshot path used when none is configured.
#[must_use]
pub fn default_store_path() -> PathBuf { get_cache_dir().join(STORE_FILENAME) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_cache_dir_ends_with_app_id() {
        let dir = get_cache_dir();
        assert!(dir.ends_with(APP_ID));
    }

    #[test]
    fn test_default_store_path_is_inside_cache_dir() {
        let path = default_store_path();
        assert!(path.starts_with(get_cache_dir()));
        assert!(path.to_string_lossy().ends_with("store.json"));
    }
}
