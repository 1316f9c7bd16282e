//! Utility functions shared across the crate.

use std::path::PathBuf;

use crate::error::Result;
use crate::store::SledStore;

/// Get the user's config directory following XDG conventions.
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise `$HOME/.config`.
pub fn config_dir() -> Option<PathBuf> {
    xdg_dir("XDG_CONFIG_HOME", ".config")
}

/// Get the user's cache directory following XDG conventions.
pub fn cache_dir() -> Option<PathBuf> {
    xdg_dir("XDG_CACHE_HOME", ".cache")
}

fn xdg_dir(var: &str, home_relative: &str) -> Option<PathBuf> {
    std::env::var_os(var)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(home_relative)))
}

/// Default location of the on-disk description store
pub fn description_store_path() -> PathBuf {
    cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("invoicer")
        .join("descriptions")
}

/// Remove every stored description at `path` (or the default location).
///
/// A store that was never created counts as empty.
pub fn clear_description_store(path: Option<PathBuf>) -> Result<usize> {
    let store_path = path.unwrap_or_else(description_store_path);
    if !store_path.exists() {
        return Ok(0);
    }
    SledStore::new(&store_path)?.purge()
}
