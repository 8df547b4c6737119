//! Where the listener keeps its files.
//!
//! Settings live under the platform config dir, the clip cache and local
//! card sets under the local data dir, each in a `flashcard-listener`
//! subdirectory (e.g. `~/.config/flashcard-listener/settings.toml` and
//! `~/.local/share/flashcard-listener/clip-cache.json` on Linux).

use std::path::{Path, PathBuf};

const APP_DIR: &str = "flashcard-listener";

/// Resolved file locations.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub settings_file: PathBuf,
    pub clip_cache_file: PathBuf,
    /// Searched by the file content provider when `content.cards_dir` is unset.
    pub card_sets_dir: PathBuf,
}

impl AppPaths {
    /// Platform locations from `dirs`; the current directory stands in for
    /// any the platform does not define.
    pub fn new() -> Self {
        let here = || PathBuf::from(".");
        Self::under(
            &dirs::config_dir().unwrap_or_else(here),
            &dirs::data_local_dir().unwrap_or_else(here),
        )
    }

    /// Lay the listener's files out beneath the given config and data roots.
    pub fn under(config_root: &Path, data_root: &Path) -> Self {
        let data = data_root.join(APP_DIR);
        Self {
            settings_file: config_root.join(APP_DIR).join("settings.toml"),
            clip_cache_file: data.join("clip-cache.json"),
            card_sets_dir: data.join("card-sets"),
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
