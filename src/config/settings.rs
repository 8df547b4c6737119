//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section is `#[serde(default)]`, so a partial `settings.toml` only
//! overrides the keys it names.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// Settings for the remote speech-synthesis endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// When `false` no speech requests are made and sessions skip through
    /// cards silently.
    pub enabled: bool,
    /// Base URL of the flashcard app serving `/api/tts/speak`.
    pub base_url: String,
    /// Bearer token: `None` when the endpoint is unauthenticated.
    pub api_key: Option<String>,
    /// Spreadsheet id forwarded to the endpoint for server-side clip caching.
    pub spreadsheet_id: Option<String>,
    /// Worksheet gid forwarded alongside `spreadsheet_id`.
    pub sheet_gid: Option<String>,
    /// Maximum seconds to wait for one clip.
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:5000".into(),
            api_key: None,
            spreadsheet_id: None,
            sheet_gid: None,
            timeout_secs: 15,
        }
    }
}

// ---------------------------------------------------------------------------
// ContentConfig
// ---------------------------------------------------------------------------

/// Where card sets are loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ContentSource {
    /// The flashcard app's `/api/cards/<name>` endpoint.
    Http,
    /// `<cards_dir>/<name>.json` on the local filesystem.
    File,
}

impl Default for ContentSource {
    fn default() -> Self {
        Self::Http
    }
}

/// Settings for the card-set content provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub source: ContentSource,
    /// Base URL used when `source == Http`.
    pub base_url: String,
    pub api_key: Option<String>,
    /// Directory used when `source == File`.  `None` means
    /// [`AppPaths::card_sets_dir`].
    pub cards_dir: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            source: ContentSource::default(),
            base_url: "http://localhost:5000".into(),
            api_key: None,
            cards_dir: None,
            timeout_secs: 30,
        }
    }
}

impl ContentConfig {
    /// Directory the file provider reads from.
    pub fn resolved_cards_dir(&self) -> PathBuf {
        self.cards_dir
            .clone()
            .unwrap_or_else(|| AppPaths::new().card_sets_dir)
    }
}

// ---------------------------------------------------------------------------
// ListeningConfig
// ---------------------------------------------------------------------------

/// Timing of the listening-mode play loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListeningConfig {
    /// Delay between the end of one card and the start of the next.  Also
    /// used after a card is skipped because of an error.
    pub card_gap_ms: u64,
    /// Pause between a card's word clip and its example clip.
    pub example_gap_ms: u64,
    /// Fetch the next card's clips while the current card plays.
    pub prefetch: bool,
}

impl Default for ListeningConfig {
    fn default() -> Self {
        Self {
            card_gap_ms: 800,
            example_gap_ms: 300,
            prefetch: true,
        }
    }
}

impl ListeningConfig {
    pub fn card_gap(&self) -> Duration {
        Duration::from_millis(self.card_gap_ms)
    }

    pub fn example_gap(&self) -> Duration {
        Duration::from_millis(self.example_gap_ms)
    }
}

// ---------------------------------------------------------------------------
// PlaybackConfig
// ---------------------------------------------------------------------------

/// Which playback engine the CLI builds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PlaybackOutput {
    /// No sound; each clip "plays" for `silent_clip_ms`.
    Silent,
    /// The default audio output device (requires the `audio-out` feature).
    Device,
}

impl Default for PlaybackOutput {
    fn default() -> Self {
        Self::Device
    }
}

/// Audio output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub output: PlaybackOutput,
    /// Simulated clip length for [`PlaybackOutput::Silent`].
    pub silent_clip_ms: u64,
    /// Output volume (0.0 – 1.0).
    pub volume: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            output: PlaybackOutput::default(),
            silent_clip_ms: 1_000,
            volume: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// CacheConfig
// ---------------------------------------------------------------------------

/// Clip cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Persist clips to `clip-cache.json` so they survive restarts.
    pub persist: bool,
    /// Override for the cache file location.
    pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            persist: true,
            path: None,
        }
    }
}

impl CacheConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppPaths::new().clip_cache_file)
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use flashcard_listener::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub speech: SpeechConfig,
    pub content: ContentConfig,
    pub listening: ListeningConfig,
    pub playback: PlaybackConfig,
    pub cache: CacheConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
