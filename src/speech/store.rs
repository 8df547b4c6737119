//! Clip cache storage.
//!
//! [`ClipStore`] is the string-keyed key-value store behind the clip cache.
//! Keys are the exact spoken text; entries are never evicted.
//!
//! [`JsonClipStore`] persists the whole map as JSON after every insert so
//! clips survive restarts:
//!
//! | Platform | Path |
//! |----------|------|
//! | Windows  | `%LOCALAPPDATA%\flashcard-listener\clip-cache.json` |
//! | macOS    | `~/Library/Application Support/flashcard-listener/clip-cache.json` |
//! | Linux    | `~/.local/share/flashcard-listener/clip-cache.json` |

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::speech::clip::Clip;

// ---------------------------------------------------------------------------
// ClipStore trait
// ---------------------------------------------------------------------------

/// Durable text → clip map shared by every listening session.
pub trait ClipStore: Send + Sync {
    fn get(&self, text: &str) -> Option<Clip>;

    /// Insert or replace the clip for `text`.
    fn put(&self, text: &str, clip: Clip);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// MemoryClipStore
// ---------------------------------------------------------------------------

/// Process-local store; contents are lost on exit.
#[derive(Default)]
pub struct MemoryClipStore {
    entries: Mutex<HashMap<String, Clip>>,
}

impl MemoryClipStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClipStore for MemoryClipStore {
    fn get(&self, text: &str) -> Option<Clip> {
        self.entries.lock().unwrap().get(text).cloned()
    }

    fn put(&self, text: &str, clip: Clip) {
        self.entries.lock().unwrap().insert(text.to_string(), clip);
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

// ---------------------------------------------------------------------------
// JsonClipStore
// ---------------------------------------------------------------------------

/// Store persisted as a single JSON object `{ "<text>": "<base64>", ... }`.
pub struct JsonClipStore {
    entries: Mutex<HashMap<String, Clip>>,
    path: PathBuf,
}

impl JsonClipStore {
    /// Open the store at `path`.  A missing or unreadable file yields an
    /// empty store; it is overwritten on the first insert.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::load_entries(&path);
        log::debug!(
            "clip cache: {} clips loaded from {}",
            entries.len(),
            path.display()
        );
        Self {
            entries: Mutex::new(entries),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_entries(path: &Path) -> HashMap<String, Clip> {
        if !path.exists() {
            return HashMap::new();
        }
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("clip cache: cannot read {}: {e}", path.display());
                return HashMap::new();
            }
        };
        serde_json::from_str(&data).unwrap_or_else(|e| {
            log::warn!("clip cache: {} is corrupt ({e}); starting empty", path.display());
            HashMap::new()
        })
    }

    /// Write `entries` to a sibling temp file, then rename over the cache so
    /// a crash mid-write never leaves a truncated cache behind.
    fn save(&self, entries: &HashMap<String, Clip>) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)
    }
}

impl ClipStore for JsonClipStore {
    fn get(&self, text: &str) -> Option<Clip> {
        self.entries.lock().unwrap().get(text).cloned()
    }

    fn put(&self, text: &str, clip: Clip) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(text.to_string(), clip);
        if let Err(e) = self.save(&entries) {
            // The clip stays usable in memory for this run.
            log::warn!("clip cache: failed to persist {}: {e}", self.path.display());
        }
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
