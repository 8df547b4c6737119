//! Core `PlaybackEngine` trait and the silent engine.
//!
//! [`PlaybackEngine`] is the interface used by the listening controller.  It
//! is object-safe and `Send + Sync` so it can be held behind an
//! `Arc<dyn PlaybackEngine>`.
//!
//! [`SilentEngine`] validates clips and waits a fixed duration instead of
//! producing sound: used for dry runs and on machines without an output
//! device.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Notify;

use crate::speech::Clip;

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum PlaybackError {
    /// The clip payload is not valid base64 or not a decodable audio format.
    #[error("cannot decode clip: {0}")]
    Decode(String),

    /// The audio output device could not be opened or failed mid-clip.
    #[error("audio device error: {0}")]
    Device(String),

    /// [`PlaybackEngine::stop_current`] (or a newer `play`) cut the clip short.
    #[error("playback interrupted")]
    Interrupted,
}

// ---------------------------------------------------------------------------
// PlaybackEngine trait
// ---------------------------------------------------------------------------

/// Plays one clip at a time.
///
/// # Contract
///
/// - `play` resolves once the clip has finished playing.
/// - Starting a clip while another is active stops the previous one first;
///   the previous `play` then returns `Err(PlaybackError::Interrupted)`.
/// - `stop_current` is a no-op when nothing is playing.
/// - Dropping a `play` future before it resolves stops that clip and no
///   other, so callers may race `play` against their own cancellation.
#[async_trait]
pub trait PlaybackEngine: Send + Sync {
    async fn play(&self, clip: &Clip) -> Result<(), PlaybackError>;

    fn stop_current(&self);
}

// ---------------------------------------------------------------------------
// SilentEngine
// ---------------------------------------------------------------------------

/// Engine that makes no sound; each clip "plays" for `clip_duration`.
pub struct SilentEngine {
    clip_duration: Duration,
    current: Mutex<Option<Arc<Notify>>>,
}

impl SilentEngine {
    pub fn new(clip_duration: Duration) -> Self {
        Self {
            clip_duration,
            current: Mutex::new(None),
        }
    }
}

#[async_trait]
impl PlaybackEngine for SilentEngine {
    async fn play(&self, clip: &Clip) -> Result<(), PlaybackError> {
        let bytes = clip
            .decode()
            .map_err(|e| PlaybackError::Decode(e.to_string()))?;
        log::debug!("silent playback of {} byte clip", bytes.len());

        let stop = Arc::new(Notify::new());
        if let Some(previous) = self.current.lock().unwrap().replace(Arc::clone(&stop)) {
            previous.notify_one();
        }
        let _registered = Registered {
            slot: &self.current,
            stop: Arc::clone(&stop),
        };

        tokio::select! {
            _ = tokio::time::sleep(self.clip_duration) => Ok(()),
            _ = stop.notified() => Err(PlaybackError::Interrupted),
        }
    }

    fn stop_current(&self) {
        if let Some(current) = self.current.lock().unwrap().take() {
            // `notify_one` stores a permit, so a stop that lands before the
            // clip starts waiting still interrupts it.
            current.notify_one();
        }
    }
}

/// Unregisters a clip when its `play` finishes or is dropped.
struct Registered<'a> {
    slot: &'a Mutex<Option<Arc<Notify>>>,
    stop: Arc<Notify>,
}

impl Drop for Registered<'_> {
    fn drop(&mut self) {
        let mut current = self.slot.lock().unwrap();
        if current.as_ref().is_some_and(|n| Arc::ptr_eq(n, &self.stop)) {
            *current = None;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
