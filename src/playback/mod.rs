//! Clip playback.
//!
//! * [`PlaybackEngine`]: plays one clip to completion; `stop_current` halts it.
//! * [`SilentEngine`]: no-sound engine for dry runs.
//! * [`DeviceEngine`]: default audio device via `rodio` (feature `audio-out`).
//!
//! Mobile-browser style audio-unlock handshakes are not modelled: an engine
//! is assumed to be able to play as soon as it is constructed.

#[cfg(feature = "audio-out")]
pub mod device;
pub mod engine;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{PlaybackConfig, PlaybackOutput};

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

#[cfg(feature = "audio-out")]
pub use device::DeviceEngine;
pub use engine::{PlaybackEngine, PlaybackError, SilentEngine};

/// Build the engine selected in `config`, falling back to [`SilentEngine`]
/// when no audio device can be used.
pub fn engine_from_config(config: &PlaybackConfig) -> Arc<dyn PlaybackEngine> {
    let silent = || -> Arc<dyn PlaybackEngine> {
        Arc::new(SilentEngine::new(Duration::from_millis(config.silent_clip_ms)))
    };

    match config.output {
        PlaybackOutput::Silent => silent(),
        #[cfg(feature = "audio-out")]
        PlaybackOutput::Device => match DeviceEngine::open(config.volume) {
            Ok(engine) => Arc::new(engine),
            Err(e) => {
                log::warn!("audio output unavailable ({e}); playing silently");
                silent()
            }
        },
        #[cfg(not(feature = "audio-out"))]
        PlaybackOutput::Device => {
            log::warn!("built without the `audio-out` feature; playing silently");
            silent()
        }
    }
}
