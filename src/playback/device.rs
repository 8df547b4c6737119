//! Audio-device playback through `rodio` (feature `audio-out`).
//!
//! `rodio::OutputStream` is not `Send`, so it is created and kept alive on a
//! dedicated `audio-output` thread; the engine only holds the `Send + Sync`
//! stream handle.  The thread exits when the engine is dropped.

use std::io::Cursor;
use std::sync::{mpsc, Arc, Mutex};

use async_trait::async_trait;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

use crate::playback::engine::{PlaybackEngine, PlaybackError};
use crate::speech::Clip;

pub struct DeviceEngine {
    handle: OutputStreamHandle,
    volume: f32,
    current: Mutex<Option<Arc<Sink>>>,
    // Dropping the sender releases the output thread.
    _keepalive: mpsc::Sender<()>,
}

impl DeviceEngine {
    /// Open the default output device.
    pub fn open(volume: f32) -> Result<Self, PlaybackError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<OutputStreamHandle, String>>();
        let (keepalive_tx, keepalive_rx) = mpsc::channel::<()>();

        std::thread::Builder::new()
            .name("audio-output".into())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    let _ = ready_tx.send(Ok(handle));
                    // Blocks until the engine (and its sender) is dropped.
                    let _ = keepalive_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                }
            })
            .map_err(|e| PlaybackError::Device(e.to_string()))?;

        let handle = ready_rx
            .recv()
            .map_err(|e| PlaybackError::Device(e.to_string()))?
            .map_err(PlaybackError::Device)?;

        log::info!("audio output opened");

        Ok(Self {
            handle,
            volume: volume.clamp(0.0, 1.0),
            current: Mutex::new(None),
            _keepalive: keepalive_tx,
        })
    }
}

#[async_trait]
impl PlaybackEngine for DeviceEngine {
    async fn play(&self, clip: &Clip) -> Result<(), PlaybackError> {
        let bytes = clip
            .decode()
            .map_err(|e| PlaybackError::Decode(e.to_string()))?;
        let source =
            Decoder::new(Cursor::new(bytes)).map_err(|e| PlaybackError::Decode(e.to_string()))?;

        let sink =
            Arc::new(Sink::try_new(&self.handle).map_err(|e| PlaybackError::Device(e.to_string()))?);
        sink.set_volume(self.volume);

        // Register before any sound starts, so `stop_current` or dropping
        // this future always reaches the sink.
        if let Some(previous) = self.current.lock().unwrap().replace(Arc::clone(&sink)) {
            previous.stop();
        }
        let registered = Registered {
            slot: &self.current,
            sink: Arc::clone(&sink),
        };
        sink.append(source);

        let waiter = Arc::clone(&sink);
        tokio::task::spawn_blocking(move || waiter.sleep_until_end())
            .await
            .map_err(|e| PlaybackError::Device(e.to_string()))?;

        // Still registered → finished naturally; otherwise someone stopped it.
        if registered.is_current() {
            Ok(())
        } else {
            Err(PlaybackError::Interrupted)
        }
    }

    fn stop_current(&self) {
        if let Some(sink) = self.current.lock().unwrap().take() {
            sink.stop();
        }
    }
}

/// Stops and unregisters a sink when its `play` finishes or is dropped.
struct Registered<'a> {
    slot: &'a Mutex<Option<Arc<Sink>>>,
    sink: Arc<Sink>,
}

impl Registered<'_> {
    fn is_current(&self) -> bool {
        self.slot
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|s| Arc::ptr_eq(s, &self.sink))
    }
}

impl Drop for Registered<'_> {
    fn drop(&mut self) {
        let mut current = self.slot.lock().unwrap();
        if current.as_ref().is_some_and(|s| Arc::ptr_eq(s, &self.sink)) {
            *current = None;
            self.sink.stop();
        }
    }
}
