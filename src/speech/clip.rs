//! Encoded audio clips.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// A synthesized speech clip, held in the base64 form the speech endpoint
/// returns and the clip cache persists.
///
/// Cloning is cheap; the payload is shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Clip {
    audio_base64: Arc<str>,
}

impl Clip {
    pub fn from_base64(audio_base64: impl Into<Arc<str>>) -> Self {
        Self {
            audio_base64: audio_base64.into(),
        }
    }

    pub fn from_bytes(audio: &[u8]) -> Self {
        Self::from_base64(BASE64.encode(audio))
    }

    pub fn as_base64(&self) -> &str {
        &self.audio_base64
    }

    /// Decode the payload into raw audio bytes (MP3 from the speech endpoint).
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(self.audio_base64.as_bytes())
    }

    pub fn is_empty(&self) -> bool {
        self.audio_base64.is_empty()
    }
}
