//! Core `SpeechSynthesizer` trait and its HTTP implementation.
//!
//! `HttpSynthesizer` calls the flashcard app's `POST /api/tts/speak`, which
//! answers with base64 MP3 audio.  All connection details come from
//! [`SpeechConfig`]; nothing is hardcoded.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::SpeechConfig;
use crate::speech::clip::Clip;

// ---------------------------------------------------------------------------
// SpeechError
// ---------------------------------------------------------------------------

/// Errors that can occur while synthesizing a clip.
///
/// `Clone` so one failed fetch can be handed to every caller waiting on it.
#[derive(Debug, Clone, Error)]
pub enum SpeechError {
    /// Speech is switched off in the configuration.
    #[error("speech synthesis is disabled")]
    Disabled,

    #[error("no text to synthesize")]
    EmptyText,

    /// HTTP transport or connection error.
    #[error("speech request failed: {0}")]
    Request(String),

    #[error("speech request timed out")]
    Timeout,

    /// The endpoint answered but reported a failure.
    #[error("speech endpoint error: {0}")]
    Endpoint(String),

    /// The response could not be parsed or carried no audio.
    #[error("invalid speech response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for SpeechError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SpeechError::Timeout
        } else {
            SpeechError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechSynthesizer trait
// ---------------------------------------------------------------------------

/// Turns text into a speech clip.
///
/// Implementations must be idempotent: the same text always yields an
/// equivalent clip, which is what makes the clip cache valid.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Clip, SpeechError>;
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SpeakResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    audio_base64: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Availability reported by `GET /api/tts/status`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpeechStatus {
    pub available: bool,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

fn clip_from_response(resp: SpeakResponse) -> Result<Clip, SpeechError> {
    if !resp.success {
        return Err(SpeechError::Endpoint(
            resp.error.unwrap_or_else(|| "TTS generation failed".into()),
        ));
    }
    match resp.audio_base64 {
        Some(audio) if !audio.is_empty() => Ok(Clip::from_base64(audio)),
        _ => Err(SpeechError::InvalidResponse("missing audio_base64".into())),
    }
}

// ---------------------------------------------------------------------------
// HttpSynthesizer
// ---------------------------------------------------------------------------

/// Calls the flashcard app's speech endpoint.
pub struct HttpSynthesizer {
    client: reqwest::Client,
    config: SpeechConfig,
}

impl HttpSynthesizer {
    /// Build an `HttpSynthesizer` from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`.
    pub fn from_config(config: &SpeechConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let key = self.config.api_key.as_deref().unwrap_or("");
        if key.is_empty() {
            req
        } else {
            req.bearer_auth(key)
        }
    }

    /// Ask the endpoint whether speech is currently available.
    pub async fn status(&self) -> Result<SpeechStatus, SpeechError> {
        let req = self.authorize(self.client.get(self.endpoint("/api/tts/status")));
        let response = req.send().await?;
        response
            .json()
            .await
            .map_err(|e| SpeechError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Clip, SpeechError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SpeechError::EmptyText);
        }

        let mut body = serde_json::json!({ "text": text });
        if let Some(id) = &self.config.spreadsheet_id {
            body["spreadsheet_id"] = serde_json::Value::from(id.as_str());
        }
        if let Some(gid) = &self.config.sheet_gid {
            body["sheet_gid"] = serde_json::Value::from(gid.as_str());
        }

        let req = self.authorize(self.client.post(self.endpoint("/api/tts/speak")).json(&body));
        let response = req.send().await?;

        // Error statuses still carry a JSON body with the reason.
        let parsed: SpeakResponse = response
            .json()
            .await
            .map_err(|e| SpeechError::InvalidResponse(e.to_string()))?;

        clip_from_response(parsed)
    }
}

// ---------------------------------------------------------------------------
// DisabledSynthesizer
// ---------------------------------------------------------------------------

/// Stand-in used when speech is turned off; every request fails with
/// [`SpeechError::Disabled`], so sessions skip through cards silently.
pub struct DisabledSynthesizer;

#[async_trait]
impl SpeechSynthesizer for DisabledSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<Clip, SpeechError> {
        Err(SpeechError::Disabled)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
