//! Card-set content providers.
//!
//! [`HttpContentProvider`] talks to the flashcard app's listening endpoint
//! (`GET /api/cards/<name>`); [`FileContentProvider`] reads the same payload
//! (or a bare JSON array of cards) from `<dir>/<name>.json`.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::cards::model::{Card, CardSet};
use crate::config::ContentConfig;

// ---------------------------------------------------------------------------
// ContentError
// ---------------------------------------------------------------------------

/// Errors that can occur while loading a card set.
#[derive(Debug, Error)]
pub enum ContentError {
    /// HTTP transport or connection error.
    #[error("card request failed: {0}")]
    Request(String),

    #[error("card request timed out")]
    Timeout,

    /// The server answered `success: false`.
    #[error("card set rejected by server: {0}")]
    Rejected(String),

    #[error("card set \"{0}\" not found")]
    NotFound(String),

    /// The set exists but holds no card with both a word and an example.
    #[error("card set \"{0}\" has no narratable cards")]
    EmptyCardSet(String),

    #[error("invalid card set name: {0:?}")]
    InvalidName(String),

    #[error("failed to parse card set: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ContentError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ContentError::Timeout
        } else {
            ContentError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ContentProvider trait
// ---------------------------------------------------------------------------

/// Loads named card sets.
///
/// Ordering of the returned cards is not significant: the listening
/// controller always applies its own shuffle.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    async fn fetch_card_set(&self, name: &str) -> Result<CardSet, ContentError>;
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// Body of `GET /api/cards/<name>`.
#[derive(Debug, Deserialize)]
struct ListeningResponse {
    success: bool,
    #[serde(default)]
    tab_name: Option<String>,
    #[serde(default)]
    sheet_gid: Option<i64>,
    #[serde(default)]
    cards: Vec<Card>,
    #[serde(default)]
    original_count: Option<usize>,
    #[serde(default)]
    error: Option<String>,
}

/// Accepted layouts of a local card-set file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CardFile {
    List(Vec<Card>),
    Response(ListeningResponse),
}

fn card_set_from_response(name: &str, resp: ListeningResponse) -> Result<CardSet, ContentError> {
    if !resp.success {
        return Err(ContentError::Rejected(
            resp.error.unwrap_or_else(|| "unknown error".into()),
        ));
    }

    let mut set = CardSet::from_raw(
        resp.tab_name.unwrap_or_else(|| name.to_string()),
        resp.sheet_gid,
        resp.cards,
    );
    if let Some(original) = resp.original_count {
        set.original_count = set.original_count.max(original);
    }

    if set.is_empty() {
        return Err(ContentError::EmptyCardSet(set.name));
    }
    Ok(set)
}

fn validate_name(name: &str) -> Result<&str, ContentError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.contains(['/', '\\']) || trimmed == ".." {
        return Err(ContentError::InvalidName(name.to_string()));
    }
    Ok(trimmed)
}

// ---------------------------------------------------------------------------
// HttpContentProvider
// ---------------------------------------------------------------------------

/// Fetches card sets from the flashcard app.
pub struct HttpContentProvider {
    client: reqwest::Client,
    config: ContentConfig,
}

impl HttpContentProvider {
    pub fn from_config(config: &ContentConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn card_set_url(&self, name: &str) -> Result<reqwest::Url, ContentError> {
        let mut url = reqwest::Url::parse(&self.config.base_url)
            .map_err(|e| ContentError::Request(format!("bad base_url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ContentError::Request("base_url cannot be a base".into()))?
            .pop_if_empty()
            .extend(["api", "cards", name]);
        Ok(url)
    }
}

#[async_trait]
impl ContentProvider for HttpContentProvider {
    async fn fetch_card_set(&self, name: &str) -> Result<CardSet, ContentError> {
        let name = validate_name(name)?;
        let url = self.card_set_url(name)?;
        log::info!("cards: loading \"{name}\" from {url}");

        let mut req = self.client.get(url);
        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();

        let body: ListeningResponse = match response.json().await {
            Ok(body) => body,
            Err(_) if status == reqwest::StatusCode::NOT_FOUND => {
                return Err(ContentError::NotFound(name.to_string()));
            }
            Err(e) => return Err(ContentError::Parse(e.to_string())),
        };

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ContentError::NotFound(name.to_string()));
        }

        let set = card_set_from_response(name, body)?;
        log::info!(
            "cards: \"{}\" has {} narratable cards ({} rows)",
            set.name,
            set.total_count,
            set.original_count
        );
        Ok(set)
    }
}

// ---------------------------------------------------------------------------
// FileContentProvider
// ---------------------------------------------------------------------------

/// Reads card sets from `<dir>/<name>.json`.
pub struct FileContentProvider {
    dir: PathBuf,
}

impl FileContentProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &ContentConfig) -> Self {
        Self::new(config.resolved_cards_dir())
    }
}

#[async_trait]
impl ContentProvider for FileContentProvider {
    async fn fetch_card_set(&self, name: &str) -> Result<CardSet, ContentError> {
        let name = validate_name(name)?;
        let path = self.dir.join(format!("{name}.json"));

        let data = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ContentError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let file: CardFile =
            serde_json::from_str(&data).map_err(|e| ContentError::Parse(e.to_string()))?;

        match file {
            CardFile::List(cards) => {
                let set = CardSet::from_raw(name, None, cards);
                if set.is_empty() {
                    return Err(ContentError::EmptyCardSet(set.name));
                }
                Ok(set)
            }
            CardFile::Response(resp) => card_set_from_response(name, resp),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
