//! Memoizing, de-duplicating text → clip resolution.
//!
//! ```text
//! resolve(text)
//!   ├─ ClipStore hit ───────────────▶ Ok(clip)
//!   ├─ fetch for text in flight ────▶ await the same Shared future
//!   └─ otherwise ─▶ synthesize(text) once
//!                     ├─ Ok  → store.put(text), wake all waiters
//!                     └─ Err → wake all waiters, nothing cached
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::speech::clip::Clip;
use crate::speech::store::ClipStore;
use crate::speech::synthesizer::{SpeechError, SpeechSynthesizer};

type PendingClip = Shared<BoxFuture<'static, Result<Clip, SpeechError>>>;

struct Inner {
    store: Arc<dyn ClipStore>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    in_flight: Mutex<HashMap<String, PendingClip>>,
    fetches: AtomicU64,
}

/// Resolves spoken text to clips through the clip cache.
///
/// Cheap to clone; clones share the cache and the in-flight table.
#[derive(Clone)]
pub struct ClipResolver {
    inner: Arc<Inner>,
}

impl ClipResolver {
    pub fn new(store: Arc<dyn ClipStore>, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                synthesizer,
                in_flight: Mutex::new(HashMap::new()),
                fetches: AtomicU64::new(0),
            }),
        }
    }

    /// Return the clip for `text` (exact match), fetching it at most once no
    /// matter how many callers ask concurrently.
    pub async fn resolve(&self, text: &str) -> Result<Clip, SpeechError> {
        if let Some(clip) = self.inner.store.get(text) {
            return Ok(clip);
        }

        let pending = {
            let mut in_flight = self.inner.in_flight.lock().unwrap();
            // A fetch may have completed between the lookup above and taking
            // the lock; it stores before it unregisters, so re-check here.
            if let Some(clip) = self.inner.store.get(text) {
                return Ok(clip);
            }
            in_flight
                .entry(text.to_string())
                .or_insert_with(|| self.fetch(text))
                .clone()
        };

        pending.await
    }

    /// `true` when `text` is already cached.
    pub fn is_cached(&self, text: &str) -> bool {
        self.inner.store.get(text).is_some()
    }

    /// Number of synthesizer requests issued so far.
    pub fn fetch_count(&self) -> u64 {
        self.inner.fetches.load(Ordering::Relaxed)
    }

    /// Number of clips in the cache.
    pub fn cached_len(&self) -> usize {
        self.inner.store.len()
    }

    fn fetch(&self, text: &str) -> PendingClip {
        self.inner.fetches.fetch_add(1, Ordering::Relaxed);

        let inner = Arc::clone(&self.inner);
        let text = text.to_string();

        async move {
            log::debug!("speech: fetching clip for {:?}", text);
            let result = inner.synthesizer.synthesize(&text).await;
            if let Ok(clip) = &result {
                inner.store.put(&text, clip.clone());
            }
            inner.in_flight.lock().unwrap().remove(&text);
            result
        }
        .boxed()
        .shared()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
