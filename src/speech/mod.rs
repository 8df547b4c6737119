//! Speech clips for listening mode.
//!
//! This module provides:
//! * [`Clip`]: a base64-encoded audio payload.
//! * [`ClipStore`]: the clip cache's key-value store ([`MemoryClipStore`],
//!   [`JsonClipStore`]).
//! * [`SpeechSynthesizer`]: async trait implemented by speech backends
//!   ([`HttpSynthesizer`], [`DisabledSynthesizer`]).
//! * [`ClipResolver`]: cache lookup with per-text request de-duplication.
//! * [`SpeechError`]: error variants for speech operations.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use flashcard_listener::config::AppConfig;
//! use flashcard_listener::speech::{ClipResolver, HttpSynthesizer, JsonClipStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let resolver = ClipResolver::new(
//!         Arc::new(JsonClipStore::open(config.cache.resolved_path())),
//!         Arc::new(HttpSynthesizer::from_config(&config.speech)),
//!     );
//!
//!     let clip = resolver.resolve("casa").await.unwrap();
//!     println!("{} bytes", clip.decode().unwrap().len());
//! }
//! ```

pub mod clip;
pub mod resolver;
pub mod store;
pub mod synthesizer;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use clip::Clip;
pub use resolver::ClipResolver;
pub use store::{ClipStore, JsonClipStore, MemoryClipStore};
pub use synthesizer::{
    DisabledSynthesizer, HttpSynthesizer, SpeechError, SpeechStatus, SpeechSynthesizer,
};
