//! Listening mode for a language-learning flashcard app.
//!
//! Narrates a set of word / example-sentence cards in an endless shuffled
//! loop, fetching speech clips from a remote endpoint and caching them
//! locally.

pub mod cards;
pub mod config;
pub mod listening;
pub mod playback;
pub mod speech;
