//! Listening mode: hands-free narration of a card set.
//!
//! Each card's word is spoken, then its example sentence, in a shuffled
//! order that reshuffles every time the list wraps.  The loop runs until
//! stopped.
//!
//! * [`ListeningController`]: start / pause / resume / stop and snapshots.
//! * [`Session`] / [`PlaybackState`]: the state machine behind the controller.
//! * [`ListeningEvent`]: progress notifications via `subscribe`.
//!
//! # Architecture
//!
//! ```text
//! ContentProvider ──▶ start(cards) ──▶ Session (Mutex)
//!                                        │  token = {epoch, run}
//!                                        ▼
//!                              run_loop (tokio task)
//!                                ├─ ClipResolver::resolve ──▶ ClipStore / SpeechSynthesizer
//!                                ├─ PlaybackEngine::play
//!                                └─ broadcast ListeningEvent
//! ```

pub mod controller;
pub mod events;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use controller::{CardError, ListeningController, ListeningError, ListeningSnapshot};
pub use events::ListeningEvent;
pub use state::{ListeningStats, LoopToken, PlaybackState, Session, Turn};
