//! Progress events broadcast by the listening controller.

use crate::cards::Card;

/// Delivered to every [`subscribe`](super::ListeningController::subscribe)r.
/// Events from a superseded session are never sent.
#[derive(Debug, Clone, PartialEq)]
pub enum ListeningEvent {
    /// A new session began with `card_count` shuffled cards.
    Started { epoch: u64, card_count: usize },
    /// The cursor wrapped; the list was reshuffled for pass `loop_count`.
    LoopStarted { loop_count: u64 },
    /// Narration of the card at `cursor` is starting.
    CardStarted {
        cursor: usize,
        loop_count: u64,
        card: Card,
    },
    /// Word and example both played.
    CardFinished { cursor: usize },
    /// The card was skipped because a clip could not be fetched or played.
    CardSkipped { cursor: usize, reason: String },
    Paused { cursor: usize },
    Resumed { cursor: usize },
    Stopped,
}
