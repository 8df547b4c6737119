//! Listening-session state machine.
//!
//! [`Session`] is the mutable aggregate the controller keeps behind a mutex.
//! [`PlaybackState`] drives it:
//!
//! ```text
//! Idle ──start──▶ Playing ──pause──▶ Paused
//!                  ▲   ▲              │
//!                  │   └────resume────┘
//!                start
//!                  │
//! Playing / Paused ──stop──▶ Stopped ──start──▶ Playing
//! ```
//!
//! Every asynchronous step of the play loop carries a [`LoopToken`] and acts
//! only while the token is live: same epoch (bumped by `start` / `stop`),
//! same run (bumped by `pause` / `resume`), and the session is `Playing`.
//! The live token is also published on a `watch` channel so in-flight
//! playback can be abandoned the moment its token goes stale.

use rand::seq::SliceRandom;
use tokio::sync::watch;

use crate::cards::Card;

// ---------------------------------------------------------------------------
// PlaybackState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// No session has been started yet.
    #[default]
    Idle,
    Playing,
    /// Session kept intact; no clip plays and the cursor does not move.
    Paused,
    /// The last session was stopped and its cards cleared.
    Stopped,
}

impl PlaybackState {
    /// `true` while a session exists, paused or not.
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Paused)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, PlaybackState::Paused)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "Idle",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
            PlaybackState::Stopped => "Stopped",
        }
    }
}

// ---------------------------------------------------------------------------
// LoopToken
// ---------------------------------------------------------------------------

/// Identity of one play-loop task, captured when the task is spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopToken {
    pub epoch: u64,
    run: u64,
}

// ---------------------------------------------------------------------------
// ListeningStats
// ---------------------------------------------------------------------------

/// Per-session card outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListeningStats {
    /// Cards whose word and example both played to completion.
    pub cards_played: u64,
    /// Cards skipped because a clip could not be fetched or played.
    pub cards_failed: u64,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// What the play loop should narrate next.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub cursor: usize,
    pub loop_count: u64,
    pub card: Card,
    /// `true` when this turn wrapped the cursor and reshuffled the list.
    pub new_loop: bool,
}

/// The listening session aggregate.
#[derive(Debug)]
pub struct Session {
    state: PlaybackState,
    card_list: Vec<Card>,
    /// Order for the next pass, shuffled ahead of the wrap so it can be
    /// prefetched.  Empty until the cursor reaches the end of the list.
    next_order: Vec<Card>,
    cursor: usize,
    loop_count: u64,
    epoch: u64,
    run: u64,
    stats: ListeningStats,
    live: watch::Sender<Option<LoopToken>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (live, _) = watch::channel(None);
        Self {
            state: PlaybackState::Idle,
            card_list: Vec::new(),
            next_order: Vec::new(),
            cursor: 0,
            loop_count: 0,
            epoch: 0,
            run: 0,
            stats: ListeningStats::default(),
            live,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn card_list(&self) -> &[Card] {
        &self.card_list
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn loop_count(&self) -> u64 {
        self.loop_count
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn stats(&self) -> ListeningStats {
        self.stats
    }

    /// The card at the cursor, if the cursor is inside the list.
    pub fn current_card(&self) -> Option<&Card> {
        self.card_list.get(self.cursor)
    }

    pub fn is_live(&self, token: LoopToken) -> bool {
        self.state == PlaybackState::Playing && token.epoch == self.epoch && token.run == self.run
    }

    /// Follows the live token: `Some` only while `Playing`.
    pub fn watch_live(&self) -> watch::Receiver<Option<LoopToken>> {
        self.live.subscribe()
    }

    fn token(&self) -> LoopToken {
        LoopToken {
            epoch: self.epoch,
            run: self.run,
        }
    }

    fn publish(&self) {
        let live = (self.state == PlaybackState::Playing).then(|| self.token());
        self.live.send_replace(live);
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Replace any current session with `cards`, shuffled.
    ///
    /// The caller guarantees `cards` is non-empty.
    pub fn start(&mut self, mut cards: Vec<Card>) -> LoopToken {
        debug_assert!(!cards.is_empty());
        shuffle(&mut cards);

        self.epoch += 1;
        self.run += 1;
        self.card_list = cards;
        self.next_order.clear();
        self.cursor = 0;
        self.loop_count = 1;
        self.state = PlaybackState::Playing;
        self.stats = ListeningStats::default();
        self.publish();
        self.token()
    }

    /// `Playing → Paused`.  Returns `false` (and changes nothing) otherwise.
    pub fn pause(&mut self) -> bool {
        if self.state != PlaybackState::Playing {
            return false;
        }
        self.state = PlaybackState::Paused;
        self.run += 1;
        self.publish();
        true
    }

    /// `Paused → Playing`, yielding the token for a fresh loop task.
    pub fn resume(&mut self) -> Option<LoopToken> {
        if self.state != PlaybackState::Paused {
            return None;
        }
        self.state = PlaybackState::Playing;
        self.run += 1;
        self.publish();
        Some(self.token())
    }

    /// End the session.  Returns `true` if a session was active.
    pub fn stop(&mut self) -> bool {
        let was_active = self.state.is_playing();
        self.epoch += 1;
        self.run += 1;
        self.card_list.clear();
        self.next_order.clear();
        self.cursor = 0;
        self.loop_count = 0;
        if self.state != PlaybackState::Idle {
            self.state = PlaybackState::Stopped;
        }
        self.publish();
        was_active
    }

    // -----------------------------------------------------------------------
    // Play-loop steps
    // -----------------------------------------------------------------------

    /// Pick the card to narrate next, wrapping and reshuffling at the end of
    /// the list.  `None` when `token` is no longer live.
    pub fn next_turn(&mut self, token: LoopToken) -> Option<Turn> {
        if !self.is_live(token) || self.card_list.is_empty() {
            return None;
        }

        let mut new_loop = false;
        if self.cursor >= self.card_list.len() {
            self.loop_count += 1;
            if self.next_order.len() == self.card_list.len() {
                self.card_list = std::mem::take(&mut self.next_order);
            } else {
                shuffle(&mut self.card_list);
            }
            self.cursor = 0;
            new_loop = true;
        }

        Some(Turn {
            cursor: self.cursor,
            loop_count: self.loop_count,
            card: self.card_list[self.cursor].clone(),
            new_loop,
        })
    }

    /// Move past the current card, recording its outcome.  Returns the card
    /// to prefetch, or `None` when `token` is no longer live.
    ///
    /// When the list is about to wrap, the next pass is shuffled here and its
    /// first card returned, so the prefetch warms the card that will
    /// actually play next.
    pub fn advance(&mut self, token: LoopToken, played: bool) -> Option<Card> {
        if !self.is_live(token) {
            return None;
        }

        if played {
            self.stats.cards_played += 1;
        } else {
            self.stats.cards_failed += 1;
        }
        self.cursor += 1;

        if let Some(card) = self.card_list.get(self.cursor) {
            return Some(card.clone());
        }
        let mut order = self.card_list.clone();
        shuffle(&mut order);
        let first = order.first().cloned();
        self.next_order = order;
        first
    }
}

/// Uniform Fisher–Yates permutation.
fn shuffle(cards: &mut [Card]) {
    cards.shuffle(&mut rand::thread_rng());
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
