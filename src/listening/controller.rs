//! Listening controller: narrates a card set in an endless shuffled loop.
//!
//! [`ListeningController`] owns the [`Session`] and spawns one play-loop task
//! per `start` / `resume`.  Each task carries a [`LoopToken`]; every step
//! re-checks the token in the same critical section as the mutation it
//! guards, so a task from a stopped, restarted or paused session winds down
//! without touching the newer state.  Clips race the session's live-token
//! watch: once the token goes stale the in-flight `play` is dropped, which
//! silences the clip even if it was still being prepared.
//!
//! # Loop flow
//!
//! ```text
//! next_turn(token)                       wrap → loop_count += 1, reshuffle
//!   └─▶ join(resolve(word), resolve(example))
//!         └─▶ token live? ── no ─▶ exit (stale, not an error)
//!               ├─ fetch error ─────────────────────▶ skip card
//!               └─ play(word) ─▶ gap ─▶ play(example) ─▶ card played
//! advance(token)                         cursor += 1
//!   └─▶ spawn prefetch(next card) ─▶ sleep(card_gap) ─▶ next_turn
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::{broadcast, watch};

use crate::cards::{Card, ContentError, ContentProvider};
use crate::config::ListeningConfig;
use crate::playback::{PlaybackEngine, PlaybackError};
use crate::speech::{Clip, ClipResolver, SpeechError};

use super::events::ListeningEvent;
use super::state::{ListeningStats, LoopToken, PlaybackState, Session, Turn};

const EVENT_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced to callers of the controller.
#[derive(Debug, Error)]
pub enum ListeningError {
    /// `start` needs at least one card; nothing was changed.
    #[error("cannot start listening with an empty card list")]
    EmptyCardList,

    #[error(transparent)]
    Content(#[from] ContentError),
}

/// Why a card was skipped.  Only raised for live tokens.
#[derive(Debug, Error)]
pub enum CardError {
    #[error("speech unavailable: {0}")]
    Speech(#[from] SpeechError),

    #[error("playback failed: {0}")]
    Playback(#[from] PlaybackError),
}

enum TurnOutcome {
    Played,
    Failed(CardError),
    /// The token went stale mid-turn.
    Stale,
}

// ---------------------------------------------------------------------------
// ListeningSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time copy of the session, for UIs and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct ListeningSnapshot {
    pub state: PlaybackState,
    pub cards: Vec<Card>,
    pub cursor: usize,
    pub loop_count: u64,
    pub epoch: u64,
    pub current_card: Option<Card>,
    pub stats: ListeningStats,
    /// Continuations dropped because their token was stale, across all
    /// sessions of this controller.
    pub stale_discards: u64,
}

impl ListeningSnapshot {
    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }
}

// ---------------------------------------------------------------------------
// ListeningController
// ---------------------------------------------------------------------------

struct Inner {
    session: Mutex<Session>,
    live: watch::Receiver<Option<LoopToken>>,
    resolver: ClipResolver,
    engine: Arc<dyn PlaybackEngine>,
    timing: ListeningConfig,
    events: broadcast::Sender<ListeningEvent>,
    stale_discards: AtomicU64,
}

/// Drives listening mode.
///
/// Construct one per host application and share it; it is cheap to clone.
/// `start` and `resume` spawn onto the current tokio runtime.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use flashcard_listener::cards::Card;
/// use flashcard_listener::config::AppConfig;
/// use flashcard_listener::listening::ListeningController;
/// use flashcard_listener::playback::SilentEngine;
/// use flashcard_listener::speech::{ClipResolver, HttpSynthesizer, MemoryClipStore};
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let resolver = ClipResolver::new(
///     Arc::new(MemoryClipStore::new()),
///     Arc::new(HttpSynthesizer::from_config(&config.speech)),
/// );
/// let controller = ListeningController::new(
///     resolver,
///     Arc::new(SilentEngine::new(Duration::from_secs(1))),
///     config.listening.clone(),
/// );
///
/// controller
///     .start(vec![Card::new("casa", "Eu vivo numa casa")])
///     .unwrap();
/// # }
/// ```
#[derive(Clone)]
pub struct ListeningController {
    inner: Arc<Inner>,
}

impl ListeningController {
    pub fn new(
        resolver: ClipResolver,
        engine: Arc<dyn PlaybackEngine>,
        timing: ListeningConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let session = Session::new();
        let live = session.watch_live();
        Self {
            inner: Arc::new(Inner {
                session: Mutex::new(session),
                live,
                resolver,
                engine,
                timing,
                events,
                stale_discards: AtomicU64::new(0),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Start narrating `cards`, superseding any active session.
    ///
    /// Returns the new session's epoch.
    pub fn start(&self, cards: Vec<Card>) -> Result<u64, ListeningError> {
        if cards.is_empty() {
            return Err(ListeningError::EmptyCardList);
        }

        let token = {
            let mut session = self.inner.session.lock().unwrap();
            let token = session.start(cards);
            self.inner.emit(ListeningEvent::Started {
                epoch: token.epoch,
                card_count: session.card_list().len(),
            });
            log::info!(
                "listening: session {} started with {} cards",
                token.epoch,
                session.card_list().len()
            );
            // Silence whatever the previous session was saying.
            self.inner.engine.stop_current();
            token
        };

        tokio::spawn(run_loop(Arc::clone(&self.inner), token));
        Ok(token.epoch)
    }

    /// Load `name` from `provider` and start narrating it.
    pub async fn start_card_set(
        &self,
        provider: &dyn ContentProvider,
        name: &str,
    ) -> Result<u64, ListeningError> {
        let set = provider.fetch_card_set(name).await?;
        self.start(set.cards)
    }

    /// Halt the current clip and freeze the session.  No-op unless playing.
    pub fn pause(&self) -> bool {
        {
            let mut session = self.inner.session.lock().unwrap();
            if !session.pause() {
                return false;
            }
            self.inner.emit(ListeningEvent::Paused {
                cursor: session.cursor(),
            });
            log::info!("listening: paused at card {}", session.cursor());
            // Under the lock, so a racing `resume` cannot start a clip first.
            self.inner.engine.stop_current();
        }
        true
    }

    /// Continue from the card at the cursor.  No-op unless paused.
    pub fn resume(&self) -> bool {
        let token = {
            let mut session = self.inner.session.lock().unwrap();
            let Some(token) = session.resume() else {
                return false;
            };
            self.inner.emit(ListeningEvent::Resumed {
                cursor: session.cursor(),
            });
            log::info!("listening: resumed at card {}", session.cursor());
            token
        };
        tokio::spawn(run_loop(Arc::clone(&self.inner), token));
        true
    }

    /// End the session and clear its cards.  Idempotent.
    pub fn stop(&self) {
        let mut session = self.inner.session.lock().unwrap();
        if session.stop() {
            self.inner.emit(ListeningEvent::Stopped);
            log::info!("listening: stopped");
        }
        self.inner.engine.stop_current();
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> ListeningSnapshot {
        let session = self.inner.session.lock().unwrap();
        ListeningSnapshot {
            state: session.state(),
            cards: session.card_list().to_vec(),
            cursor: session.cursor(),
            loop_count: session.loop_count(),
            epoch: session.epoch(),
            current_card: session.current_card().cloned(),
            stats: session.stats(),
            stale_discards: self.inner.stale_discards.load(Ordering::Relaxed),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ListeningEvent> {
        self.inner.events.subscribe()
    }

    pub fn resolver(&self) -> &ClipResolver {
        &self.inner.resolver
    }
}

// ---------------------------------------------------------------------------
// Play loop
// ---------------------------------------------------------------------------

async fn run_loop(inner: Arc<Inner>, token: LoopToken) {
    loop {
        let Some(turn) = inner.next_turn(token) else {
            inner.discard_stale(token);
            return;
        };

        let outcome = inner.play_turn(token, &turn).await;

        let played = match &outcome {
            TurnOutcome::Played => true,
            TurnOutcome::Failed(_) => false,
            TurnOutcome::Stale => {
                inner.discard_stale(token);
                return;
            }
        };

        let Some(next) = inner.advance(token, turn.cursor, outcome) else {
            inner.discard_stale(token);
            return;
        };

        if played {
            log::debug!("listening: card {} done", turn.cursor);
        }
        if inner.timing.prefetch {
            inner.prefetch(token, next);
        }

        tokio::time::sleep(inner.timing.card_gap()).await;
    }
}

impl Inner {
    fn emit(&self, event: ListeningEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn is_live(&self, token: LoopToken) -> bool {
        self.session.lock().unwrap().is_live(token)
    }

    /// Resolves once `token` is no longer live.
    async fn until_stale(&self, token: LoopToken) {
        let mut live = self.live.clone();
        // The sender lives in the session, so this only errors on teardown.
        let _ = live.wait_for(|current| *current != Some(token)).await;
    }

    /// Play `clip`, abandoning it as soon as `token` goes stale.  `None`
    /// means the token went stale first and the clip was dropped.
    async fn play_live(&self, token: LoopToken, clip: &Clip) -> Option<Result<(), PlaybackError>> {
        tokio::select! {
            biased;
            _ = self.until_stale(token) => None,
            result = self.engine.play(clip) => Some(result),
        }
    }

    fn discard_stale(&self, token: LoopToken) {
        self.stale_discards.fetch_add(1, Ordering::Relaxed);
        log::debug!("listening: dropped stale continuation of session {}", token.epoch);
    }

    fn next_turn(&self, token: LoopToken) -> Option<Turn> {
        let mut session = self.session.lock().unwrap();
        let turn = session.next_turn(token)?;
        if turn.new_loop {
            log::info!("listening: starting pass {}", turn.loop_count);
            self.emit(ListeningEvent::LoopStarted {
                loop_count: turn.loop_count,
            });
        }
        self.emit(ListeningEvent::CardStarted {
            cursor: turn.cursor,
            loop_count: turn.loop_count,
            card: turn.card.clone(),
        });
        Some(turn)
    }

    async fn play_turn(&self, token: LoopToken, turn: &Turn) -> TurnOutcome {
        let (word, example) = tokio::join!(
            self.resolver.resolve(&turn.card.word),
            self.resolver.resolve(&turn.card.example),
        );

        if !self.is_live(token) {
            return TurnOutcome::Stale;
        }

        let (word, example) = match (word, example) {
            (Ok(word), Ok(example)) => (word, example),
            (Err(e), _) | (_, Err(e)) => return TurnOutcome::Failed(e.into()),
        };

        match self.play_live(token, &word).await {
            None => return TurnOutcome::Stale,
            Some(Err(e)) => return self.failure_or_stale(token, e),
            Some(Ok(())) => {}
        }

        tokio::select! {
            biased;
            _ = self.until_stale(token) => return TurnOutcome::Stale,
            _ = tokio::time::sleep(self.timing.example_gap()) => {}
        }

        match self.play_live(token, &example).await {
            None => return TurnOutcome::Stale,
            Some(Err(e)) => return self.failure_or_stale(token, e),
            Some(Ok(())) => {}
        }
        if !self.is_live(token) {
            return TurnOutcome::Stale;
        }

        TurnOutcome::Played
    }

    /// A playback error is only a failure if nobody paused, stopped or
    /// restarted the session meanwhile.
    fn failure_or_stale(&self, token: LoopToken, error: PlaybackError) -> TurnOutcome {
        if self.is_live(token) {
            TurnOutcome::Failed(error.into())
        } else {
            TurnOutcome::Stale
        }
    }

    fn advance(&self, token: LoopToken, cursor: usize, outcome: TurnOutcome) -> Option<Card> {
        let mut session = self.session.lock().unwrap();
        let played = matches!(outcome, TurnOutcome::Played);
        let next = session.advance(token, played)?;

        match outcome {
            TurnOutcome::Failed(e) => {
                log::warn!("listening: skipping card {cursor}: {e}");
                self.emit(ListeningEvent::CardSkipped {
                    cursor,
                    reason: e.to_string(),
                });
            }
            _ => self.emit(ListeningEvent::CardFinished { cursor }),
        }
        Some(next)
    }

    /// Warm the cache for `card` without touching play state.
    fn prefetch(self: &Arc<Self>, token: LoopToken, card: Card) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            if !inner.is_live(token) {
                return;
            }
            let (word, example) = tokio::join!(
                inner.resolver.resolve(&card.word),
                inner.resolver.resolve(&card.example),
            );
            for result in [word, example] {
                if let Err(e) = result {
                    if inner.is_live(token) {
                        log::debug!("listening: prefetch of {:?} failed: {e}", card.word);
                    }
                }
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::SilentEngine;
    use crate::speech::{Clip, DisabledSynthesizer, MemoryClipStore, SpeechSynthesizer};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::time::Duration;
    use tokio::sync::broadcast::error::RecvError;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Encodes the text itself as the clip; fails for texts in `failing`.
    struct EchoSynth {
        delay: Duration,
        failing: HashSet<String>,
    }

    impl EchoSynth {
        fn instant() -> Arc<Self> {
            Self::with(Duration::ZERO, &[])
        }

        fn with(delay: Duration, failing: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                delay,
                failing: failing.iter().map(|s| s.to_string()).collect(),
            })
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for EchoSynth {
        async fn synthesize(&self, text: &str) -> Result<Clip, SpeechError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failing.contains(text) {
                return Err(SpeechError::Endpoint("TTS generation failed".into()));
            }
            Ok(Clip::from_bytes(text.as_bytes()))
        }
    }

    /// Silent engine that records the text of every clip it starts.
    struct RecordingEngine {
        inner: SilentEngine,
        played: Mutex<Vec<String>>,
    }

    impl RecordingEngine {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                inner: SilentEngine::new(Duration::from_millis(100)),
                played: Mutex::new(Vec::new()),
            })
        }

        fn played(&self) -> Vec<String> {
            self.played.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PlaybackEngine for RecordingEngine {
        async fn play(&self, clip: &Clip) -> Result<(), PlaybackError> {
            let text = String::from_utf8(clip.decode().unwrap()).unwrap();
            self.played.lock().unwrap().push(text);
            self.inner.play(clip).await
        }

        fn stop_current(&self) {
            self.inner.stop_current();
        }
    }

    /// Blocks its thread while "decoding" each clip, like a device engine,
    /// then plays silently.  Counts clips that played to the end.
    struct PreparingEngine {
        inner: SilentEngine,
        completed: AtomicU64,
    }

    impl PreparingEngine {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                inner: SilentEngine::new(Duration::from_millis(500)),
                completed: AtomicU64::new(0),
            })
        }

        fn completed(&self) -> u64 {
            self.completed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PlaybackEngine for PreparingEngine {
        async fn play(&self, clip: &Clip) -> Result<(), PlaybackError> {
            std::thread::sleep(Duration::from_millis(20));
            self.inner.play(clip).await?;
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop_current(&self) {
            self.inner.stop_current();
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn timing() -> ListeningConfig {
        ListeningConfig {
            card_gap_ms: 100,
            example_gap_ms: 50,
            prefetch: true,
        }
    }

    fn controller(
        synth: Arc<dyn SpeechSynthesizer>,
        engine: Arc<RecordingEngine>,
    ) -> ListeningController {
        let resolver = ClipResolver::new(Arc::new(MemoryClipStore::new()), synth);
        ListeningController::new(resolver, engine, timing())
    }

    fn portuguese_cards() -> Vec<Card> {
        vec![
            Card::new("casa", "Eu vivo numa casa"),
            Card::new("carro", "O meu carro é azul"),
        ]
    }

    async fn wait_for(
        rx: &mut broadcast::Receiver<ListeningEvent>,
        pred: impl Fn(&ListeningEvent) -> bool,
    ) -> ListeningEvent {
        let wait = async {
            loop {
                match rx.recv().await {
                    Ok(event) if pred(&event) => return event,
                    Ok(_) | Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => panic!("event channel closed"),
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(600), wait)
            .await
            .expect("timed out waiting for listening event")
    }

    /// Pairs of (word, example) played in order.
    fn played_pairs(played: &[String]) -> Vec<(String, String)> {
        played
            .chunks(2)
            .filter(|c| c.len() == 2)
            .map(|c| (c[0].clone(), c[1].clone()))
            .collect()
    }

    // -----------------------------------------------------------------------
    // start / stop
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn start_shuffles_a_permutation_at_cursor_zero() {
        let engine = RecordingEngine::new();
        let ctl = controller(EchoSynth::instant(), engine);
        let cards: Vec<Card> = (0..20)
            .map(|i| Card::new(format!("w{i}"), format!("e{i}")))
            .collect();

        ctl.start(cards.clone()).unwrap();
        let snap = ctl.snapshot();

        assert_eq!(snap.cursor, 0);
        assert_eq!(snap.loop_count, 1);
        assert!(snap.is_playing());
        assert!(!snap.is_paused());
        let shuffled: HashSet<Card> = snap.cards.iter().cloned().collect();
        assert_eq!(snap.cards.len(), cards.len());
        assert_eq!(shuffled, cards.into_iter().collect::<HashSet<_>>());
    }

    #[tokio::test]
    async fn empty_card_list_is_rejected_without_state_change() {
        let ctl = controller(EchoSynth::instant(), RecordingEngine::new());

        let err = ctl.start(Vec::new()).unwrap_err();

        assert!(matches!(err, ListeningError::EmptyCardList));
        let snap = ctl.snapshot();
        assert_eq!(snap.state, PlaybackState::Idle);
        assert_eq!(snap.epoch, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn one_full_pass_plays_each_card_once() {
        let engine = RecordingEngine::new();
        let ctl = controller(EchoSynth::instant(), engine.clone());
        let mut rx = ctl.subscribe();

        ctl.start(portuguese_cards()).unwrap();
        wait_for(&mut rx, |e| matches!(e, ListeningEvent::LoopStarted { loop_count: 2 })).await;

        let snap = ctl.snapshot();
        assert_eq!(snap.loop_count, 2);
        assert_eq!(snap.cursor, 0);
        assert_eq!(snap.stats.cards_played, 2);

        let first_pass = played_pairs(&engine.played()[..4]);
        let expected: HashSet<(String, String)> = portuguese_cards()
            .into_iter()
            .map(|c| (c.word, c.example))
            .collect();
        assert_eq!(first_pass.len(), 2);
        assert_eq!(first_pass.into_iter().collect::<HashSet<_>>(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_freezes_state_even_when_fetches_resolve_later() {
        let engine = RecordingEngine::new();
        let ctl = controller(EchoSynth::with(Duration::from_secs(1), &[]), engine.clone());

        ctl.start(portuguese_cards()).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        ctl.stop();
        let after_stop = ctl.snapshot();

        tokio::time::sleep(Duration::from_secs(30)).await;
        let later = ctl.snapshot();

        assert_eq!(after_stop.state, PlaybackState::Stopped);
        assert!(after_stop.cards.is_empty());
        assert_eq!(later.state, after_stop.state);
        assert_eq!(later.cursor, after_stop.cursor);
        assert_eq!(later.loop_count, 0);
        assert_eq!(later.epoch, after_stop.epoch);
        assert_eq!(later.stats, after_stop.stats);
        assert!(engine.played().is_empty());
        assert!(later.stale_discards >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let ctl = controller(EchoSynth::instant(), RecordingEngine::new());
        ctl.start(portuguese_cards()).unwrap();

        ctl.stop();
        let first = ctl.snapshot();
        ctl.stop();
        let second = ctl.snapshot();

        assert_eq!(first.state, PlaybackState::Stopped);
        assert_eq!(second.state, PlaybackState::Stopped);
        assert!(second.cards.is_empty());
        assert_eq!(second.cursor, 0);
        assert_eq!(second.loop_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_before_old_chain_resolves_keeps_new_session_clean() {
        let engine = RecordingEngine::new();
        let ctl = controller(EchoSynth::with(Duration::from_millis(500), &[]), engine.clone());
        let mut rx = ctl.subscribe();

        ctl.start(portuguese_cards()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let second_set = vec![
            Card::new("gato", "O gato dorme"),
            Card::new("cão", "O cão ladra"),
            Card::new("pão", "Eu como pão"),
        ];
        let epoch = ctl.start(second_set.clone()).unwrap();

        wait_for(&mut rx, |e| matches!(e, ListeningEvent::LoopStarted { loop_count: 2 })).await;

        let snap = ctl.snapshot();
        assert_eq!(snap.epoch, epoch);
        assert_eq!(snap.loop_count, 2);
        assert_eq!(snap.cursor, 0);
        assert_eq!(snap.stats.cards_played, 3);
        assert_eq!(snap.stats.cards_failed, 0);

        let allowed: HashSet<String> = second_set
            .iter()
            .flat_map(|c| [c.word.clone(), c.example.clone()])
            .collect();
        for text in engine.played() {
            assert!(allowed.contains(&text), "played stale clip {text:?}");
        }
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn failing_card_is_skipped_and_loop_continues() {
        let engine = RecordingEngine::new();
        let synth = EchoSynth::with(Duration::ZERO, &["O meu carro é azul"]);
        let ctl = controller(synth, engine.clone());
        let mut rx = ctl.subscribe();

        let mut cards = portuguese_cards();
        cards.push(Card::new("gato", "O gato dorme"));
        ctl.start(cards).unwrap();

        let skipped = wait_for(&mut rx, |e| matches!(e, ListeningEvent::CardSkipped { .. })).await;
        assert!(matches!(skipped, ListeningEvent::CardSkipped { reason, .. } if reason.contains("speech")));

        wait_for(&mut rx, |e| matches!(e, ListeningEvent::LoopStarted { loop_count: 2 })).await;
        let snap = ctl.snapshot();
        assert_eq!(snap.loop_count, 2);
        assert_eq!(snap.stats.cards_played, 2);
        assert_eq!(snap.stats.cards_failed, 1);

        let first_pass = &engine.played()[..4];
        assert!(!first_pass.iter().any(|t| t == "carro" || t == "O meu carro é azul"));
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_speech_skips_through_silently() {
        let engine = RecordingEngine::new();
        let ctl = controller(Arc::new(DisabledSynthesizer), engine.clone());
        let mut rx = ctl.subscribe();

        ctl.start(portuguese_cards()).unwrap();
        wait_for(&mut rx, |e| matches!(e, ListeningEvent::LoopStarted { loop_count: 3 })).await;

        let snap = ctl.snapshot();
        assert!(snap.is_playing());
        assert_eq!(snap.stats.cards_failed, 4);
        assert_eq!(snap.stats.cards_played, 0);
        assert!(engine.played().is_empty());
    }

    // -----------------------------------------------------------------------
    // Pause / resume
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn paused_session_never_advances() {
        let engine = RecordingEngine::new();
        let ctl = controller(EchoSynth::instant(), engine.clone());
        let mut rx = ctl.subscribe();

        ctl.start(portuguese_cards()).unwrap();
        wait_for(&mut rx, |e| matches!(e, ListeningEvent::CardStarted { .. })).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        for _ in 0..5 {
            assert!(ctl.pause());
            let paused_at = ctl.snapshot().cursor;
            tokio::time::sleep(Duration::from_secs(10)).await;

            let snap = ctl.snapshot();
            assert!(snap.is_paused());
            assert_eq!(snap.cursor, paused_at);

            assert!(ctl.resume());
            tokio::time::sleep(Duration::from_millis(170)).await;
        }
        assert!(ctl.snapshot().is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn resume_continues_from_paused_cursor() {
        let engine = RecordingEngine::new();
        let ctl = controller(EchoSynth::instant(), engine.clone());
        let mut rx = ctl.subscribe();

        ctl.start(portuguese_cards()).unwrap();
        let second = wait_for(&mut rx, |e| {
            matches!(e, ListeningEvent::CardStarted { cursor: 1, .. })
        })
        .await;
        let ListeningEvent::CardStarted { card, .. } = second else {
            unreachable!()
        };

        // Mid-way through the word clip.
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(ctl.pause());
        assert_eq!(ctl.snapshot().cursor, 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(ctl.resume());

        let next = wait_for(&mut rx, |e| matches!(e, ListeningEvent::CardStarted { .. })).await;
        assert_eq!(
            next,
            ListeningEvent::CardStarted {
                cursor: 1,
                loop_count: 1,
                card,
            }
        );
    }

    fn preparing_controller(engine: Arc<PreparingEngine>) -> ListeningController {
        let resolver = ClipResolver::new(Arc::new(MemoryClipStore::new()), EchoSynth::instant());
        ListeningController::new(resolver, engine, timing())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_while_clip_is_being_prepared_silences_it() {
        let engine = PreparingEngine::new();
        let ctl = preparing_controller(engine.clone());

        ctl.start(portuguese_cards()).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        ctl.stop();
        tokio::time::sleep(Duration::from_millis(800)).await;

        let snap = ctl.snapshot();
        assert_eq!(snap.state, PlaybackState::Stopped);
        assert_eq!(engine.completed(), 0, "clip kept playing after stop");
        assert!(snap.stale_discards >= 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn pause_while_clip_is_being_prepared_silences_it() {
        let engine = PreparingEngine::new();
        let ctl = preparing_controller(engine.clone());
        let mut rx = ctl.subscribe();

        ctl.start(portuguese_cards()).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(ctl.pause());
        tokio::time::sleep(Duration::from_millis(800)).await;

        let snap = ctl.snapshot();
        assert!(snap.is_paused());
        assert_eq!(snap.cursor, 0);
        assert_eq!(engine.completed(), 0, "clip kept playing after pause");

        assert!(ctl.resume());
        wait_for(&mut rx, |e| matches!(e, ListeningEvent::CardFinished { cursor: 0 })).await;
        assert_eq!(engine.completed(), 2);
        ctl.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stale_exit_between_cards_is_counted() {
        let ctl = controller(EchoSynth::instant(), RecordingEngine::new());
        let mut rx = ctl.subscribe();

        ctl.start(portuguese_cards()).unwrap();
        wait_for(&mut rx, |e| matches!(e, ListeningEvent::CardFinished { cursor: 0 })).await;
        // The loop is now sleeping through the card gap.
        assert!(ctl.pause());
        let before = ctl.snapshot().stale_discards;

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(ctl.snapshot().stale_discards, before + 1);
        assert_eq!(ctl.snapshot().cursor, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_and_resume_are_noops_in_wrong_state() {
        let ctl = controller(EchoSynth::instant(), RecordingEngine::new());

        assert!(!ctl.pause());
        assert!(!ctl.resume());

        ctl.start(portuguese_cards()).unwrap();
        assert!(!ctl.resume());
        assert!(ctl.pause());
        assert!(!ctl.pause());

        ctl.stop();
        assert!(!ctl.resume());
        assert_eq!(ctl.snapshot().state, PlaybackState::Stopped);
    }

    // -----------------------------------------------------------------------
    // Prefetch / content
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn each_distinct_text_is_fetched_once_across_loops() {
        let engine = RecordingEngine::new();
        let synth = EchoSynth::with(Duration::from_millis(20), &[]);
        let ctl = controller(synth, engine);
        let mut rx = ctl.subscribe();

        ctl.start(portuguese_cards()).unwrap();
        wait_for(&mut rx, |e| matches!(e, ListeningEvent::LoopStarted { loop_count: 3 })).await;

        assert_eq!(ctl.resolver().fetch_count(), 4);
        assert_eq!(ctl.resolver().cached_len(), 4);
    }

    #[tokio::test]
    async fn start_card_set_loads_from_provider() {
        use crate::cards::FileContentProvider;

        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(
            dir.path().join("Casa.json"),
            serde_json::to_string(&portuguese_cards()).unwrap(),
        )
        .unwrap();
        let provider = FileContentProvider::new(dir.path());
        let ctl = controller(EchoSynth::instant(), RecordingEngine::new());

        ctl.start_card_set(&provider, "Casa").await.unwrap();
        assert_eq!(ctl.snapshot().cards.len(), 2);

        let err = ctl.start_card_set(&provider, "Nada").await.unwrap_err();
        assert!(matches!(err, ListeningError::Content(ContentError::NotFound(_))));
    }
}
