//! Application entry point: `flashcard-listener <card-set>`.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Build the content provider, speech synthesizer, clip cache and
//!    playback engine from config.
//! 4. Start listening to the named card set.
//! 5. Read commands from stdin until `q`, EOF or Ctrl-C:
//!    `p` pause, `r` resume, `s` status, `q` quit.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use flashcard_listener::{
    cards::{ContentProvider, FileContentProvider, HttpContentProvider},
    config::{AppConfig, ContentSource},
    listening::{ListeningController, ListeningEvent},
    playback::engine_from_config,
    speech::{
        ClipResolver, ClipStore, DisabledSynthesizer, HttpSynthesizer, JsonClipStore,
        MemoryClipStore, SpeechSynthesizer,
    },
};

// ---------------------------------------------------------------------------
// Stack construction
// ---------------------------------------------------------------------------

fn build_provider(config: &AppConfig) -> Box<dyn ContentProvider> {
    match config.content.source {
        ContentSource::Http => Box::new(HttpContentProvider::from_config(&config.content)),
        ContentSource::File => Box::new(FileContentProvider::from_config(&config.content)),
    }
}

async fn build_synthesizer(config: &AppConfig) -> Arc<dyn SpeechSynthesizer> {
    if !config.speech.enabled {
        log::info!("speech disabled in config; cards will be skipped silently");
        return Arc::new(DisabledSynthesizer);
    }

    let synth = HttpSynthesizer::from_config(&config.speech);
    match synth.status().await {
        Ok(status) if status.available => log::info!(
            "speech endpoint ready (language: {}, voice: {})",
            status.language.as_deref().unwrap_or("?"),
            status.voice.as_deref().unwrap_or("?"),
        ),
        Ok(status) => log::warn!(
            "speech endpoint reports unavailable: {}",
            status.error.as_deref().unwrap_or("no reason given")
        ),
        Err(e) => log::warn!("could not query speech endpoint status: {e}"),
    }
    Arc::new(synth)
}

fn build_store(config: &AppConfig) -> Arc<dyn ClipStore> {
    if config.cache.persist {
        let store = JsonClipStore::open(config.cache.resolved_path());
        log::info!(
            "clip cache: {} ({} clips)",
            store.path().display(),
            store.len()
        );
        Arc::new(store)
    } else {
        Arc::new(MemoryClipStore::new())
    }
}

// ---------------------------------------------------------------------------
// Event printer
// ---------------------------------------------------------------------------

async fn print_events(controller: ListeningController) {
    let mut rx = controller.subscribe();
    loop {
        match rx.recv().await {
            Ok(ListeningEvent::LoopStarted { loop_count }) => {
                println!("-- pass {loop_count} --");
            }
            Ok(ListeningEvent::CardStarted { card, .. }) => {
                println!("{}  |  {}", card.word, card.example);
            }
            Ok(ListeningEvent::CardSkipped { reason, .. }) => {
                println!("   (skipped: {reason})");
            }
            Ok(ListeningEvent::Paused { .. }) => println!("[paused]"),
            Ok(ListeningEvent::Resumed { .. }) => println!("[resumed]"),
            Ok(_) => {}
            Err(RecvError::Lagged(n)) => log::debug!("event printer lagged by {n}"),
            Err(RecvError::Closed) => return,
        }
    }
}

fn print_status(controller: &ListeningController) {
    let snap = controller.snapshot();
    println!(
        "{}: card {}/{} in pass {} ({} played, {} skipped, {} clips cached)",
        snap.state.label(),
        (snap.cursor + 1).min(snap.cards.len()),
        snap.cards.len(),
        snap.loop_count,
        snap.stats.cards_played,
        snap.stats.cards_failed,
        controller.resolver().cached_len(),
    );
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(card_set) = std::env::args().nth(1) else {
        eprintln!("usage: flashcard-listener <card-set>");
        std::process::exit(2);
    };

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Stack
    let provider = build_provider(&config);
    let resolver = ClipResolver::new(build_store(&config), build_synthesizer(&config).await);
    let engine = engine_from_config(&config.playback);
    let controller = ListeningController::new(resolver, engine, config.listening.clone());

    tokio::spawn(print_events(controller.clone()));

    // 4. Start
    controller
        .start_card_set(provider.as_ref(), &card_set)
        .await
        .with_context(|| format!("could not start listening to {card_set:?}"))?;

    // 5. Commands
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match line.trim() {
                    "p" => {
                        if !controller.pause() {
                            println!("not playing");
                        }
                    }
                    "r" => {
                        if !controller.resume() {
                            println!("not paused");
                        }
                    }
                    "s" => print_status(&controller),
                    "q" => break,
                    "" => {}
                    other => println!("unknown command {other:?} (p, r, s, q)"),
                }
            }
        }
    }

    controller.stop();
    log::info!("listening stopped");
    Ok(())
}
