//! Async session runtime.
//!
//! A spawned task owns the engine and is its only driver. It maps the tokio
//! clock onto the engine's wall timeline, sleeps until the engine's next
//! deadline, applies intents as they arrive, and publishes render snapshots
//! and session events after every step.

use cinestory_core::clock::to_millis;
use cinestory_core::error::DomainError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::domain::commands::PlayerIntent;
use crate::domain::engine::NarrativeEngine;
use crate::domain::events::PlaybackEvent;
use crate::domain::notifications::NoticeSender;
use crate::domain::snapshot::RenderSnapshot;

const EVENT_CAPACITY: usize = 256;

/// Handle to a running session task.
#[derive(Debug)]
pub struct SessionHandle {
    intents: mpsc::UnboundedSender<PlayerIntent>,
    snapshots: watch::Receiver<RenderSnapshot>,
    events: broadcast::Sender<PlaybackEvent>,
    notices: NoticeSender,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Queues an intent for the session.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the session task has stopped.
    pub fn send(&self, intent: PlayerIntent) -> Result<(), DomainError> {
        self.intents
            .send(intent)
            .map_err(|_| DomainError::Infrastructure("playback session has stopped".to_owned()))
    }

    /// The latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> RenderSnapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver that observes every published snapshot.
    #[must_use]
    pub fn watch_snapshots(&self) -> watch::Receiver<RenderSnapshot> {
        self.snapshots.clone()
    }

    /// A receiver for session events published from now on.
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// A producer handle for the session's notification queue.
    #[must_use]
    pub fn notices(&self) -> NoticeSender {
        self.notices.clone()
    }

    /// Closes the intent channel and waits for the task to tear the session
    /// down.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the task panicked.
    pub async fn shutdown(self) -> Result<(), DomainError> {
        drop(self.intents);
        self.task
            .await
            .map_err(|e| DomainError::Infrastructure(format!("session task failed: {e}")))
    }
}

/// Spawns a task that drives `engine` in real (tokio) time.
#[must_use]
pub fn spawn_session(engine: NarrativeEngine) -> SessionHandle {
    let (intent_tx, intent_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(engine.snapshot());
    let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
    let notices = engine.notice_sender();

    let task = tokio::spawn(run(
        engine,
        intent_rx,
        snapshot_tx,
        event_tx.clone(),
        notices.clone(),
    ));

    SessionHandle {
        intents: intent_tx,
        snapshots: snapshot_rx,
        events: event_tx,
        notices,
        task,
    }
}

async fn run(
    mut engine: NarrativeEngine,
    mut intents: mpsc::UnboundedReceiver<PlayerIntent>,
    snapshots: watch::Sender<RenderSnapshot>,
    events: broadcast::Sender<PlaybackEvent>,
    wake: NoticeSender,
) {
    let origin = Instant::now();
    let start = engine.now();
    let now = move || start.saturating_add(to_millis(origin.elapsed()));
    info!(session_id = %engine.session_id(), "playback session running");

    loop {
        engine.advance_to(now());
        publish(&mut engine, &snapshots, &events);

        let deadline = engine
            .next_deadline()
            .and_then(|at| origin.checked_add(Duration::from_millis(at.saturating_sub(start))));
        let sleep = async {
            match deadline {
                Some(at) => sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            intent = intents.recv() => {
                let Some(intent) = intent else {
                    break;
                };
                engine.advance_to(now());
                if let Err(e) = engine.handle(intent) {
                    warn!(error = %e, "intent rejected");
                }
            }
            () = sleep => {
                debug!("engine deadline reached");
            }
            () = wake.notified() => {
                debug!("notice pushed");
            }
        }
    }

    engine.shutdown();
    publish(&mut engine, &snapshots, &events);
    info!(session_id = %engine.session_id(), "playback session stopped");
}

fn publish(
    engine: &mut NarrativeEngine,
    snapshots: &watch::Sender<RenderSnapshot>,
    events: &broadcast::Sender<PlaybackEvent>,
) {
    for event in engine.drain_events() {
        // No subscribers is fine.
        let _ = events.send(event);
    }
    let next = engine.snapshot();
    snapshots.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
}
