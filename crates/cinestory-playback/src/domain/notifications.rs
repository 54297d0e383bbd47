//! FIFO queue of transient player notices.
//!
//! Producers push through a cloneable [`NoticeSender`] from any thread. The
//! engine is the single consumer: it polls the queue on its wall timeline
//! and shows at most one notice at a time.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cinestory_core::clock::Millis;
use serde::Serialize;
use tokio::sync::Notify;

/// A transient message for the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Push-order identifier.
    pub id: u64,
    /// Display text.
    pub text: String,
}

#[derive(Debug, Default)]
struct Shared {
    pending: Mutex<VecDeque<Notice>>,
    next_id: AtomicU64,
    wake: Notify,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, VecDeque<Notice>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Producer handle for the notification queue.
#[derive(Debug, Clone)]
pub struct NoticeSender {
    shared: Arc<Shared>,
}

impl NoticeSender {
    /// Appends a notice and wakes the consumer. Returns the notice id.
    pub fn push(&self, text: impl Into<String>) -> u64 {
        let text = text.into();
        // Id allocation and enqueue happen under one lock so ids stay in
        // queue order across threads.
        let id = {
            let mut pending = self.shared.pending();
            let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
            pending.push_back(Notice { id, text });
            id
        };
        self.shared.wake.notify_one();
        id
    }

    /// Resolves after the next push.
    pub async fn notified(&self) {
        self.shared.wake.notified().await;
    }
}

#[derive(Debug, Clone)]
struct Showing {
    notice: Notice,
    until: Millis,
}

/// Consumer side of the notification queue.
#[derive(Debug)]
pub struct NotificationQueue {
    shared: Arc<Shared>,
    visible_ms: Millis,
    gap_ms: Millis,
    showing: Option<Showing>,
    gap_until: Option<Millis>,
}

impl NotificationQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new(visible_ms: Millis, gap_ms: Millis) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            visible_ms,
            gap_ms,
            showing: None,
            gap_until: None,
        }
    }

    /// A producer handle.
    #[must_use]
    pub fn sender(&self) -> NoticeSender {
        NoticeSender {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Updates the visible notice for wall time `now`. Returns whether the
    /// visible notice changed.
    pub fn poll(&mut self, now: Millis) -> bool {
        let mut changed = false;

        if let Some(showing) = &self.showing {
            if now >= showing.until {
                self.gap_until = Some(showing.until.saturating_add(self.gap_ms));
                self.showing = None;
                changed = true;
            }
        }

        if self.showing.is_none() && self.gap_until.is_none_or(|gap| now >= gap) {
            self.gap_until = None;
            if let Some(notice) = self.shared.pending().pop_front() {
                self.showing = Some(Showing {
                    notice,
                    until: now.saturating_add(self.visible_ms),
                });
                changed = true;
            }
        }

        changed
    }

    /// The notice currently visible.
    #[must_use]
    pub fn current(&self) -> Option<&Notice> {
        self.showing.as_ref().map(|showing| &showing.notice)
    }

    /// Number of notices waiting behind the visible one.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.shared.pending().len()
    }

    /// Wall time at which `poll` next has work to do.
    #[must_use]
    pub fn next_deadline(&self, now: Millis) -> Option<Millis> {
        if let Some(showing) = &self.showing {
            return Some(showing.until);
        }
        if self.pending_len() == 0 {
            return None;
        }
        Some(self.gap_until.unwrap_or(now).max(now))
    }
}
