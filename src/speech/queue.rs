//! Ordered, cancellable queue of speech items.
//!
//! The [`SpeechQueue`] is the single hand-off point between the
//! orchestrator (producer) and the scheduler (the one consumer). Items
//! play strictly in enqueue order;
//! [`drain_and_cancel`](SpeechQueue::drain_and_cancel) clears the backlog
//! and cancels the active item's token in one critical section, so once it
//! returns no new audio can start from anything enqueued before the call.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::messages::SpeechItem;

struct QueueState {
    items: VecDeque<SpeechItem>,
    /// The item currently in playback and its cancellation token.
    active: Option<(Uuid, CancellationToken)>,
}

/// Ordered speech item queue with a single consumer.
pub struct SpeechQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    next_seq: AtomicU64,
}

impl Default for SpeechQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                active: None,
            }),
            notify: Notify::new(),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Append an item, stamping its sequence number. Returns the stamped
    /// sequence.
    pub fn enqueue(&self, mut item: SpeechItem) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        item.seq = seq;
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.items.push_back(item);
        }
        self.notify.notify_one();
        seq
    }

    /// Drop all queued items and cancel the active one.
    ///
    /// Idempotent and safe to call from any thread while the consumer
    /// loop is running. Returns the number of queued (not yet started)
    /// items that were dropped.
    pub fn drain_and_cancel(&self) -> usize {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let dropped = state.items.len();
        state.items.clear();
        if let Some((_, token)) = &state.active {
            token.cancel();
        }
        dropped
    }

    /// Number of queued (not yet started) items.
    pub fn len(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.items.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when nothing is queued and nothing is playing.
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.items.is_empty() && state.active.is_none()
    }

    /// Wait for the next item and mark it active.
    ///
    /// The returned token is cancelled by
    /// [`drain_and_cancel`](Self::drain_and_cancel); the consumer must
    /// check it before starting playback and pass it to the audio sink.
    pub async fn next(&self) -> (SpeechItem, CancellationToken) {
        loop {
            if let Some(pair) = self.begin_next() {
                return pair;
            }
            self.notify.notified().await;
        }
    }

    /// Clear the active-item slot after playback finishes or is cancelled.
    pub fn finish_active(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.active = None;
    }

    fn begin_next(&self) -> Option<(SpeechItem, CancellationToken)> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let item = state.items.pop_front()?;
        let token = CancellationToken::new();
        state.active = Some((item.id, token.clone()));
        Some((item, token))
    }
}
