//! Duplex session coordination: listening, processing, speaking.
//!
//! The [`SessionCoordinator`] is the concurrency authority for one
//! session. It owns the mutually-exclusive listening/speaking state,
//! gates audio capture against the system's own voice, interrupts the
//! speech scheduler on barge-in, and publishes every transition as a
//! [`RuntimeEvent`]. Turn processing runs on a dedicated task so model and
//! tool latency never block state transitions.
//!
//! ```text
//! Idle -> Listening -> Processing -> Speaking -> Idle
//!            ^                          |
//!            +----- barge-in ----------+
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agent::ConversationOrchestrator;
use crate::agent::types::StopReason;
use crate::runtime::RuntimeEvent;
use crate::speech::messages::ControlEvent;
use crate::speech::queue::SpeechQueue;

/// Capacity of the runtime event broadcast channel.
pub const RUNTIME_EVENT_CAPACITY: usize = 64;

/// The session's coarse phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Nothing in flight.
    Idle,
    /// Audio capture is active.
    Listening,
    /// A user turn is being processed.
    Processing,
    /// Speech output is playing.
    Speaking,
}

/// Snapshot of the session's duplex state.
///
/// Mutated only through coordinator operations; observers receive copies.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Coarse phase.
    pub phase: SessionPhase,
    /// True while audio capture is accepted.
    pub listening: bool,
    /// True while speech output is playing.
    pub speaking: bool,
    /// The item currently in playback, if any.
    pub active_item: Option<Uuid>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            listening: false,
            speaking: false,
            active_item: None,
        }
    }
}

struct Shared {
    state: Mutex<SessionState>,
    queue: Arc<SpeechQueue>,
    /// Cancellation token of the turn currently in flight.
    turn_cancel: Mutex<CancellationToken>,
    processing: AtomicBool,
    runtime_tx: broadcast::Sender<RuntimeEvent>,
    transcript_tx: mpsc::UnboundedSender<String>,
}

impl Shared {
    fn emit(&self, event: RuntimeEvent) {
        let _ = self.runtime_tx.send(event);
    }

    fn snapshot(&self) -> SessionState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Cancel playback and the speech path of any in-flight turn, then
    /// mark the session as no longer speaking.
    ///
    /// Safe from any thread at any time; idempotent. Once this returns,
    /// the queue acknowledges the cancellation and no further audio can
    /// start from previously enqueued items.
    fn interrupt(&self) {
        let dropped = self.queue.drain_and_cancel();
        self.turn_cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cancel();

        let was_speaking = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let was = state.speaking;
            state.speaking = false;
            state.active_item = None;
            was
        };

        if was_speaking || dropped > 0 {
            info!(dropped, "speech interrupted");
            self.emit(RuntimeEvent::Speaking {
                active: false,
                item_id: None,
            });
        }
    }

    /// Fall back to Idle when nothing is listening, speaking, or queued.
    fn settle(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.listening
            && !state.speaking
            && !self.processing.load(Ordering::Acquire)
            && self.queue.is_idle()
        {
            state.phase = SessionPhase::Idle;
        }
    }
}

/// Thread-safe operations on a running session.
///
/// Cloneable; the audio-capture path holds one to gate capture and to
/// signal barge-in.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl SessionHandle {
    /// Begin accepting audio capture.
    ///
    /// If the system is speaking, the active output is interrupted first:
    /// capturing while the session's own voice plays would feed it back
    /// into recognition.
    pub fn begin_listening(&self) {
        self.shared.interrupt();
        {
            let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
            state.listening = true;
            state.phase = SessionPhase::Listening;
        }
        self.shared.emit(RuntimeEvent::Listening { active: true });
    }

    /// Stop capture and hand a finalized transcript to the orchestrator.
    ///
    /// An empty transcript just closes the listening window.
    pub fn end_listening(&self, transcript: &str) {
        {
            let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
            state.listening = false;
            if !transcript.trim().is_empty() {
                state.phase = SessionPhase::Processing;
            }
        }
        self.shared.emit(RuntimeEvent::Listening { active: false });

        if transcript.trim().is_empty() {
            self.shared.settle();
            return;
        }
        if self.shared.transcript_tx.send(transcript.to_owned()).is_err() {
            warn!("session is shut down; transcript dropped");
        }
    }

    /// Interrupt speech output immediately (barge-in).
    ///
    /// The only cancellation primitive: drains the speech queue, stops
    /// the active item, and cancels the in-flight turn's speech path.
    /// In-flight tool calls run to completion and their results stay in
    /// history, but nothing further is spoken.
    pub fn request_interrupt(&self) {
        self.shared.interrupt();
        self.shared.settle();
    }

    /// A snapshot of the current session state.
    pub fn state(&self) -> SessionState {
        self.shared.snapshot()
    }

    /// Subscribe to the session's runtime events.
    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.shared.runtime_tx.subscribe()
    }
}

/// The session's coordination loops.
///
/// Construct with the orchestrator and the speech queue shared with the
/// scheduler, take a [`SessionHandle`], then drive [`run`](Self::run) to
/// completion on its own task.
pub struct SessionCoordinator {
    orchestrator: Option<ConversationOrchestrator>,
    shared: Arc<Shared>,
    control_rx: mpsc::UnboundedReceiver<ControlEvent>,
    transcript_rx: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
}

impl SessionCoordinator {
    /// Create a coordinator.
    ///
    /// # Arguments
    ///
    /// * `orchestrator` — the session's turn processor
    /// * `queue` — the speech queue shared with the
    ///   [`SpeechScheduler`](crate::speech::SpeechScheduler)
    /// * `control_rx` — control events from the scheduler
    /// * `runtime_tx` — the session's event broadcast
    /// * `cancel` — session shutdown token
    pub fn new(
        orchestrator: ConversationOrchestrator,
        queue: Arc<SpeechQueue>,
        control_rx: mpsc::UnboundedReceiver<ControlEvent>,
        runtime_tx: broadcast::Sender<RuntimeEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let (transcript_tx, transcript_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            state: Mutex::new(SessionState::new()),
            queue,
            turn_cancel: Mutex::new(CancellationToken::new()),
            processing: AtomicBool::new(false),
            runtime_tx,
            transcript_tx,
        });
        Self {
            orchestrator: Some(orchestrator),
            shared,
            control_rx,
            transcript_rx,
            cancel,
        }
    }

    /// Operations handle for the capture path and frontends.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Run the coordination loops until shutdown.
    ///
    /// Spawns the turn-processing task (so model and tool latency stay
    /// off the coordination path) and consumes scheduler control events.
    pub async fn run(mut self) {
        let orchestrator = match self.orchestrator.take() {
            Some(o) => o,
            None => return,
        };

        let turn_task = tokio::spawn(run_turn_stage(
            orchestrator,
            self.transcript_rx,
            Arc::clone(&self.shared),
            self.cancel.clone(),
        ));

        info!("session coordinator started");
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                event = self.control_rx.recv() => {
                    match event {
                        Some(event) => handle_control_event(&self.shared, event),
                        None => break,
                    }
                }
            }
        }

        turn_task.abort();
        info!("session coordinator stopped");
    }
}

fn handle_control_event(shared: &Arc<Shared>, event: ControlEvent) {
    match event {
        ControlEvent::SpeechStarted { item_id } => {
            {
                let mut state = shared.state.lock().unwrap_or_else(|e| e.into_inner());
                state.speaking = true;
                state.active_item = Some(item_id);
                state.phase = SessionPhase::Speaking;
            }
            shared.emit(RuntimeEvent::Speaking {
                active: true,
                item_id: Some(item_id),
            });
        }
        ControlEvent::SpeechEnded { item_id, interrupted } => {
            {
                let mut state = shared.state.lock().unwrap_or_else(|e| e.into_inner());
                if state.active_item == Some(item_id) {
                    state.active_item = None;
                }
                state.speaking = false;
                // A gap between reasoning items while the turn is still
                // running reads as Processing, not Speaking.
                if shared.processing.load(Ordering::Acquire) && !state.listening {
                    state.phase = SessionPhase::Processing;
                }
            }
            if !interrupted {
                // Interrupts already emitted the stop transition.
                shared.emit(RuntimeEvent::Speaking {
                    active: false,
                    item_id: None,
                });
            }
            shared.settle();
        }
        ControlEvent::EngineError { item_id, message } => {
            error!(item = %item_id, error = %message, "audio engine failure");
            shared.queue.drain_and_cancel();
            {
                let mut state = shared.state.lock().unwrap_or_else(|e| e.into_inner());
                state.speaking = false;
                state.active_item = None;
            }
            shared.emit(RuntimeEvent::Error { message });
            shared.settle();
        }
    }
}

/// Turn-processing stage: consumes finalized transcripts and drives the
/// orchestrator, one turn at a time.
async fn run_turn_stage(
    mut orchestrator: ConversationOrchestrator,
    mut transcript_rx: mpsc::UnboundedReceiver<String>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    loop {
        let transcript = tokio::select! {
            () = cancel.cancelled() => break,
            t = transcript_rx.recv() => match t {
                Some(t) => t,
                None => break,
            },
        };

        // Fresh per-turn token so an earlier barge-in cannot poison the
        // next turn.
        let turn_cancel = CancellationToken::new();
        *shared
            .turn_cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = turn_cancel.clone();

        shared.processing.store(true, Ordering::Release);
        {
            let mut state = shared.state.lock().unwrap_or_else(|e| e.into_inner());
            state.phase = SessionPhase::Processing;
        }
        shared.emit(RuntimeEvent::Processing { active: true });

        let outcome = orchestrator.handle_user_turn(&transcript, &turn_cancel).await;

        shared.processing.store(false, Ordering::Release);
        shared.emit(RuntimeEvent::Processing { active: false });

        match outcome {
            Ok(outcome) => {
                if outcome.stop_reason == StopReason::Cancelled {
                    info!(iterations = outcome.iterations, "turn interrupted");
                }
                shared.settle();
            }
            Err(e) => {
                // Unrecoverable turn failure: never leave the session
                // stuck in Processing.
                error!(error = %e, "turn failed");
                shared.queue.drain_and_cancel();
                {
                    let mut state = shared.state.lock().unwrap_or_else(|e| e.into_inner());
                    state.speaking = false;
                    state.active_item = None;
                    if !state.listening {
                        state.phase = SessionPhase::Idle;
                    }
                }
                shared.emit(RuntimeEvent::Error {
                    message: e.to_string(),
                });
            }
        }
    }
}
