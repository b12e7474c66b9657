//! Sequential playback of speech items.
//!
//! The [`SpeechScheduler`] is the one consumer of a [`SpeechQueue`]: it
//! synthesizes each item, plays it, and reports start/stop transitions to
//! the session coordinator (control channel) and to runtime observers
//! before and after playback. Engine failures become
//! [`ControlEvent::EngineError`]; they never stop the consumer loop.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::engine::{AudioOutput, PlaybackOutcome, SpeechSynthesizer};
use super::messages::{ControlEvent, SpeechItem};
use super::queue::SpeechQueue;
use crate::error::AriaError;
use crate::runtime::RuntimeEvent;

/// Consumer loop playing speech items strictly in sequence order.
pub struct SpeechScheduler {
    queue: Arc<SpeechQueue>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    output: Arc<dyn AudioOutput>,
    control_tx: mpsc::UnboundedSender<ControlEvent>,
    runtime_tx: Option<broadcast::Sender<RuntimeEvent>>,
    cancel: CancellationToken,
}

impl SpeechScheduler {
    /// Create a scheduler over the given queue and engines.
    pub fn new(
        queue: Arc<SpeechQueue>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        output: Arc<dyn AudioOutput>,
        control_tx: mpsc::UnboundedSender<ControlEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            queue,
            synthesizer,
            output,
            control_tx,
            runtime_tx: None,
            cancel,
        }
    }

    /// Attach a runtime event broadcaster for UI/observability.
    pub fn with_runtime_events(mut self, tx: broadcast::Sender<RuntimeEvent>) -> Self {
        self.runtime_tx = Some(tx);
        self
    }

    /// Run the consumer loop until the session is shut down.
    pub async fn run(self) {
        info!("speech scheduler started");
        loop {
            let (item, token) = tokio::select! {
                () = self.cancel.cancelled() => break,
                pair = self.queue.next() => pair,
            };

            // A drain that raced with the pop has already cancelled the
            // token: acknowledge without emitting a single sample.
            if token.is_cancelled() {
                self.queue.finish_active();
                debug!(item = %item.id, "skipping cancelled item before playback");
                continue;
            }

            let _ = self.control_tx.send(ControlEvent::SpeechStarted { item_id: item.id });
            self.emit(RuntimeEvent::Speaking {
                active: true,
                item_id: Some(item.id),
            });

            match self.play_item(&item, &token).await {
                Ok(outcome) => {
                    let interrupted = outcome == PlaybackOutcome::Stopped;
                    self.queue.finish_active();
                    let _ = self.control_tx.send(ControlEvent::SpeechEnded {
                        item_id: item.id,
                        interrupted,
                    });
                    debug!(item = %item.id, seq = item.seq, interrupted, "speech item finished");
                }
                Err(e) => {
                    error!(item = %item.id, error = %e, "speech engine failure");
                    self.queue.finish_active();
                    let _ = self.control_tx.send(ControlEvent::EngineError {
                        item_id: item.id,
                        message: e.to_string(),
                    });
                }
            }

            self.emit(RuntimeEvent::Speaking {
                active: false,
                item_id: None,
            });
        }
        info!("speech scheduler stopped");
    }

    async fn play_item(
        &self,
        item: &SpeechItem,
        token: &CancellationToken,
    ) -> Result<PlaybackOutcome, AriaError> {
        let audio = self.synthesizer.synthesize(&item.text, item.rate).await?;

        // Interrupted while synthesizing: drop the audio.
        if token.is_cancelled() {
            return Ok(PlaybackOutcome::Stopped);
        }

        self.output.play(audio, token).await
    }

    fn emit(&self, event: RuntimeEvent) {
        if let Some(tx) = &self.runtime_tx {
            let _ = tx.send(event);
        }
    }
}
