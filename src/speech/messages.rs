//! Message types for the speech output pipeline.

use uuid::Uuid;

/// What a spoken item represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechKind {
    /// An intermediate reasoning fragment, spoken faster so multi-step
    /// tool use does not feel slow.
    Reasoning,
    /// The final answer for a turn.
    Answer,
}

/// One unit of spoken output.
///
/// Produced by the orchestrator and consumed by the scheduler strictly in
/// `seq` order. The sequence number is stamped by the queue at enqueue
/// time.
#[derive(Debug, Clone)]
pub struct SpeechItem {
    /// Stable identifier, reported in speaking start/stop transitions.
    pub id: Uuid,
    /// The text to speak.
    pub text: String,
    /// Reasoning fragment or final answer.
    pub kind: SpeechKind,
    /// Playback rate multiplier handed to the synthesis engine.
    pub rate: f32,
    /// Playback position in the session's total ordering.
    pub seq: u64,
}

impl SpeechItem {
    /// Create a new item. The sequence number is assigned on enqueue.
    pub fn new(text: impl Into<String>, kind: SpeechKind, rate: f32) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            kind,
            rate,
            seq: 0,
        }
    }
}

/// Synthesized audio from the speech engine, ready for playback.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    /// f32 audio samples, mono.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

/// Low-latency control events from the speech scheduler to the session
/// coordinator.
#[derive(Debug, Clone)]
pub enum ControlEvent {
    /// Playback of an item is about to start.
    SpeechStarted {
        /// The item entering playback.
        item_id: Uuid,
    },
    /// Playback of an item ended.
    SpeechEnded {
        /// The item that ended.
        item_id: Uuid,
        /// True when ended by cancellation rather than completion.
        interrupted: bool,
    },
    /// The synthesis or playback engine failed on an item.
    EngineError {
        /// The item that failed.
        item_id: Uuid,
        /// Failure description.
        message: String,
    },
}
