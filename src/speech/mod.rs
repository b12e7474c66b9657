//! Speech output: sequential, instantly-interruptible playback.
//!
//! The orchestrator enqueues [`SpeechItem`]s (reasoning fragments and the
//! final answer, each with a playback rate); the [`SpeechScheduler`] plays
//! them one at a time in sequence order through black-box synthesis and
//! output engines. Barge-in calls
//! [`SpeechQueue::drain_and_cancel`], after which no queued or active item
//! emits audio.

pub mod engine;
pub mod messages;
pub mod queue;
pub mod scheduler;

pub use engine::{AudioOutput, PlaybackOutcome, SpeechSynthesizer};
pub use messages::{ControlEvent, SpeechItem, SpeechKind, SynthesizedAudio};
pub use queue::SpeechQueue;
pub use scheduler::SpeechScheduler;
