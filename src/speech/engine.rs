//! Speech engine seams: synthesis and audio playback.
//!
//! The acoustic engines are external collaborators; the scheduler only
//! needs text-to-audio conversion and an interruptible sink. Production
//! hosts plug in their TTS backend and device output here; tests use
//! in-memory fakes.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::messages::SynthesizedAudio;
use crate::error::Result;

/// Converts text to audio at a playback rate multiplier.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` to audio samples.
    ///
    /// # Errors
    ///
    /// Returns [`AriaError::Audio`](crate::error::AriaError::Audio) when
    /// the engine fails; the scheduler surfaces this as an engine error
    /// event rather than stopping its loop.
    async fn synthesize(&self, text: &str, rate: f32) -> Result<SynthesizedAudio>;
}

/// How a playback attempt finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// All samples were played.
    Completed,
    /// Playback was stopped by cancellation.
    Stopped,
}

/// Plays synthesized audio, stopping immediately on cancellation.
///
/// Implementations must observe `cancel` before emitting the first sample
/// and throughout playback: once the token is cancelled, no further audio
/// may reach the device.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Play the audio to the output device.
    ///
    /// # Errors
    ///
    /// Returns [`AriaError::Audio`](crate::error::AriaError::Audio) on
    /// device or stream failures.
    async fn play(
        &self,
        audio: SynthesizedAudio,
        cancel: &CancellationToken,
    ) -> Result<PlaybackOutcome>;
}
