//! End-to-end session scenarios: coordinator + scheduler + orchestrator
//! wired together with fake engines and a scripted model.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::agent::provider::{ModelProvider, ModelTurn, RequestOptions, ToolDefinition};
use crate::agent::tools::ToolRegistry;
use crate::agent::tools::protocol::ToolServerError;
use crate::agent::tools::stdio::ToolServer;
use crate::agent::tools::types::{ToolCallRequest, ToolDescriptor};
use crate::agent::{AgentConfig, AgentError, ConversationOrchestrator, Message};
use crate::error::Result;
use crate::runtime::RuntimeEvent;
use crate::session::{RUNTIME_EVENT_CAPACITY, SessionCoordinator, SessionHandle, SessionPhase};
use crate::speech::{
    AudioOutput, PlaybackOutcome, SpeechQueue, SpeechScheduler, SpeechSynthesizer, SynthesizedAudio,
};

// ── Fake engines ─────────────────────────────────────────────

/// Synthesizer producing one sample per input byte, so played audio can be
/// traced back to its text.
struct ByteSynth;

#[async_trait]
impl SpeechSynthesizer for ByteSynth {
    async fn synthesize(&self, text: &str, _rate: f32) -> Result<SynthesizedAudio> {
        Ok(SynthesizedAudio {
            samples: vec![0.0; text.len()],
            sample_rate: 16_000,
        })
    }
}

/// Output that sleeps per item and records the byte lengths it fully
/// played; cancellation stops it before anything is recorded.
struct RecordingOutput {
    play_ms: u64,
    heard: Mutex<Vec<usize>>,
}

#[async_trait]
impl AudioOutput for RecordingOutput {
    async fn play(
        &self,
        audio: SynthesizedAudio,
        cancel: &CancellationToken,
    ) -> Result<PlaybackOutcome> {
        if cancel.is_cancelled() {
            return Ok(PlaybackOutcome::Stopped);
        }
        tokio::select! {
            () = cancel.cancelled() => Ok(PlaybackOutcome::Stopped),
            () = tokio::time::sleep(Duration::from_millis(self.play_ms)) => {
                self.heard
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(audio.samples.len());
                Ok(PlaybackOutcome::Completed)
            }
        }
    }
}

// ── Scripted model and fixture tools ─────────────────────────

struct ScriptedProvider {
    turns: Mutex<Vec<ModelTurn>>,
}

impl ScriptedProvider {
    fn new(turns: Vec<ModelTurn>) -> Self {
        Self {
            turns: Mutex::new(turns),
        }
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        _messages: &[Message],
        _tools: &[ToolDefinition],
        _options: &RequestOptions,
    ) -> std::result::Result<ModelTurn, AgentError> {
        let mut turns = self.turns.lock().unwrap_or_else(|e| e.into_inner());
        if turns.is_empty() {
            Ok(ModelTurn::text_only("done"))
        } else {
            Ok(turns.remove(0))
        }
    }
}

struct FixtureServer;

#[async_trait]
impl ToolServer for FixtureServer {
    fn id(&self) -> &str {
        "fixture"
    }

    async fn list_tools(&self) -> std::result::Result<Vec<ToolDescriptor>, ToolServerError> {
        let schema = serde_json::json!({"type": "object", "properties": {}});
        Ok(["think", "search"]
            .iter()
            .map(|name| ToolDescriptor {
                name: (*name).to_owned(),
                description: format!("{name} tool"),
                parameters: schema.clone(),
                server_id: "fixture".into(),
            })
            .collect())
    }

    async fn call(
        &self,
        tool: &str,
        _arguments: &serde_json::Value,
    ) -> std::result::Result<String, ToolServerError> {
        Ok(format!("{tool} ok"))
    }
}

// ── Rig ──────────────────────────────────────────────────────

struct Rig {
    handle: SessionHandle,
    output: Arc<RecordingOutput>,
    events: broadcast::Receiver<RuntimeEvent>,
    cancel: CancellationToken,
}

async fn rig(turns: Vec<ModelTurn>, play_ms: u64) -> Rig {
    let queue = Arc::new(SpeechQueue::new());
    let mut registry = ToolRegistry::new();
    let _ = registry.register(Arc::new(FixtureServer)).await;

    let (runtime_tx, events) = broadcast::channel(RUNTIME_EVENT_CAPACITY);
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let orchestrator = ConversationOrchestrator::new(
        AgentConfig::new(),
        Arc::new(ScriptedProvider::new(turns)),
        Arc::new(registry),
        Arc::clone(&queue),
    )
    .with_runtime_events(runtime_tx.clone());

    let output = Arc::new(RecordingOutput {
        play_ms,
        heard: Mutex::new(Vec::new()),
    });
    // Speaking transitions are published by the coordinator from control
    // events, so the scheduler itself stays silent here.
    let scheduler = SpeechScheduler::new(
        Arc::clone(&queue),
        Arc::new(ByteSynth),
        Arc::clone(&output) as Arc<dyn AudioOutput>,
        control_tx,
        cancel.clone(),
    );
    tokio::spawn(scheduler.run());

    let coordinator = SessionCoordinator::new(
        orchestrator,
        Arc::clone(&queue),
        control_rx,
        runtime_tx,
        cancel.clone(),
    );
    let handle = coordinator.handle();
    tokio::spawn(coordinator.run());

    Rig {
        handle,
        output,
        events,
        cancel,
    }
}

fn think_turn(thought: &str) -> ModelTurn {
    ModelTurn {
        text: String::new(),
        tool_calls: vec![ToolCallRequest {
            call_id: "think-1".into(),
            tool_name: "think".into(),
            arguments_json: format!(r#"{{"thought":"{thought}"}}"#),
        }],
    }
}

async fn next_event(rx: &mut broadcast::Receiver<RuntimeEvent>) -> Option<RuntimeEvent> {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .ok()
        .and_then(|r| r.ok())
}

async fn wait_for<F: Fn(&RuntimeEvent) -> bool>(
    rx: &mut broadcast::Receiver<RuntimeEvent>,
    pred: F,
) -> bool {
    for _ in 0..50 {
        match next_event(rx).await {
            Some(ev) if pred(&ev) => return true,
            Some(_) => continue,
            None => return false,
        }
    }
    false
}

async fn wait_idle(handle: &SessionHandle) -> bool {
    for _ in 0..400 {
        if handle.state().phase == SessionPhase::Idle {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

// ── Scenarios ────────────────────────────────────────────────

#[tokio::test]
async fn full_turn_speaks_reasoning_then_answer() {
    let mut rig = rig(
        vec![
            think_turn("Checking your notes."),
            ModelTurn::text_only("You have two notes."),
        ],
        5,
    )
    .await;

    rig.handle.begin_listening();
    rig.handle.end_listening("What's in my notes?");

    assert!(wait_idle(&rig.handle).await);

    // Both items were fully played, reasoning first (shorter vs answer
    // lengths identify them).
    let heard = rig.output.heard.lock().unwrap_or_else(|e| e.into_inner()).clone();
    assert_eq!(heard.len(), 2);
    assert_eq!(heard[0], "Checking your notes.".len());
    assert_eq!(heard[1], "You have two notes.".len());

    // The event stream saw the reasoning fragment and the answer.
    let mut saw_reasoning = false;
    let mut saw_answer = false;
    while let Ok(ev) = rig.events.try_recv() {
        match ev {
            RuntimeEvent::Reasoning { text } => {
                assert_eq!(text, "Checking your notes.");
                saw_reasoning = true;
            }
            RuntimeEvent::Answer { text } => {
                assert_eq!(text, "You have two notes.");
                saw_answer = true;
            }
            _ => {}
        }
    }
    assert!(saw_reasoning && saw_answer);
    rig.cancel.cancel();
}

#[tokio::test]
async fn barge_in_silences_playback_before_capture_resumes() {
    let mut rig = rig(
        vec![
            ModelTurn::text_only("A very long answer that keeps playing."),
            ModelTurn::text_only("Second answer."),
        ],
        500,
    )
    .await;

    rig.handle.begin_listening();
    rig.handle.end_listening("First question");

    // Wait until the answer is audibly playing.
    assert!(
        wait_for(&mut rig.events, |ev| matches!(
            ev,
            RuntimeEvent::Speaking { active: true, .. }
        ))
        .await
    );

    // Barge-in: the capture path interrupts, then listening starts.
    rig.handle.begin_listening();
    let state = rig.handle.state();
    assert!(state.listening);
    assert!(!state.speaking);
    assert_eq!(state.phase, SessionPhase::Listening);

    // Nothing from the first answer was ever fully played.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rig.output.heard.lock().unwrap_or_else(|e| e.into_inner()).is_empty());

    // The next turn still speaks normally.
    rig.handle.end_listening("Second question");
    assert!(wait_idle(&rig.handle).await);
    let heard = rig.output.heard.lock().unwrap_or_else(|e| e.into_inner()).clone();
    assert_eq!(heard, vec!["Second answer.".len()]);
    rig.cancel.cancel();
}

#[tokio::test]
async fn request_interrupt_alone_empties_queue_and_settles() {
    let rig = rig(vec![ModelTurn::text_only("Long answer to interrupt.")], 500).await;

    rig.handle.begin_listening();
    rig.handle.end_listening("Question");

    // Give the turn time to enqueue and start playback.
    for _ in 0..200 {
        if rig.handle.state().speaking {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    rig.handle.request_interrupt();
    let state = rig.handle.state();
    assert!(!state.speaking);
    assert!(wait_idle(&rig.handle).await);
    assert!(rig.output.heard.lock().unwrap_or_else(|e| e.into_inner()).is_empty());
    rig.cancel.cancel();
}

#[tokio::test]
async fn status_stream_reports_processing_window() {
    let mut rig = rig(vec![ModelTurn::text_only("Quick.")], 5).await;

    rig.handle.begin_listening();
    rig.handle.end_listening("Go");

    assert!(
        wait_for(&mut rig.events, |ev| matches!(
            ev,
            RuntimeEvent::Processing { active: true }
        ))
        .await
    );
    assert!(
        wait_for(&mut rig.events, |ev| matches!(
            ev,
            RuntimeEvent::Processing { active: false }
        ))
        .await
    );
    rig.cancel.cancel();
}
