//! Per-connection session engine
//!
//! Owns the segmenter, the silence timer, and at most one in-flight pipeline
//! task per session. The engine task is the only writer of engine state;
//! timer and pipeline tasks report back through the signal channel instead of
//! touching state themselves. Both carry an epoch so a signal from a canceled
//! timer or a superseded pipeline is recognized and ignored.
//!
//! Utterance pipeline: transcribe, run one dialog turn, synthesize, emit.
//! While a pipeline runs the processing gate stays claimed and any further
//! completed utterance is dropped. Barge-in marks the session interrupted,
//! tells the client to stop playback, and releases the gate immediately; the
//! superseded pipeline keeps running but every later emission it would make
//! is suppressed, and it is aborted and waited out before the next pipeline
//! starts.

use crate::agent::dialog::DialogOrchestrator;
use crate::agent::tools::{self, ToolInvoker};
use crate::config::Config;
use crate::providers::Providers;
use crate::server::events::{ClientEvent, ServerEvent};
use crate::session::{accounting, Session};
use crate::types::Turn;
use crate::voice::{self, AudioSegmenter, ChunkOutcome, SynthesisRouter};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Messages the engine's helper tasks send back to the engine loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineSignal {
    /// The armed silence window ran out without new speech.
    SilenceElapsed { epoch: u64 },
    /// An utterance pipeline ran to completion.
    PipelineFinished { epoch: u64 },
    /// The server wants this session gone.
    Terminate,
}

pub struct SessionEngine {
    session: Session,
    segmenter: AudioSegmenter,
    providers: Arc<Providers>,
    orchestrator: DialogOrchestrator,
    invoker: ToolInvoker,
    router: SynthesisRouter,
    outbound: mpsc::Sender<ServerEvent>,
    signal_tx: mpsc::Sender<EngineSignal>,
    silence_window: Duration,
    timer: Option<JoinHandle<()>>,
    timer_epoch: u64,
    pipeline: Option<JoinHandle<()>>,
    pipeline_epoch: u64,
}

impl SessionEngine {
    /// Build an engine for one accepted connection. The returned receiver
    /// must be passed back into [`run`](Self::run).
    pub fn new(
        session: Session,
        providers: Arc<Providers>,
        config: &Config,
        outbound: mpsc::Sender<ServerEvent>,
    ) -> (Self, mpsc::Receiver<EngineSignal>) {
        let (signal_tx, signal_rx) = mpsc::channel(16);
        let invoker = ToolInvoker::new(providers.http.clone(), providers.rows.clone());
        let orchestrator = DialogOrchestrator::new(
            providers.llm.clone(),
            invoker.clone(),
            config.dialog.max_tool_iterations,
        );
        let router = SynthesisRouter::new(
            &config.synthesis,
            providers.speech_default.clone(),
            providers.speech_alternate.clone(),
        );
        let engine = Self {
            session,
            segmenter: AudioSegmenter::new(&config.segmenter),
            providers,
            orchestrator,
            invoker,
            router,
            outbound,
            signal_tx,
            silence_window: Duration::from_millis(config.segmenter.silence_window_ms),
            timer: None,
            timer_epoch: 0,
            pipeline: None,
            pipeline_epoch: 0,
        };
        (engine, signal_rx)
    }

    /// A sender the registry can use to signal this engine.
    pub fn signal_sender(&self) -> mpsc::Sender<EngineSignal> {
        self.signal_tx.clone()
    }

    /// Drive the session until the client goes away or the server terminates
    /// it, then run teardown exactly once.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<ClientEvent>,
        mut signals: mpsc::Receiver<EngineSignal>,
    ) {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_client_event(event).await,
                    None => break,
                },
                signal = signals.recv() => match signal {
                    Some(signal) => {
                        if !self.handle_signal(signal).await {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        self.shutdown().await;
    }

    async fn handle_client_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Audio { data } => {
                let pcm = match BASE64.decode(&data) {
                    Ok(pcm) => pcm,
                    Err(err) => {
                        debug!("dropping undecodable audio frame: {err}");
                        return;
                    }
                };
                self.on_audio(&pcm);
            }
            ClientEvent::Ping => self.send(ServerEvent::Pong).await,
            ClientEvent::StopSpeaking => self.interrupt().await,
        }
    }

    fn on_audio(&mut self, pcm: &[u8]) {
        match self.segmenter.ingest(pcm) {
            ChunkOutcome::SpeechActive => self.cancel_silence_timer(),
            ChunkOutcome::ArmSilenceTimer => self.arm_silence_timer(),
            ChunkOutcome::Buffered => {}
        }
    }

    /// Barge-in. Mark the in-flight turn interrupted, halt client playback,
    /// and release the processing gate so the next utterance starts fresh.
    async fn interrupt(&mut self) {
        debug!(connection = %self.session.meta.connection_id, "user interrupted playback");
        self.session.flags.interrupt();
        self.send(ServerEvent::StopAudio).await;
        self.session.flags.end_processing();
    }

    /// Returns false when the engine should stop.
    async fn handle_signal(&mut self, signal: EngineSignal) -> bool {
        match signal {
            EngineSignal::SilenceElapsed { epoch } => {
                if epoch != self.timer_epoch {
                    return true;
                }
                self.timer = None;
                if let Some(utterance) = self.segmenter.silence_elapsed() {
                    self.spawn_pipeline(utterance).await;
                }
                true
            }
            EngineSignal::PipelineFinished { epoch } => {
                if epoch == self.pipeline_epoch {
                    self.session.flags.end_processing();
                    self.pipeline = None;
                }
                true
            }
            EngineSignal::Terminate => false,
        }
    }

    /// One-shot timer for the current quiet span. Re-arming replaces the
    /// previous timer; the epoch bump invalidates any already-fired signal.
    fn arm_silence_timer(&mut self) {
        self.cancel_silence_timer();
        self.timer_epoch += 1;
        let epoch = self.timer_epoch;
        let window = self.silence_window;
        let signal_tx = self.signal_tx.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let _ = signal_tx.send(EngineSignal::SilenceElapsed { epoch }).await;
        }));
    }

    fn cancel_silence_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.timer_epoch += 1;
    }

    async fn spawn_pipeline(&mut self, utterance: Vec<u8>) {
        if !self.session.flags.try_begin_processing() {
            debug!(
                connection = %self.session.meta.connection_id,
                bytes = utterance.len(),
                "utterance dropped, a turn is already in flight"
            );
            return;
        }
        if let Some(stale) = self.pipeline.take() {
            stale.abort();
            // An aborted turn mid-poll can still flush one last emission;
            // wait for it to wind down before the interrupt flag clears.
            let _ = stale.await;
        }
        self.session.flags.clear_interrupt();
        self.pipeline_epoch += 1;

        let epoch = self.pipeline_epoch;
        let session = self.session.clone();
        let providers = self.providers.clone();
        let orchestrator = self.orchestrator.clone();
        let router = self.router.clone();
        let outbound = self.outbound.clone();
        let signal_tx = self.signal_tx.clone();
        self.pipeline = Some(tokio::spawn(async move {
            run_turn(session, providers, orchestrator, router, outbound, utterance).await;
            let _ = signal_tx
                .send(EngineSignal::PipelineFinished { epoch })
                .await;
        }));
    }

    async fn shutdown(mut self) {
        self.cancel_silence_timer();
        self.segmenter.cancel();
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.abort();
        }

        let dialog = self.session.dialog.lock().await;
        for tool in self.session.profile.tools.iter() {
            if !tool.run_after_call || dialog.history.is_empty() {
                continue;
            }
            let outcome = tools::extract_data_from_conversation(
                self.providers.llm.as_ref(),
                &self.session.profile.model,
                dialog.history.turns(),
                tool,
            )
            .await;
            if !outcome.success {
                warn!(
                    tool = %tool.name,
                    missing = ?outcome.missing_fields,
                    "after-call tool skipped, required fields not found in conversation"
                );
                continue;
            }
            if self.invoker.execute(tool, &outcome.data).await {
                info!(tool = %tool.name, "after-call tool executed");
            } else {
                warn!(tool = %tool.name, "after-call tool failed");
            }
        }

        let duration_secs = self.session.meta.started_instant.elapsed().as_secs();
        accounting::finalize(&self.providers, &self.session.meta, &dialog, duration_secs).await;
        info!(
            connection = %self.session.meta.connection_id,
            duration_secs,
            "session closed"
        );
    }

    async fn send(&self, event: ServerEvent) {
        if self.outbound.send(event).await.is_err() {
            debug!("outbound channel closed, event dropped");
        }
    }
}

/// One utterance through the full pipeline. Each stage checks the interrupt
/// flag before emitting so a barged-in turn goes quiet mid-flight.
async fn run_turn(
    session: Session,
    providers: Arc<Providers>,
    orchestrator: DialogOrchestrator,
    router: SynthesisRouter,
    outbound: mpsc::Sender<ServerEvent>,
    utterance: Vec<u8>,
) {
    let connection = session.meta.connection_id.clone();

    let transcript =
        match voice::transcribe_utterance(providers.transcriber.as_ref(), &utterance).await {
            Ok(text) => text.trim().to_string(),
            Err(err) => {
                warn!(connection = %connection, "transcription failed: {err}");
                let _ = outbound
                    .send(ServerEvent::Error {
                        message: "Failed to transcribe audio. Please try again.".to_string(),
                    })
                    .await;
                return;
            }
        };
    if transcript.is_empty() {
        debug!(connection = %connection, "empty transcript, discarding utterance");
        return;
    }

    if session.flags.is_interrupted() {
        return;
    }
    let _ = outbound
        .send(ServerEvent::Transcript {
            text: transcript.clone(),
            is_final: true,
        })
        .await;

    let reply = {
        let mut dialog = session.dialog.lock().await;
        let outcome = orchestrator
            .respond(&mut dialog.history, &session.profile, &transcript)
            .await;
        dialog.tokens_in += outcome.usage.input;
        dialog.tokens_out += outcome.usage.output;
        dialog.history.push(Turn::assistant(outcome.text.clone()));
        outcome.text
    };

    if session.flags.is_interrupted() {
        return;
    }
    let _ = outbound
        .send(ServerEvent::AgentResponse { text: reply.clone() })
        .await;

    if session.flags.is_interrupted() {
        return;
    }
    match router.synthesize(&session.profile.voice_id, &reply).await {
        Ok(speech) => {
            {
                let mut dialog = session.dialog.lock().await;
                dialog.synthesis_chars += reply.chars().count() as u64;
            }
            if session.flags.is_interrupted() {
                return;
            }
            let _ = outbound
                .send(ServerEvent::Audio {
                    audio: speech.audio_b64,
                    format: speech.format,
                })
                .await;
        }
        Err(err) => {
            warn!(connection = %connection, "synthesis failed: {err}");
            let _ = outbound
                .send(ServerEvent::Error {
                    message: "Failed to synthesize speech.".to_string(),
                })
                .await;
        }
    }
}
