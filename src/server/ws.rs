//! Voice WebSocket connection handling
//!
//! One connection is one session. The upgrade handler runs the admission
//! checks (balance, profile fetch, registration), wires the socket to a
//! fresh engine, and tears everything down when either side goes away.

use crate::providers::{AgentProfile, CallMeta};
use crate::server::events::{ClientEvent, ServerEvent};
use crate::server::ServerState;
use crate::session::engine::SessionEngine;
use crate::session::registry::SessionHandle;
use crate::session::{Session, SessionMeta};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Connection parameters passed in the upgrade request's query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectParams {
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default, rename = "agentId")]
    pub agent_id: Option<String>,
    #[serde(default, rename = "userId")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

pub async fn voice_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<ServerState>,
    Query(params): Query<ConnectParams>,
) -> Response {
    ws.on_upgrade(move |socket| handle_session(socket, state, params))
}

async fn handle_session(socket: WebSocket, state: ServerState, params: ConnectParams) {
    let connection_id = Uuid::new_v4().to_string();
    info!(
        connection = %connection_id,
        agent = params.agent_id.as_deref().unwrap_or("-"),
        user = params.user_id.as_deref().unwrap_or("-"),
        "voice session connected"
    );

    let (mut sink, mut stream) = socket.split();

    // Writer task: everything the session says goes through this channel.
    // A closed channel flushes a Close frame so the client sees a clean end.
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerEvent>(64);
    let writer = tokio::spawn(async move {
        while let Some(event) = outbound_rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!("failed to encode outbound event: {err}");
                    continue;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.send(Message::Close(None)).await;
    });

    // Balance is the one admission check that refuses service. If the check
    // itself cannot be reached we let the call through and log it.
    if let Some(user_id) = &params.user_id {
        match state
            .providers
            .balance
            .check(user_id, state.config.billing.estimated_call_cost)
            .await
        {
            Ok(verdict) if !verdict.allowed => {
                let message = verdict
                    .message
                    .unwrap_or_else(|| "Insufficient balance to start a call.".to_string());
                info!(connection = %connection_id, user = %user_id, "call refused: {message}");
                let _ = outbound_tx.send(ServerEvent::Error { message }).await;
                drop(outbound_tx);
                let _ = writer.await;
                return;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(connection = %connection_id, "balance check unavailable, allowing call: {err:#}");
            }
        }
    }

    let mut profile = match &params.agent_id {
        Some(agent_id) => match state
            .providers
            .agents
            .fetch_profile(agent_id, params.user_id.as_deref())
            .await
        {
            Ok(profile) => profile,
            Err(err) => {
                warn!(
                    connection = %connection_id,
                    agent = %agent_id,
                    "agent profile unavailable, using defaults: {err:#}"
                );
                default_profile(&state, params.prompt.clone())
            }
        },
        None => default_profile(&state, params.prompt.clone()),
    };
    if let Some(voice) = &params.voice {
        profile.voice_id = voice.clone();
    }

    let meta = SessionMeta::new(
        connection_id.clone(),
        params.user_id.clone(),
        params.agent_id.clone(),
    );
    let call_meta = CallMeta {
        connection_id: connection_id.clone(),
        user_id: meta.user_id.clone(),
        agent_id: meta.agent_id.clone(),
        started_at: meta.started_at,
    };
    let session = Session::new(meta, profile, state.config.dialog.history_limit);

    let (engine, signal_rx) = SessionEngine::new(
        session.clone(),
        state.providers.clone(),
        &state.config,
        outbound_tx.clone(),
    );

    let handle = SessionHandle {
        connection_id: connection_id.clone(),
        user_id: session.meta.user_id.clone(),
        agent_id: session.meta.agent_id.clone(),
        connected_at: session.meta.started_at,
        control: engine.signal_sender(),
    };
    if let Err(err) = state.registry.insert(handle).await {
        warn!(connection = %connection_id, "registration refused: {err:#}");
        let _ = outbound_tx
            .send(ServerEvent::Error {
                message: "Session could not be registered.".to_string(),
            })
            .await;
        // The engine holds its own outbound sender; both must drop before
        // the writer sees the channel close.
        drop(engine);
        drop(outbound_tx);
        let _ = writer.await;
        return;
    }

    match state.providers.call_log.start(&call_meta).await {
        Ok(call_id) => session.dialog.lock().await.call_id = Some(call_id),
        Err(err) => {
            warn!(connection = %connection_id, "call record not started: {err:#}");
        }
    }

    // Reader task: parsed client events feed the engine; dropping the sender
    // on close or error is what ends the engine loop.
    let (event_tx, event_rx) = mpsc::channel::<ClientEvent>(64);
    let reader = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            match message {
                Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => {
                        if event_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => debug!("ignoring unparseable client frame: {err}"),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    drop(outbound_tx);
    engine.run(event_rx, signal_rx).await;

    state.registry.remove(&connection_id).await;
    reader.abort();
    let _ = writer.await;
    info!(connection = %connection_id, "voice session disconnected");
}

/// Profile used when no agent id is given or the directory is unreachable.
fn default_profile(state: &ServerState, prompt: Option<String>) -> AgentProfile {
    AgentProfile {
        prompt: prompt.unwrap_or_else(|| state.config.dialog.default_prompt.clone()),
        voice_id: state.config.synthesis.default_voice.clone(),
        model: state.config.dialog.default_model.clone(),
        settings: serde_json::Value::Null,
        tools: Vec::new(),
    }
}
