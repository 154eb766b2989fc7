//! External collaborator capabilities
//!
//! The session engine consumes everything outside the process through the
//! traits in this module: language model, transcription, the two speech
//! synthesis providers, spreadsheet row append, and the platform backend
//! (agent profiles, balance checks, call log, usage billing). Each trait has
//! one reqwest-backed reference client; tests substitute scripted doubles.

pub mod backend;
pub mod llm;
pub mod sheets;
pub mod stt;
pub mod tts;

use crate::agent::tools::ToolSpec;
use crate::config::Config;
use crate::security;
use crate::types::Turn;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Token counts reported by the language model for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
}

/// One language model reply plus its reported usage.
#[derive(Debug, Clone)]
pub struct LlmReply {
    pub text: String,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one dialog completion over the turn history with a system
    /// instruction.
    async fn generate(
        &self,
        model: &str,
        turns: &[Turn],
        system_instruction: &str,
    ) -> Result<LlmReply>;

    /// One-shot prompt without history, used for data extraction.
    async fn chat(&self, model: &str, prompt: &str) -> Result<String>;
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a WAV container to text.
    async fn transcribe(&self, wav_bytes: Vec<u8>) -> Result<String>;
}

/// Encoded audio returned by a synthesis provider.
#[derive(Debug, Clone)]
pub struct SpeechAudio {
    pub audio_b64: String,
    pub format: AudioFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, voice: &str, text: &str) -> Result<SpeechAudio>;
}

#[async_trait]
pub trait RowSink: Send + Sync {
    /// Append one row keyed by field name to a sheet.
    async fn append_row(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        row: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<()>;
}

/// Agent configuration fetched at session creation and never mutated after.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProfile {
    pub prompt: String,
    pub voice_id: String,
    pub model: String,
    #[serde(default)]
    pub settings: serde_json::Value,
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
}

#[async_trait]
pub trait AgentDirectory: Send + Sync {
    async fn fetch_profile(&self, agent_id: &str, user_id: Option<&str>) -> Result<AgentProfile>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceVerdict {
    pub allowed: bool,
    #[serde(default)]
    pub balance: Decimal,
    #[serde(default)]
    pub message: Option<String>,
}

#[async_trait]
pub trait BalanceGate: Send + Sync {
    async fn check(&self, user_id: &str, estimated_cost: Decimal) -> Result<BalanceVerdict>;
}

/// Metadata recorded when a call starts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallMeta {
    pub connection_id: String,
    pub user_id: Option<String>,
    pub agent_id: Option<String>,
    pub started_at: DateTime<Utc>,
}

#[async_trait]
pub trait CallLog: Send + Sync {
    /// Record a started call, returning its log id.
    async fn start(&self, meta: &CallMeta) -> Result<String>;
    /// Record call completion with its final duration.
    async fn finish(&self, call_id: &str, duration_secs: u64) -> Result<()>;
}

/// What a completed call consumed, for billing.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UsageVector {
    pub duration_secs: u64,
    pub synthesis_chars: u64,
    pub tokens_in: u64,
    pub tokens_out: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeReceipt {
    pub total_charged: Decimal,
    #[serde(default)]
    pub breakdown: serde_json::Value,
}

#[async_trait]
pub trait UsageBilling: Send + Sync {
    async fn charge(
        &self,
        user_id: &str,
        call_id: Option<&str>,
        usage: &UsageVector,
    ) -> Result<ChargeReceipt>;
}

/// The full collaborator set handed to each session engine.
#[derive(Clone)]
pub struct Providers {
    pub llm: Arc<dyn LanguageModel>,
    pub transcriber: Arc<dyn Transcriber>,
    pub speech_default: Arc<dyn SpeechSynthesizer>,
    pub speech_alternate: Arc<dyn SpeechSynthesizer>,
    pub rows: Arc<dyn RowSink>,
    pub agents: Arc<dyn AgentDirectory>,
    pub balance: Arc<dyn BalanceGate>,
    pub call_log: Arc<dyn CallLog>,
    pub billing: Arc<dyn UsageBilling>,
    /// Shared client for webhook tool calls.
    pub http: reqwest::Client,
}

impl Providers {
    /// Build the reference clients from configuration. A missing API key is
    /// logged, not fatal; the affected provider fails per call and the
    /// engine's stage isolation turns that into error events.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.providers.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        let key = |provider: &str| {
            security::provider_key(provider).unwrap_or_else(|err| {
                warn!("{err:#}");
                String::new()
            })
        };

        let backend = Arc::new(backend::PlatformClient::new(
            http.clone(),
            config.providers.backend_base_url.clone(),
            key("backend"),
        ));

        Ok(Self {
            llm: Arc::new(llm::ChatCompletionsClient::new(
                http.clone(),
                config.providers.llm_base_url.clone(),
                key("llm"),
            )),
            transcriber: Arc::new(stt::TranscriptionClient::new(
                http.clone(),
                config.providers.transcription_base_url.clone(),
                key("transcription"),
                config.providers.transcription_model.clone(),
            )),
            speech_default: Arc::new(tts::BinarySpeechClient::new(
                http.clone(),
                config.providers.speech_base_url.clone(),
                key("speech"),
            )),
            speech_alternate: Arc::new(tts::EnvelopeSpeechClient::new(
                http.clone(),
                config.providers.alt_speech_base_url.clone(),
                key("speech-alt"),
            )),
            rows: Arc::new(sheets::RowAppendClient::new(
                http.clone(),
                config.providers.backend_base_url.clone(),
                key("backend"),
            )),
            agents: backend.clone(),
            balance: backend.clone(),
            call_log: backend.clone(),
            billing: backend,
            http,
        })
    }
}
