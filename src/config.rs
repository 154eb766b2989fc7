//! Configuration management
//!
//! Server binding, segmentation thresholds, dialog limits, voice routing,
//! and provider endpoints. Every field carries a serde default so a missing
//! or partial config file still yields a working configuration.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP/WebSocket server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Voice-activity segmentation settings
    #[serde(default)]
    pub segmenter: SegmenterConfig,
    /// Dialog turn and tool-loop settings
    #[serde(default)]
    pub dialog: DialogConfig,
    /// Speech synthesis routing settings
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    /// Call billing settings
    #[serde(default)]
    pub billing: BillingConfig,
    /// External provider endpoints
    #[serde(default)]
    pub providers: ProviderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins; empty list allows any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Voice-activity detection parameters.
///
/// The defaults segment 16 kHz mono s16le microphone audio: a chunk whose
/// RMS amplitude exceeds `silence_threshold` counts as speech, and an
/// utterance boundary fires after `silence_window_ms` without speech.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// RMS amplitude above which a chunk counts as speech (0-32767 scale)
    #[serde(default = "default_silence_threshold")]
    pub silence_threshold: f32,
    /// Silence duration that closes an utterance
    #[serde(default = "default_silence_window_ms")]
    pub silence_window_ms: u64,
    /// Utterances shorter than this are discarded as noise
    #[serde(default = "default_min_utterance_bytes")]
    pub min_utterance_bytes: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            silence_threshold: default_silence_threshold(),
            silence_window_ms: default_silence_window_ms(),
            min_utterance_bytes: default_min_utterance_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogConfig {
    /// Sliding-window cap on conversation turns
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Hard cap on model calls within a single dialog turn
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,
    /// Model used when the agent profile does not name one
    #[serde(default = "default_model")]
    pub default_model: String,
    /// System instruction used when no agent profile is available
    #[serde(default = "default_prompt")]
    pub default_prompt: String,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            max_tool_iterations: default_max_tool_iterations(),
            default_model: default_model(),
            default_prompt: default_prompt(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Voice used when neither the agent profile nor the client selects one
    #[serde(default = "default_voice")]
    pub default_voice: String,
    /// Voice names served by the alternate synthesis provider
    #[serde(default = "default_alternate_voices")]
    pub alternate_voices: Vec<String>,
    /// Substring marker that also routes a voice to the alternate provider
    #[serde(default = "default_alternate_marker")]
    pub alternate_marker: String,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            default_voice: default_voice(),
            alternate_voices: default_alternate_voices(),
            alternate_marker: default_alternate_marker(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Cost estimate used for the pre-call balance check
    #[serde(default = "default_estimated_call_cost")]
    pub estimated_call_cost: Decimal,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            estimated_call_cost: default_estimated_call_cost(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Chat-completions style LLM endpoint
    #[serde(default = "default_llm_base_url")]
    pub llm_base_url: String,
    /// Transcription endpoint (multipart WAV upload)
    #[serde(default = "default_transcription_base_url")]
    pub transcription_base_url: String,
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
    /// Default synthesis provider (binary mp3 responses)
    #[serde(default = "default_speech_base_url")]
    pub speech_base_url: String,
    /// Alternate synthesis provider (JSON envelope of base64 wav)
    #[serde(default = "default_alt_speech_base_url")]
    pub alt_speech_base_url: String,
    /// Platform backend (agents, balance, call log, usage, row append)
    #[serde(default = "default_backend_base_url")]
    pub backend_base_url: String,
    /// Timeout applied to every outbound provider call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            llm_base_url: default_llm_base_url(),
            transcription_base_url: default_transcription_base_url(),
            transcription_model: default_transcription_model(),
            speech_base_url: default_speech_base_url(),
            alt_speech_base_url: default_alt_speech_base_url(),
            backend_base_url: default_backend_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_silence_threshold() -> f32 {
    500.0
}

fn default_silence_window_ms() -> u64 {
    1500
}

fn default_min_utterance_bytes() -> usize {
    3200
}

fn default_history_limit() -> usize {
    20
}

fn default_max_tool_iterations() -> u32 {
    5
}

fn default_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_prompt() -> String {
    "You are a friendly voice assistant. Keep replies short and conversational; they will be spoken aloud.".to_string()
}

fn default_voice() -> String {
    "luna".to_string()
}

fn default_alternate_voices() -> Vec<String> {
    ["meera", "pavithra", "maitreyi", "arvind", "amol", "amartya"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_alternate_marker() -> String {
    "indic".to_string()
}

fn default_estimated_call_cost() -> Decimal {
    dec!(0.05)
}

fn default_llm_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_transcription_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_speech_base_url() -> String {
    "http://127.0.0.1:8710".to_string()
}

fn default_alt_speech_base_url() -> String {
    "http://127.0.0.1:8711".to_string()
}

fn default_backend_base_url() -> String {
    "http://127.0.0.1:9100/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load configuration from file, or create default if not exists
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .context("Failed to read config file")?;
            let config: Config = toml::from_str(&contents)
                .context("Failed to parse config file")?;
            Ok(config)
        } else {
            let config = Config::default();
            if let Err(err) = config.save_to(path) {
                tracing::warn!("could not write default config file: {err:#}");
            }
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }
}

/// Resolve the config file path: `VOICELINE_CONFIG` overrides the platform
/// config directory.
pub fn config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("VOICELINE_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    let base = directories::ProjectDirs::from("com", "voiceline", "voiceline")
        .context("Failed to determine config directory")?;
    Ok(base.config_dir().join("config.toml"))
}
