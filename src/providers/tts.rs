//! Speech synthesis clients
//!
//! Two wire shapes are in play. The default service answers a synthesis
//! request with raw MP3 bytes; the alternate service answers with a JSON
//! envelope holding one or more base64 WAV payloads, of which the first is
//! used.

use crate::providers::{AudioFormat, SpeechAudio, SpeechSynthesizer};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Client for the provider that returns the encoded audio directly in the
/// response body.
pub struct BinarySpeechClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl BinarySpeechClient {
    pub fn new(client: Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for BinarySpeechClient {
    async fn synthesize(&self, voice: &str, text: &str) -> Result<SpeechAudio> {
        let response = self
            .client
            .post(format!("{}/synthesize", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&json!({"voice": voice, "text": text}))
            .send()
            .await
            .context("Failed to send synthesis request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Synthesis API error ({}): {}", status, body);
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read synthesis response")?;
        if bytes.is_empty() {
            bail!("Synthesis service returned no audio");
        }

        Ok(SpeechAudio {
            audio_b64: BASE64.encode(&bytes),
            format: AudioFormat::Mp3,
        })
    }
}

/// Client for the provider that wraps base64 WAV payloads in JSON.
pub struct EnvelopeSpeechClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct EnvelopeResponse {
    #[serde(default)]
    audios: Vec<String>,
}

impl EnvelopeSpeechClient {
    pub fn new(client: Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for EnvelopeSpeechClient {
    async fn synthesize(&self, voice: &str, text: &str) -> Result<SpeechAudio> {
        let response = self
            .client
            .post(format!("{}/synthesize", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&json!({"voice": voice, "text": text}))
            .send()
            .await
            .context("Failed to send synthesis request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Synthesis API error ({}): {}", status, body);
        }

        let envelope: EnvelopeResponse = response
            .json()
            .await
            .context("Failed to parse synthesis response")?;
        let mut audios = envelope.audios.into_iter();
        let Some(first) = audios.next() else {
            bail!("Synthesis service returned no audio");
        };
        let remaining = audios.count();
        if remaining > 0 {
            debug!(extra = remaining, "synthesis returned multiple payloads, using the first");
        }

        Ok(SpeechAudio {
            audio_b64: first,
            format: AudioFormat::Wav,
        })
    }
}
