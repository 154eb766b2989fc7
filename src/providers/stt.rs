//! Whisper-style transcription client
//!
//! Uploads the WAV container as multipart form data to an
//! `/audio/transcriptions` endpoint. Retries once on transport errors and
//! 5xx replies.

use crate::providers::Transcriber;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

pub struct TranscriptionClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl TranscriptionClient {
    pub fn new(client: Client, base_url: String, api_key: String, model: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
            model,
        }
    }

    fn build_form(&self, wav_bytes: Vec<u8>) -> Result<Form> {
        let file = Part::bytes(wav_bytes)
            .file_name("utterance.wav")
            .mime_str("audio/wav")
            .context("Failed to build audio form part")?;
        Ok(Form::new().text("model", self.model.clone()).part("file", file))
    }

    async fn request_once(&self, wav_bytes: Vec<u8>) -> Result<reqwest::Response> {
        self.client
            .post(format!(
                "{}/audio/transcriptions",
                self.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.api_key)
            .multipart(self.build_form(wav_bytes)?)
            .send()
            .await
            .context("Failed to send transcription request")
    }
}

#[async_trait]
impl Transcriber for TranscriptionClient {
    async fn transcribe(&self, wav_bytes: Vec<u8>) -> Result<String> {
        let mut response = self.request_once(wav_bytes.clone()).await;
        let retry = match &response {
            Ok(resp) => resp.status().is_server_error(),
            Err(_) => true,
        };
        if retry {
            warn!("transcription request failed, retrying once");
            response = self.request_once(wav_bytes).await;
        }

        let response = response?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Transcription API error ({}): {}", status, body);
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .context("Failed to parse transcription response")?;
        Ok(parsed.text)
    }
}
