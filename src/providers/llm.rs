//! Chat-completions language model client
//!
//! Speaks the OpenAI-compatible `/chat/completions` shape, which OpenRouter
//! and most gateway providers accept.

use crate::providers::{LanguageModel, LlmReply, TokenUsage};
use crate::types::Turn;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

pub struct ChatCompletionsClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ChatCompletionsClient {
    pub fn new(client: Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    async fn complete(&self, model: &str, messages: Vec<Value>) -> Result<LlmReply> {
        let request = json!({
            "model": model,
            "messages": messages,
        });

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to LLM provider")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("LLM API error ({}): {}", status, body);
        }

        let raw: Value = response
            .json()
            .await
            .context("Failed to parse LLM response")?;

        let text = raw
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("LLM response missing message content"))?;

        let usage = TokenUsage {
            input: raw
                .pointer("/usage/prompt_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            output: raw
                .pointer("/usage/completion_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0),
        };

        Ok(LlmReply { text, usage })
    }
}

fn build_messages(turns: &[Turn], system_instruction: &str) -> Vec<Value> {
    let mut messages = Vec::with_capacity(turns.len() + 1);
    if !system_instruction.is_empty() {
        messages.push(json!({"role": "system", "content": system_instruction}));
    }
    for turn in turns {
        messages.push(json!({
            "role": turn.role.as_provider_str(),
            "content": turn.content,
        }));
    }
    messages
}

#[async_trait]
impl LanguageModel for ChatCompletionsClient {
    async fn generate(
        &self,
        model: &str,
        turns: &[Turn],
        system_instruction: &str,
    ) -> Result<LlmReply> {
        self.complete(model, build_messages(turns, system_instruction))
            .await
    }

    async fn chat(&self, model: &str, prompt: &str) -> Result<String> {
        let messages = vec![json!({"role": "user", "content": prompt})];
        let reply = self.complete(model, messages).await?;
        Ok(reply.text)
    }
}
