//! Platform backend client
//!
//! One client for everything the session lifecycle needs from the platform:
//! agent profiles, balance checks, the call log, and usage billing.

use crate::providers::{
    AgentDirectory, AgentProfile, BalanceGate, BalanceVerdict, CallLog, CallMeta, ChargeReceipt,
    UsageBilling, UsageVector,
};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

pub struct PlatformClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl PlatformClient {
    pub fn new(client: Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

async fn read_error(response: reqwest::Response, what: &str) -> anyhow::Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    anyhow::anyhow!("{} error ({}): {}", what, status, body)
}

#[async_trait]
impl AgentDirectory for PlatformClient {
    async fn fetch_profile(&self, agent_id: &str, user_id: Option<&str>) -> Result<AgentProfile> {
        let mut request = self
            .client
            .get(self.url(&format!("/agents/{agent_id}")))
            .bearer_auth(&self.api_key);
        if let Some(user_id) = user_id {
            request = request.query(&[("userId", user_id)]);
        }

        let response = request
            .send()
            .await
            .context("Failed to fetch agent profile")?;
        if !response.status().is_success() {
            return Err(read_error(response, "Agent profile").await);
        }
        response
            .json()
            .await
            .context("Failed to parse agent profile")
    }
}

#[async_trait]
impl BalanceGate for PlatformClient {
    async fn check(&self, user_id: &str, estimated_cost: Decimal) -> Result<BalanceVerdict> {
        let response = self
            .client
            .post(self.url("/balance/check"))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "userId": user_id,
                "estimatedCost": estimated_cost,
            }))
            .send()
            .await
            .context("Failed to send balance check")?;

        if !response.status().is_success() {
            return Err(read_error(response, "Balance check").await);
        }
        response
            .json()
            .await
            .context("Failed to parse balance verdict")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartCallResponse {
    call_id: String,
}

#[async_trait]
impl CallLog for PlatformClient {
    async fn start(&self, meta: &CallMeta) -> Result<String> {
        let response = self
            .client
            .post(self.url("/calls"))
            .bearer_auth(&self.api_key)
            .json(meta)
            .send()
            .await
            .context("Failed to record call start")?;

        if !response.status().is_success() {
            return Err(read_error(response, "Call record").await);
        }
        let parsed: StartCallResponse = response
            .json()
            .await
            .context("Failed to parse call record response")?;
        if parsed.call_id.is_empty() {
            bail!("Call record response carried an empty call id");
        }
        Ok(parsed.call_id)
    }

    async fn finish(&self, call_id: &str, duration_secs: u64) -> Result<()> {
        let response = self
            .client
            .post(self.url(&format!("/calls/{call_id}/end")))
            .bearer_auth(&self.api_key)
            .json(&json!({"durationSecs": duration_secs}))
            .send()
            .await
            .context("Failed to record call end")?;

        if !response.status().is_success() {
            return Err(read_error(response, "Call record").await);
        }
        Ok(())
    }
}

#[async_trait]
impl UsageBilling for PlatformClient {
    async fn charge(
        &self,
        user_id: &str,
        call_id: Option<&str>,
        usage: &UsageVector,
    ) -> Result<ChargeReceipt> {
        let response = self
            .client
            .post(self.url("/usage/charge"))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "userId": user_id,
                "callId": call_id,
                "usage": usage,
            }))
            .send()
            .await
            .context("Failed to send usage charge")?;

        if !response.status().is_success() {
            return Err(read_error(response, "Usage charge").await);
        }
        response
            .json()
            .await
            .context("Failed to parse charge receipt")
    }
}
