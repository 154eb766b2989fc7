//! Spreadsheet row append via the platform backend
//!
//! The backend holds the sheets OAuth grant; this client only posts the
//! row to it.

use crate::providers::RowSink;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};

pub struct RowAppendClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RowAppendClient {
    pub fn new(client: Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl RowSink for RowAppendClient {
    async fn append_row(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        row: &Map<String, Value>,
    ) -> Result<()> {
        let response = self
            .client
            .post(format!(
                "{}/sheets/append",
                self.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "spreadsheetId": spreadsheet_id,
                "sheetName": sheet_name,
                "row": row,
            }))
            .send()
            .await
            .context("Failed to send row append request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Sheet append error ({}): {}", status, body);
        }
        Ok(())
    }
}
