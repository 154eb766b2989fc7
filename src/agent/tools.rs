//! Declared tools and their execution
//!
//! An agent's tools are read-only value data loaded once per session. Two
//! kinds exist: appending a row to a spreadsheet and calling a webhook.
//! Execution never raises; every failure path logs and reports `false` so a
//! misbehaving tool cannot take the dialog down with it.

use crate::providers::{LanguageModel, RowSink};
use crate::types::Turn;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// One declared parameter of a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParam {
    pub name: String,
    #[serde(rename = "type", default = "default_param_type")]
    pub param_type: String,
    #[serde(default)]
    pub required: bool,
}

fn default_param_type() -> String {
    "string".to_string()
}

/// Tool dispatch variant. Configurations may carry types this build does
/// not know; those deserialize to `Unrecognized` and fail execution softly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolKind {
    #[serde(rename = "spreadsheet-append")]
    SpreadsheetAppend,
    #[serde(rename = "webhook")]
    Webhook,
    #[serde(other)]
    #[serde(rename = "unknown")]
    Unrecognized,
}

/// A declared tool, loaded with the agent profile and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ToolKind,
    #[serde(default)]
    pub parameters: Vec<ToolParam>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// When set, the tool runs at call end from extracted conversation data
    /// instead of inline during the dialog.
    #[serde(default)]
    pub run_after_call: bool,
}

impl ToolSpec {
    pub fn method(&self) -> &str {
        self.method.as_deref().unwrap_or("POST")
    }

    /// Sheet name derived from the tool's display name.
    pub fn sheet_name(&self) -> String {
        self.name.trim().to_string()
    }
}

/// Executes declared tools against their configured targets.
#[derive(Clone)]
pub struct ToolInvoker {
    http: reqwest::Client,
    rows: Arc<dyn RowSink>,
}

impl ToolInvoker {
    pub fn new(http: reqwest::Client, rows: Arc<dyn RowSink>) -> Self {
        Self { http, rows }
    }

    /// Run one tool with the given field data. Returns whether it succeeded;
    /// no error escapes.
    pub async fn execute(&self, tool: &ToolSpec, data: &Map<String, Value>) -> bool {
        match tool.kind {
            ToolKind::SpreadsheetAppend => self.append_spreadsheet(tool, data).await,
            ToolKind::Webhook => self.call_webhook(tool, data).await,
            ToolKind::Unrecognized => {
                warn!(tool = %tool.name, "unrecognized tool type, skipping");
                false
            }
        }
    }

    async fn append_spreadsheet(&self, tool: &ToolSpec, data: &Map<String, Value>) -> bool {
        let Some(spreadsheet_id) = spreadsheet_id_from_url(&tool.url) else {
            warn!(tool = %tool.name, url = %tool.url, "no spreadsheet id in tool url");
            return false;
        };

        match self
            .rows
            .append_row(&spreadsheet_id, &tool.sheet_name(), data)
            .await
        {
            Ok(()) => {
                info!(tool = %tool.name, spreadsheet = %spreadsheet_id, "row appended");
                true
            }
            Err(err) => {
                warn!(tool = %tool.name, "spreadsheet append failed: {err:#}");
                false
            }
        }
    }

    async fn call_webhook(&self, tool: &ToolSpec, data: &Map<String, Value>) -> bool {
        let method = match Method::from_bytes(tool.method().to_uppercase().as_bytes()) {
            Ok(method) => method,
            Err(_) => {
                warn!(tool = %tool.name, method = %tool.method(), "invalid webhook method");
                return false;
            }
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &tool.headers {
            let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
                warn!(tool = %tool.name, header = %name, "skipping invalid header name");
                continue;
            };
            let Ok(value) = HeaderValue::from_str(value) else {
                warn!(tool = %tool.name, header = %name, "skipping invalid header value");
                continue;
            };
            headers.insert(name, value);
        }

        let mut request = self
            .http
            .request(method.clone(), &tool.url)
            .headers(headers);
        if method != Method::GET {
            request = request.json(&Value::Object(data.clone()));
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    debug!(tool = %tool.name, %status, "webhook delivered");
                    true
                } else {
                    warn!(tool = %tool.name, %status, "webhook returned non-success status");
                    false
                }
            }
            Err(err) => {
                warn!(tool = %tool.name, "webhook request failed: {err}");
                false
            }
        }
    }
}

/// Extract the spreadsheet id from a `/spreadsheets/d/{id}/...` style URL.
pub fn spreadsheet_id_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segments: Vec<&str> = parsed.path_segments()?.collect();
    segments
        .windows(2)
        .position(|pair| pair == ["spreadsheets", "d"])
        .and_then(|at| segments.get(at + 2))
        .filter(|id| !id.is_empty())
        .map(|id| id.to_string())
}

/// Result of mining the conversation for a tool's field values.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub success: bool,
    pub data: Map<String, Value>,
    pub missing_fields: Vec<String>,
}

/// Ask the model to pull the tool's declared fields out of the finished
/// conversation. Malformed or absent JSON in the reply yields an empty data
/// object rather than an error; success requires every required field to be
/// non-null.
pub async fn extract_data_from_conversation(
    llm: &dyn LanguageModel,
    model: &str,
    turns: &[Turn],
    tool: &ToolSpec,
) -> ExtractionOutcome {
    let prompt = extraction_prompt(turns, tool);
    let raw = match llm.chat(model, &prompt).await {
        Ok(text) => text,
        Err(err) => {
            warn!(tool = %tool.name, "extraction call failed: {err:#}");
            String::new()
        }
    };

    let data = first_json_object(&raw).unwrap_or_default();
    let missing_fields: Vec<String> = tool
        .parameters
        .iter()
        .filter(|param| param.required && data.get(&param.name).map_or(true, Value::is_null))
        .map(|param| param.name.clone())
        .collect();

    ExtractionOutcome {
        success: missing_fields.is_empty(),
        data,
        missing_fields,
    }
}

fn extraction_prompt(turns: &[Turn], tool: &ToolSpec) -> String {
    let mut fields = String::new();
    for param in &tool.parameters {
        let marker = if param.required { " (required)" } else { "" };
        fields.push_str(&format!(
            "- {} ({}){}\n",
            param.name, param.param_type, marker
        ));
    }

    let mut transcript = String::new();
    for turn in turns {
        transcript.push_str(&format!("{}: {}\n", turn.role, turn.content));
    }

    format!(
        "Extract the following fields from the conversation below.\n\
         Fields:\n{fields}\n\
         Conversation:\n{transcript}\n\
         Respond with strictly a JSON object containing exactly these keys. \
         Use null for any value not present in the conversation. \
         No prose, no code fences."
    )
}

/// Locate the first brace-delimited JSON object in free-form model output.
fn first_json_object(raw: &str) -> Option<Map<String, Value>> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str::<Value>(&raw[start..=end])
        .ok()?
        .as_object()
        .cloned()
}
