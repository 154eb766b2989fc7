//! Tool-call detection in model output
//!
//! A model that wants a tool replies with a bare JSON object
//! `{"tool": name, "data": {...}}`, sometimes wrapped in markdown fences.
//! Anything that does not parse cleanly into that shape is an ordinary
//! reply.

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub tool: String,
    pub data: Map<String, Value>,
}

/// Strip code fences, trim, and try to read a tool-call object.
pub fn detect_tool_call(text: &str) -> Option<ToolCallRequest> {
    let cleaned = text.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();

    if !(cleaned.starts_with('{') && cleaned.ends_with('}')) {
        return None;
    }

    let value: Value = serde_json::from_str(cleaned).ok()?;
    let object = value.as_object()?;
    let tool = object.get("tool")?.as_str()?;
    let data = object.get("data")?.as_object()?;

    Some(ToolCallRequest {
        tool: tool.to_string(),
        data: data.clone(),
    })
}
