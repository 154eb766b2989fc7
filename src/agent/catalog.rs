//! Tool catalog rendering
//!
//! The agent prompt carries a textual description of its declared tools plus
//! the invocation contract: a tool call is a bare JSON object, nothing else.

use crate::agent::tools::ToolSpec;

/// Build the full system instruction: the agent prompt, with the tool
/// catalog appended when any tools are declared.
pub fn system_instruction(prompt: &str, tools: &[ToolSpec]) -> String {
    if tools.is_empty() {
        return prompt.to_string();
    }
    format!("{}\n\n{}", prompt.trim_end(), render_catalog(tools))
}

fn render_catalog(tools: &[ToolSpec]) -> String {
    let mut out = String::from("You have access to the following tools:\n");
    for tool in tools {
        out.push_str(&format!("- {}: {}\n", tool.name, tool.description));
        for param in &tool.parameters {
            let marker = if param.required { ", required" } else { "" };
            out.push_str(&format!(
                "    - {} ({}{})\n",
                param.name, param.param_type, marker
            ));
        }
    }
    out.push_str(
        "To invoke a tool, respond with ONLY a bare JSON object of the form \
         {\"tool\": \"<tool name>\", \"data\": {<field>: <value>, ...}} and no \
         surrounding text. Otherwise, reply normally.",
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_tools_leaves_prompt_untouched() {
        assert_eq!(system_instruction("Be brief.", &[]), "Be brief.");
    }

    #[test]
    fn test_catalog_lists_tools_and_contract() {
        let tool: ToolSpec = serde_json::from_str(
            r#"{
                "name": "Signups",
                "description": "Record a signup",
                "type": "spreadsheet-append",
                "url": "https://docs.google.com/spreadsheets/d/abc/edit",
                "parameters": [
                    {"name": "email", "type": "string", "required": true},
                    {"name": "company", "type": "string"}
                ]
            }"#,
        )
        .unwrap();

        let instruction = system_instruction("Be helpful.", &[tool]);
        assert!(instruction.starts_with("Be helpful."));
        assert!(instruction.contains("- Signups: Record a signup"));
        assert!(instruction.contains("email (string, required)"));
        assert!(instruction.contains("company (string)"));
        assert!(instruction.contains("{\"tool\": \"<tool name>\""));
    }
}
