//! Dialog turn orchestration
//!
//! Drives one LLM turn to speakable text. The model may answer with a
//! tool-call object instead of prose; the orchestrator executes the tool,
//! records a status turn, and asks the model to continue, all inside an
//! explicit bounded loop. A turn always comes back with something to say:
//! LLM failure yields a fixed apology, and blowing the iteration cap yields
//! a fixed fallback line.

use crate::agent::catalog;
use crate::agent::history::ConversationHistory;
use crate::agent::toolcall::{self, ToolCallRequest};
use crate::agent::tools::{ToolInvoker, ToolSpec};
use crate::providers::{AgentProfile, LanguageModel, TokenUsage};
use crate::types::Turn;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

pub const LLM_APOLOGY: &str =
    "I'm sorry, I'm having trouble thinking right now. Could you say that again?";
pub const TOOL_LOOP_FALLBACK: &str =
    "I wasn't able to finish that action. What else can I help you with?";
pub const TOOL_FOLLOWUP_PROMPT: &str = "Tool executed successfully. Please continue.";

/// Where a dialog turn currently stands.
enum TurnPhase {
    /// A user-side turn is ready to be appended to history.
    AwaitingUserTurn(String),
    /// History is up to date; the model gets the next word.
    AwaitingModel,
    /// The model asked for a declared tool.
    ExecutingTool {
        tool: ToolSpec,
        data: Map<String, Value>,
    },
    /// Tool finished; hand the model its follow-up prompt.
    AwaitingFollowup,
    /// Terminal: the user-facing reply.
    Responding(String),
}

/// Final result of one dialog turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub text: String,
    pub usage: TokenUsage,
}

#[derive(Clone)]
pub struct DialogOrchestrator {
    llm: Arc<dyn LanguageModel>,
    invoker: ToolInvoker,
    max_iterations: u32,
}

impl DialogOrchestrator {
    pub fn new(llm: Arc<dyn LanguageModel>, invoker: ToolInvoker, max_iterations: u32) -> Self {
        Self {
            llm,
            invoker,
            max_iterations,
        }
    }

    /// Run one dialog turn.
    ///
    /// The caller holds the session's processing gate while this runs and is
    /// responsible for appending the returned text to history as the
    /// assistant turn; this function appends only the user-side turns.
    pub async fn respond(
        &self,
        history: &mut ConversationHistory,
        profile: &AgentProfile,
        user_utterance: &str,
    ) -> TurnOutcome {
        let system_instruction = catalog::system_instruction(&profile.prompt, &profile.tools);
        let mut usage = TokenUsage::default();
        let mut iterations = 0u32;
        let mut phase = TurnPhase::AwaitingUserTurn(user_utterance.to_string());

        let text = loop {
            phase = match phase {
                TurnPhase::AwaitingUserTurn(text) => {
                    history.push(Turn::user(text));
                    TurnPhase::AwaitingModel
                }
                TurnPhase::AwaitingModel => {
                    iterations += 1;
                    if iterations > self.max_iterations {
                        warn!(
                            cap = self.max_iterations,
                            "tool loop hit its iteration cap, answering with fallback"
                        );
                        break TOOL_LOOP_FALLBACK.to_string();
                    }
                    match self
                        .llm
                        .generate(&profile.model, history.turns(), &system_instruction)
                        .await
                    {
                        Ok(reply) => {
                            usage.input += reply.usage.input;
                            usage.output += reply.usage.output;
                            classify_reply(reply.text, &profile.tools)
                        }
                        Err(err) => {
                            error!("language model call failed: {err:#}");
                            break LLM_APOLOGY.to_string();
                        }
                    }
                }
                TurnPhase::ExecutingTool { tool, data } => {
                    let succeeded = self.invoker.execute(&tool, &data).await;
                    let (status, note) = if succeeded {
                        ("succeeded", "the action was performed")
                    } else {
                        ("failed", "the action could not be completed")
                    };
                    debug!(tool = %tool.name, status, "tool executed mid-dialog");
                    history.push(Turn::user(format!(
                        "Tool '{}' execution {status}: {note}.",
                        tool.name
                    )));
                    TurnPhase::AwaitingFollowup
                }
                TurnPhase::AwaitingFollowup => {
                    history.push(Turn::user(TOOL_FOLLOWUP_PROMPT));
                    TurnPhase::AwaitingModel
                }
                TurnPhase::Responding(text) => break text,
            };
        };

        TurnOutcome { text, usage }
    }
}

/// Decide whether a model reply is a tool call or the user-facing answer.
/// A call naming an undeclared tool is returned verbatim, not retried.
fn classify_reply(text: String, tools: &[ToolSpec]) -> TurnPhase {
    let Some(ToolCallRequest { tool, data }) = toolcall::detect_tool_call(&text) else {
        return TurnPhase::Responding(text);
    };
    match tools.iter().find(|spec| spec.name == tool) {
        Some(spec) => TurnPhase::ExecutingTool {
            tool: spec.clone(),
            data,
        },
        None => {
            warn!(%tool, "model named an undeclared tool, passing reply through");
            TurnPhase::Responding(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{LlmReply, RowSink};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedLlm {
        replies: Mutex<VecDeque<Result<LlmReply>>>,
        generate_calls: AtomicUsize,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Result<LlmReply>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                generate_calls: AtomicUsize::new(0),
            })
        }

        fn ok(text: &str) -> Result<LlmReply> {
            Ok(LlmReply {
                text: text.to_string(),
                usage: TokenUsage {
                    input: 10,
                    output: 5,
                },
            })
        }

        fn calls(&self) -> usize {
            self.generate_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedLlm {
        async fn generate(
            &self,
            _model: &str,
            _turns: &[Turn],
            _system_instruction: &str,
        ) -> Result<LlmReply> {
            self.generate_calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("script exhausted")))
        }

        async fn chat(&self, _model: &str, _prompt: &str) -> Result<String> {
            Err(anyhow!("not scripted"))
        }
    }

    #[derive(Default)]
    struct RecordingRows {
        appended: Mutex<Vec<(String, String, Map<String, Value>)>>,
    }

    #[async_trait]
    impl RowSink for RecordingRows {
        async fn append_row(
            &self,
            spreadsheet_id: &str,
            sheet_name: &str,
            row: &Map<String, Value>,
        ) -> Result<()> {
            self.appended.lock().unwrap().push((
                spreadsheet_id.to_string(),
                sheet_name.to_string(),
                row.clone(),
            ));
            Ok(())
        }
    }

    fn profile_with_tools(tools: Vec<ToolSpec>) -> AgentProfile {
        AgentProfile {
            prompt: "Be helpful.".to_string(),
            voice_id: "luna".to_string(),
            model: "test-model".to_string(),
            settings: serde_json::json!({}),
            tools,
        }
    }

    fn sheet_tool(name: &str) -> ToolSpec {
        serde_json::from_str(&format!(
            r#"{{"name":"{name}","type":"spreadsheet-append","url":"https://docs.google.com/spreadsheets/d/sheet1/edit"}}"#
        ))
        .unwrap()
    }

    fn orchestrator(
        llm: Arc<ScriptedLlm>,
        rows: Arc<RecordingRows>,
        cap: u32,
    ) -> DialogOrchestrator {
        DialogOrchestrator::new(llm, ToolInvoker::new(reqwest::Client::new(), rows), cap)
    }

    #[tokio::test]
    async fn test_plain_reply_passes_through() {
        let llm = ScriptedLlm::new(vec![ScriptedLlm::ok("Happy to help!")]);
        let rows = Arc::new(RecordingRows::default());
        let orch = orchestrator(llm.clone(), rows, 5);

        let mut history = ConversationHistory::new(20);
        let outcome = orch
            .respond(&mut history, &profile_with_tools(vec![]), "hello there")
            .await;

        assert_eq!(outcome.text, "Happy to help!");
        assert_eq!(llm.calls(), 1);
        // Only the user side is appended; the caller owns the assistant turn.
        assert_eq!(history.len(), 1);
        assert_eq!(history.turns()[0].content, "hello there");
    }

    #[tokio::test]
    async fn test_tool_call_runs_once_then_single_followup() {
        let llm = ScriptedLlm::new(vec![
            ScriptedLlm::ok(r#"{"tool":"X","data":{"a":"1"}}"#),
            ScriptedLlm::ok("All done."),
        ]);
        let rows = Arc::new(RecordingRows::default());
        let orch = orchestrator(llm.clone(), rows.clone(), 5);

        let mut history = ConversationHistory::new(20);
        let outcome = orch
            .respond(
                &mut history,
                &profile_with_tools(vec![sheet_tool("X")]),
                "please record this",
            )
            .await;

        assert_eq!(outcome.text, "All done.");
        assert_eq!(llm.calls(), 2, "exactly one follow-up model call");
        let appended = rows.appended.lock().unwrap();
        assert_eq!(appended.len(), 1, "tool invoked exactly once");
        assert_eq!(appended[0].0, "sheet1");
        assert_eq!(appended[0].2.get("a").unwrap(), "1");
        drop(appended);

        let contents: Vec<&str> = history
            .turns()
            .iter()
            .map(|t| t.content.as_str())
            .collect();
        assert_eq!(contents[0], "please record this");
        assert!(contents[1].starts_with("Tool 'X' execution succeeded"));
        assert_eq!(contents[2], TOOL_FOLLOWUP_PROMPT);
    }

    #[tokio::test]
    async fn test_undeclared_tool_returns_raw_text() {
        let raw = r#"{"tool":"ghost","data":{}}"#;
        let llm = ScriptedLlm::new(vec![ScriptedLlm::ok(raw)]);
        let rows = Arc::new(RecordingRows::default());
        let orch = orchestrator(llm.clone(), rows.clone(), 5);

        let mut history = ConversationHistory::new(20);
        let outcome = orch
            .respond(
                &mut history,
                &profile_with_tools(vec![sheet_tool("X")]),
                "hm",
            )
            .await;

        assert_eq!(outcome.text, raw);
        assert_eq!(llm.calls(), 1, "a hallucinated tool is not retried");
        assert!(rows.appended.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_iteration_cap_yields_fallback() {
        let tool_json = r#"{"tool":"X","data":{"a":"1"}}"#;
        let llm = ScriptedLlm::new(
            (0..6)
                .map(|_| ScriptedLlm::ok(tool_json))
                .collect::<Vec<_>>(),
        );
        let rows = Arc::new(RecordingRows::default());
        let orch = orchestrator(llm.clone(), rows.clone(), 5);

        let mut history = ConversationHistory::new(40);
        let outcome = orch
            .respond(
                &mut history,
                &profile_with_tools(vec![sheet_tool("X")]),
                "loop forever",
            )
            .await;

        assert_eq!(outcome.text, TOOL_LOOP_FALLBACK);
        assert_eq!(llm.calls(), 5, "capped at five model calls");
        assert_eq!(rows.appended.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_llm_failure_yields_apology() {
        let llm = ScriptedLlm::new(vec![Err(anyhow!("upstream 500"))]);
        let rows = Arc::new(RecordingRows::default());
        let orch = orchestrator(llm.clone(), rows, 5);

        let mut history = ConversationHistory::new(20);
        let outcome = orch
            .respond(&mut history, &profile_with_tools(vec![]), "hello")
            .await;

        assert_eq!(outcome.text, LLM_APOLOGY);
        assert_eq!(outcome.usage, TokenUsage::default());
    }

    #[tokio::test]
    async fn test_usage_accumulates_across_iterations() {
        let llm = ScriptedLlm::new(vec![
            ScriptedLlm::ok(r#"{"tool":"X","data":{}}"#),
            ScriptedLlm::ok("done"),
        ]);
        let rows = Arc::new(RecordingRows::default());
        let orch = orchestrator(llm.clone(), rows, 5);

        let mut history = ConversationHistory::new(20);
        let outcome = orch
            .respond(
                &mut history,
                &profile_with_tools(vec![sheet_tool("X")]),
                "go",
            )
            .await;

        assert_eq!(
            outcome.usage,
            TokenUsage {
                input: 20,
                output: 10
            }
        );
    }
}
