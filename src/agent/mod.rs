//! Agent behavior: dialog orchestration and declared tools

pub mod catalog;
pub mod dialog;
pub mod history;
pub mod toolcall;
pub mod tools;

pub use dialog::{DialogOrchestrator, TurnOutcome};
pub use history::ConversationHistory;
pub use tools::{ToolInvoker, ToolSpec};
