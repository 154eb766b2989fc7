//! Voiceline - real-time voice agent library
//!
//! Session orchestration for browser voice calls:
//! - WebSocket transport with a JSON event protocol
//! - Energy-based utterance segmentation over raw PCM
//! - Whisper-style transcription and chat-completions dialog
//! - Bounded tool-call loop (spreadsheets and webhooks)
//! - Dual speech synthesis providers routed by voice id
//! - Per-call usage accounting against a platform backend
//!
//! # Example
//!
//! ```ignore
//! use voiceline::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     voiceline::server::start(config).await
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod providers;
pub mod security;
pub mod server;
pub mod session;
pub mod types;
pub mod voice;

pub use agent::{ConversationHistory, DialogOrchestrator, ToolInvoker, ToolSpec};
pub use config::Config;
pub use error::PipelineError;
pub use providers::Providers;
pub use server::{start as start_server, ServerState};
pub use session::{Session, SessionEngine, SessionRegistry};
pub use types::{Role, Turn};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
