//! Voiceline - real-time voice agent server
//!
//! Bridges browser microphone audio to transcription, an LLM dialog with
//! tool calling, and speech synthesis over a WebSocket.

use voiceline::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (INFO level by default, use RUST_LOG to override)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    cli::run().await
}
