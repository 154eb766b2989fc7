//! Pipeline stage error taxonomy
//!
//! The stages that can fail a turn outright surface typed errors; the engine
//! maps them to outbound error events without tearing down the connection.
//! Dialog and tool failures never reach here: the orchestrator answers with
//! fallback text and tools report success or failure as a plain flag.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transcription failed: {0}")]
    Transcription(String),
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),
}

impl PipelineError {
    /// Wrap an anyhow error chain into a transcription failure.
    pub fn transcription(err: anyhow::Error) -> Self {
        Self::Transcription(format!("{err:#}"))
    }

    /// Wrap an anyhow error chain into a synthesis failure.
    pub fn synthesis(err: anyhow::Error) -> Self {
        Self::Synthesis(format!("{err:#}"))
    }
}
