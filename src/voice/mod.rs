//! Voice processing: segmentation, WAV packaging, transcription, synthesis

pub mod segmenter;
pub mod synthesis;
pub mod wav;

pub use segmenter::{AudioSegmenter, ChunkOutcome};
pub use synthesis::SynthesisRouter;

use crate::error::PipelineError;
use crate::providers::Transcriber;

/// Package a finished utterance as WAV and transcribe it.
pub async fn transcribe_utterance(
    stt: &dyn Transcriber,
    pcm: &[u8],
) -> Result<String, PipelineError> {
    let wav = wav::pcm16_to_wav(pcm, wav::SAMPLE_RATE_HZ).map_err(PipelineError::transcription)?;
    stt.transcribe(wav)
        .await
        .map_err(PipelineError::transcription)
}
