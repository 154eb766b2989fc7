//! Speech synthesis routing
//!
//! Two synthesis providers are wired in; which one speaks a reply is decided
//! per session from the agent's voice id. Voices on the alternate roster (or
//! carrying its marker substring) go to the alternate provider; everything
//! else uses the default.

use crate::config::SynthesisConfig;
use crate::error::PipelineError;
use crate::providers::{SpeechAudio, SpeechSynthesizer};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct SynthesisRouter {
    default_provider: Arc<dyn SpeechSynthesizer>,
    alternate_provider: Arc<dyn SpeechSynthesizer>,
    alternate_voices: Vec<String>,
    alternate_marker: String,
}

impl SynthesisRouter {
    pub fn new(
        config: &SynthesisConfig,
        default_provider: Arc<dyn SpeechSynthesizer>,
        alternate_provider: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            default_provider,
            alternate_provider,
            alternate_voices: config
                .alternate_voices
                .iter()
                .map(|v| v.to_lowercase())
                .collect(),
            alternate_marker: config.alternate_marker.to_lowercase(),
        }
    }

    /// Whether a voice id routes to the alternate provider.
    pub fn uses_alternate(&self, voice: &str) -> bool {
        let voice = voice.trim().to_lowercase();
        self.alternate_voices.contains(&voice)
            || (!self.alternate_marker.is_empty() && voice.contains(&self.alternate_marker))
    }

    /// Synthesize one reply with the provider the voice id selects.
    pub async fn synthesize(&self, voice: &str, text: &str) -> Result<SpeechAudio, PipelineError> {
        let provider = if self.uses_alternate(voice) {
            debug!(%voice, "routing synthesis to alternate provider");
            &self.alternate_provider
        } else {
            &self.default_provider
        };
        provider
            .synthesize(voice, text)
            .await
            .map_err(PipelineError::synthesis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::AudioFormat;
    use anyhow::Result;
    use async_trait::async_trait;

    struct StaticSpeech(AudioFormat);

    #[async_trait]
    impl SpeechSynthesizer for StaticSpeech {
        async fn synthesize(&self, _voice: &str, _text: &str) -> Result<SpeechAudio> {
            Ok(SpeechAudio {
                audio_b64: "AAAA".to_string(),
                format: self.0,
            })
        }
    }

    fn router() -> SynthesisRouter {
        SynthesisRouter::new(
            &SynthesisConfig::default(),
            Arc::new(StaticSpeech(AudioFormat::Mp3)),
            Arc::new(StaticSpeech(AudioFormat::Wav)),
        )
    }

    #[test]
    fn test_roster_voices_use_alternate() {
        let router = router();
        assert!(router.uses_alternate("meera"));
        assert!(router.uses_alternate("MEERA"));
        assert!(router.uses_alternate("  pavithra "));
        assert!(!router.uses_alternate("luna"));
        assert!(!router.uses_alternate("some-unknown-voice"));
    }

    #[test]
    fn test_marker_substring_routes_to_alternate() {
        let router = router();
        assert!(router.uses_alternate("indic-female-2"));
        assert!(router.uses_alternate("Custom-INDIC-voice"));
    }

    #[tokio::test]
    async fn test_synthesize_picks_provider_by_voice() {
        let router = router();
        let default = router.synthesize("luna", "hello").await.unwrap();
        assert_eq!(default.format, AudioFormat::Mp3);

        let alternate = router.synthesize("meera", "hello").await.unwrap();
        assert_eq!(alternate.format, AudioFormat::Wav);
    }
}
