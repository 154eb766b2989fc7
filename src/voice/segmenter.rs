//! Energy-based voice-activity segmentation
//!
//! Buffers raw PCM chunks and decides where utterances end. The segmenter
//! itself is a synchronous state machine: it reports when speech is active
//! and when a silence timer should be armed, and hands back the buffered
//! utterance when the caller's timer elapses. The engine owns the actual
//! delayed task, so timer cancellation and re-arming stay tied to the
//! session's own execution context.

use crate::config::SegmenterConfig;
use std::time::Instant;
use tracing::debug;

/// What the caller should do after feeding one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Speech detected: cancel any pending silence timer.
    SpeechActive,
    /// Quiet chunk with buffered audio and no timer yet: arm one.
    ArmSilenceTimer,
    /// Quiet chunk while a timer is already pending (or nothing buffered).
    Buffered,
}

pub struct AudioSegmenter {
    silence_threshold: f32,
    min_utterance_bytes: usize,
    buffer: Vec<u8>,
    timer_pending: bool,
    last_speech: Option<Instant>,
}

impl AudioSegmenter {
    pub fn new(config: &SegmenterConfig) -> Self {
        Self {
            silence_threshold: config.silence_threshold,
            min_utterance_bytes: config.min_utterance_bytes,
            buffer: Vec::new(),
            timer_pending: false,
            last_speech: None,
        }
    }

    /// Feed one chunk of s16le PCM.
    pub fn ingest(&mut self, chunk: &[u8]) -> ChunkOutcome {
        self.buffer.extend_from_slice(chunk);

        if rms_energy(chunk) > self.silence_threshold {
            self.last_speech = Some(Instant::now());
            self.timer_pending = false;
            return ChunkOutcome::SpeechActive;
        }

        if !self.timer_pending && !self.buffer.is_empty() {
            self.timer_pending = true;
            return ChunkOutcome::ArmSilenceTimer;
        }

        ChunkOutcome::Buffered
    }

    /// The caller's silence timer elapsed with no intervening speech.
    ///
    /// Returns the buffered utterance if it meets the minimum length,
    /// otherwise discards it as noise. Either way the buffer is cleared,
    /// so a later call cannot dispatch the same audio twice.
    pub fn silence_elapsed(&mut self) -> Option<Vec<u8>> {
        self.timer_pending = false;
        let utterance = std::mem::take(&mut self.buffer);
        if utterance.len() >= self.min_utterance_bytes {
            Some(utterance)
        } else {
            if !utterance.is_empty() {
                debug!(
                    bytes = utterance.len(),
                    "discarding sub-minimum utterance as noise"
                );
            }
            None
        }
    }

    /// Clear pending timer state on teardown.
    pub fn cancel(&mut self) {
        self.timer_pending = false;
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffer.len()
    }

    pub fn last_speech(&self) -> Option<Instant> {
        self.last_speech
    }
}

/// Root-mean-square amplitude of s16le PCM bytes.
pub fn rms_energy(pcm: &[u8]) -> f32 {
    let mut sum_squares = 0.0f64;
    let mut samples = 0u64;
    for frame in pcm.chunks_exact(2) {
        let sample = i16::from_le_bytes([frame[0], frame[1]]) as f64;
        sum_squares += sample * sample;
        samples += 1;
    }
    if samples == 0 {
        return 0.0;
    }
    (sum_squares / samples as f64).sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter() -> AudioSegmenter {
        AudioSegmenter::new(&SegmenterConfig::default())
    }

    fn chunk(amplitude: i16, samples: usize) -> Vec<u8> {
        amplitude
            .to_le_bytes()
            .iter()
            .copied()
            .cycle()
            .take(samples * 2)
            .collect()
    }

    #[test]
    fn test_rms_of_constant_amplitude() {
        let pcm = chunk(1000, 160);
        let rms = rms_energy(&pcm);
        assert!((rms - 1000.0).abs() < 0.01, "rms was {rms}");
        assert_eq!(rms_energy(&[]), 0.0);
    }

    #[test]
    fn test_speech_cancels_pending_timer() {
        let mut seg = segmenter();
        assert_eq!(seg.ingest(&chunk(3000, 1600)), ChunkOutcome::SpeechActive);
        assert_eq!(seg.ingest(&chunk(0, 1600)), ChunkOutcome::ArmSilenceTimer);
        // Speech resumes before the timer fires: the next quiet run re-arms.
        assert_eq!(seg.ingest(&chunk(3000, 1600)), ChunkOutcome::SpeechActive);
        assert_eq!(seg.ingest(&chunk(0, 1600)), ChunkOutcome::ArmSilenceTimer);
    }

    #[test]
    fn test_timer_armed_once_per_silence_run() {
        let mut seg = segmenter();
        seg.ingest(&chunk(3000, 1600));
        assert_eq!(seg.ingest(&chunk(0, 1600)), ChunkOutcome::ArmSilenceTimer);
        assert_eq!(seg.ingest(&chunk(0, 1600)), ChunkOutcome::Buffered);
        assert_eq!(seg.ingest(&chunk(0, 1600)), ChunkOutcome::Buffered);
    }

    #[test]
    fn test_boundary_dispatches_once_and_clears() {
        let mut seg = segmenter();
        seg.ingest(&chunk(3000, 1600)); // 3200 bytes of speech
        seg.ingest(&chunk(0, 1600));
        let utterance = seg.silence_elapsed().expect("utterance should dispatch");
        assert_eq!(utterance.len(), 6400);
        assert_eq!(seg.buffered_bytes(), 0);
        // A second expiry has nothing to dispatch.
        assert!(seg.silence_elapsed().is_none());
    }

    #[test]
    fn test_sub_minimum_utterance_discarded() {
        let mut seg = segmenter();
        seg.ingest(&chunk(3000, 800)); // 1600 bytes, below the 3200 floor
        seg.ingest(&chunk(0, 100));
        assert!(seg.silence_elapsed().is_none());
        assert_eq!(seg.buffered_bytes(), 0);
    }

    #[test]
    fn test_quiet_stream_never_marks_speech() {
        let mut seg = segmenter();
        assert_eq!(seg.ingest(&chunk(100, 1600)), ChunkOutcome::ArmSilenceTimer);
        assert!(seg.last_speech().is_none());
    }

    #[test]
    fn test_threshold_is_configuration() {
        let config = SegmenterConfig {
            silence_threshold: 50.0,
            ..SegmenterConfig::default()
        };
        let mut seg = AudioSegmenter::new(&config);
        assert_eq!(seg.ingest(&chunk(100, 1600)), ChunkOutcome::SpeechActive);
    }
}
