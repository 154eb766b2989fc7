//! WAV container framing for transcription uploads
//!
//! Utterances arrive as raw mono 16 kHz s16le PCM; the transcription
//! provider wants a standard RIFF/WAVE container (44-byte header + samples).

use anyhow::{Context, Result};
use std::io::Cursor;

/// Sample rate of browser microphone audio after client-side downsampling.
pub const SAMPLE_RATE_HZ: u32 = 16_000;

/// Wrap raw s16le PCM bytes in a WAV container.
///
/// A trailing odd byte is dropped; the payload is expected to be whole
/// 16-bit frames.
pub fn pcm16_to_wav(pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).context("Failed to create WAV writer")?;
        for frame in pcm.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([frame[0], frame[1]]))
                .context("Failed to write WAV sample")?;
        }
        writer.finalize().context("Failed to finalize WAV data")?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    fn read_u16_le(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    #[test]
    fn test_container_is_header_plus_data() {
        let pcm = vec![0u8; 32000]; // one second of silence
        let wav = pcm16_to_wav(&pcm, SAMPLE_RATE_HZ).unwrap();
        assert_eq!(wav.len(), 44 + 32000);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
    }

    #[test]
    fn test_header_size_fields() {
        let pcm = vec![1u8; 6400];
        let n = pcm.len() as u32;
        let wav = pcm16_to_wav(&pcm, SAMPLE_RATE_HZ).unwrap();
        assert_eq!(read_u32_le(&wav, 4), 36 + n);
        assert_eq!(read_u32_le(&wav, 40), n);
    }

    #[test]
    fn test_format_chunk_describes_mono_16khz_pcm() {
        let wav = pcm16_to_wav(&[0u8; 320], SAMPLE_RATE_HZ).unwrap();
        assert_eq!(read_u32_le(&wav, 16), 16); // fmt chunk size
        assert_eq!(read_u16_le(&wav, 20), 1); // uncompressed PCM
        assert_eq!(read_u16_le(&wav, 22), 1); // mono
        assert_eq!(read_u32_le(&wav, 24), 16_000); // sample rate
        assert_eq!(read_u32_le(&wav, 28), 32_000); // byte rate
        assert_eq!(read_u16_le(&wav, 32), 2); // block align
        assert_eq!(read_u16_le(&wav, 34), 16); // bits per sample
    }

    #[test]
    fn test_empty_payload_still_frames() {
        let wav = pcm16_to_wav(&[], SAMPLE_RATE_HZ).unwrap();
        assert_eq!(wav.len(), 44);
        assert_eq!(read_u32_le(&wav, 40), 0);
    }
}
