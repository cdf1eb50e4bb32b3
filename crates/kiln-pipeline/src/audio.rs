//! WAV audio transcoding

use crate::capability::{AudioAsset, AudioTranscoder, SourceFile};
use kiln_core::{KilnError, Result};
use std::io::Cursor;

/// Decodes WAV (integer or float samples) and re-encodes it as 16-bit PCM WAV.
///
/// The runtime's lossy codec is applied downstream; the artifact records the
/// format it actually carries.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavTranscoder;

impl WavTranscoder {
    /// Transcode in-memory WAV bytes
    pub fn transcode_bytes(&self, name: &str, bytes: &[u8]) -> Result<AudioAsset> {
        let fail = |reason: String| KilnError::AudioTranscodeError {
            path: name.to_string(),
            reason,
        };

        let reader = hound::WavReader::new(Cursor::new(bytes))
            .map_err(|e| fail(format!("Failed to read WAV: {}", e)))?;
        let spec = reader.spec();
        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(fail("WAV header has no channels or sample rate".to_string()));
        }

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Int => {
                let max_val = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|s| s as f32 / max_val))
                    .collect::<std::result::Result<Vec<f32>, hound::Error>>()
            }
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<Vec<f32>, hound::Error>>(),
        }
        .map_err(|e| fail(format!("Failed to decode samples: {}", e)))?;

        let out_spec = hound::WavSpec {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut buffer = Vec::new();
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut buffer), out_spec)
                .map_err(|e| fail(format!("Failed to start WAV encode: {}", e)))?;
            for &sample in &samples {
                let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
                writer
                    .write_sample(pcm)
                    .map_err(|e| fail(format!("Failed to encode sample: {}", e)))?;
            }
            writer
                .finalize()
                .map_err(|e| fail(format!("Failed to finish WAV encode: {}", e)))?;
        }

        let frames = samples.len() / spec.channels as usize;
        Ok(AudioAsset {
            format: "wav".to_string(),
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            duration_secs: frames as f32 / spec.sample_rate as f32,
            bytes: buffer,
        })
    }
}

impl AudioTranscoder for WavTranscoder {
    fn transcode(&self, source: &SourceFile) -> Result<AudioAsset> {
        let bytes = std::fs::read(&source.path).map_err(|e| KilnError::AudioTranscodeError {
            path: source.name.clone(),
            reason: e.to_string(),
        })?;
        self.transcode_bytes(&source.name, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float_wav(samples: &[f32], sample_rate: u32, channels: u16) -> Vec<u8> {
        let mut buffer = Vec::new();
        {
            let spec = hound::WavSpec {
                channels,
                sample_rate,
                bits_per_sample: 32,
                sample_format: hound::SampleFormat::Float,
            };
            let mut writer = hound::WavWriter::new(Cursor::new(&mut buffer), spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        buffer
    }

    #[test]
    fn test_float_wav_becomes_pcm16() {
        let samples: Vec<f32> = (0..2000).map(|i| (i as f32 / 50.0).sin() * 0.5).collect();
        let asset = WavTranscoder
            .transcode_bytes("tone.wav", &float_wav(&samples, 8000, 2))
            .unwrap();

        assert_eq!(asset.format, "wav");
        assert_eq!(asset.channels, 2);
        assert_eq!(asset.sample_rate, 8000);
        assert!((asset.duration_secs - 0.125).abs() < 1e-6);

        let reader = hound::WavReader::new(Cursor::new(&asset.bytes)).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 16);
        assert_eq!(reader.spec().sample_format, hound::SampleFormat::Int);
        assert_eq!(reader.len(), 2000);
    }

    #[test]
    fn test_clipping_is_clamped() {
        let asset = WavTranscoder
            .transcode_bytes("loud.wav", &float_wav(&[2.0, -2.0], 100, 1))
            .unwrap();
        let mut reader = hound::WavReader::new(Cursor::new(&asset.bytes)).unwrap();
        let out: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(out, vec![i16::MAX, -i16::MAX]);
    }

    #[test]
    fn test_garbage_is_transcode_error() {
        let err = WavTranscoder.transcode_bytes("noise.mp3", b"ID3....").unwrap_err();
        assert!(matches!(err, KilnError::AudioTranscodeError { ref path, .. } if path == "noise.mp3"));
    }

    #[test]
    fn test_missing_file_is_transcode_error() {
        let source = SourceFile::new("sfx/none.wav", "/nonexistent/none.wav");
        let err = WavTranscoder.transcode(&source).unwrap_err();
        assert!(matches!(err, KilnError::AudioTranscodeError { .. }));
    }
}
