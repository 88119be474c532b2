//! Conversion between raw PCM bytes and 16-bit working samples.
//!
//! All processing runs on interleaved `i16`. Wider formats are narrowed
//! on decode and widened on encode; the low bits are lost.

use crate::models::format::SampleFormat;

/// Decode little-endian PCM `bytes` into 16-bit samples.
///
/// Trailing bytes that do not form a whole sample are ignored.
pub fn decode(format: SampleFormat, bytes: &[u8]) -> Vec<i16> {
    match format {
        SampleFormat::Pcm8 => bytes.iter().map(|&b| ((b as i16) - 128) << 8).collect(),
        SampleFormat::Pcm16 => bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect(),
        SampleFormat::Pcm32 => bytes
            .chunks_exact(4)
            .map(|b| (i32::from_le_bytes([b[0], b[1], b[2], b[3]]) >> 16) as i16)
            .collect(),
        // Q8.24: 1.0 is 1 << 24, which maps to 1 << 15.
        SampleFormat::Pcm8_24 => bytes
            .chunks_exact(4)
            .map(|b| {
                let q = i32::from_le_bytes([b[0], b[1], b[2], b[3]]) >> 9;
                q.clamp(i16::MIN as i32, i16::MAX as i32) as i16
            })
            .collect(),
    }
}

/// Encode 16-bit samples as little-endian PCM bytes.
pub fn encode(format: SampleFormat, samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * format.bytes_per_sample());
    match format {
        SampleFormat::Pcm8 => out.extend(samples.iter().map(|&s| ((s >> 8) + 128) as u8)),
        SampleFormat::Pcm16 => {
            for s in samples {
                out.extend_from_slice(&s.to_le_bytes());
            }
        }
        SampleFormat::Pcm32 => {
            for &s in samples {
                out.extend_from_slice(&((s as i32) << 16).to_le_bytes());
            }
        }
        SampleFormat::Pcm8_24 => {
            for &s in samples {
                out.extend_from_slice(&((s as i32) << 9).to_le_bytes());
            }
        }
    }
    out
}
