use std::fmt;

use serde::{Deserialize, Serialize};

/// PCM sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleFormat {
    /// Unsigned 8-bit.
    #[serde(rename = "PCM_8")]
    Pcm8,
    /// Signed 16-bit little-endian.
    #[serde(rename = "PCM_16")]
    Pcm16,
    /// Signed 32-bit little-endian.
    #[serde(rename = "PCM_32")]
    Pcm32,
    /// 8.24 fixed point in a 32-bit little-endian container.
    #[serde(rename = "PCM_8_24")]
    Pcm8_24,
}

impl SampleFormat {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::Pcm8 => 1,
            SampleFormat::Pcm16 => 2,
            SampleFormat::Pcm32 | SampleFormat::Pcm8_24 => 4,
        }
    }

    pub fn from_config_name(name: &str) -> Option<Self> {
        match name {
            "PCM_8" => Some(SampleFormat::Pcm8),
            "PCM_16" => Some(SampleFormat::Pcm16),
            "PCM_32" => Some(SampleFormat::Pcm32),
            "PCM_8_24" => Some(SampleFormat::Pcm8_24),
            _ => None,
        }
    }

    pub fn config_name(self) -> &'static str {
        match self {
            SampleFormat::Pcm8 => "PCM_8",
            SampleFormat::Pcm16 => "PCM_16",
            SampleFormat::Pcm32 => "PCM_32",
            SampleFormat::Pcm8_24 => "PCM_8_24",
        }
    }

    /// Formats the PCM layer can open a hardware endpoint with.
    pub fn is_hardware_supported(self) -> bool {
        matches!(self, SampleFormat::Pcm16 | SampleFormat::Pcm32)
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_name())
    }
}

/// Rate, channel count and encoding of one side of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub format: SampleFormat,
}

impl PcmFormat {
    pub fn new(sample_rate: u32, channels: u16, format: SampleFormat) -> Self {
        Self {
            sample_rate,
            channels,
            format,
        }
    }

    /// Bytes in one frame (one sample per channel).
    pub fn frame_size(&self) -> usize {
        self.channels as usize * self.format.bytes_per_sample()
    }
}
