use std::path::PathBuf;

use serde::Serialize;

use super::device::Direction;
use super::format::{PcmFormat, SampleFormat};

pub const DEFAULT_CONFIG_PATH: &str = "/system/etc/tinyalsa-audio.xml";
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub const DEFAULT_MODEM_VOLUME_STEPS: u32 = 5;

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Routing configuration file loaded at start-up.
    pub config_path: PathBuf,

    /// Highest volume step understood by the modem link (default: 5).
    pub modem_volume_steps: u32,

    /// Period size used when a direction leaves it unset (default: 1024 frames).
    pub default_period_size: u32,

    /// Period count used when a direction leaves it unset (default: 4).
    pub default_period_count: u32,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.default_period_size == 0 {
            return Err("default period size must be positive".into());
        }
        if self.default_period_count == 0 {
            return Err("default period count must be positive".into());
        }
        Ok(())
    }

    /// Volume steps with the zero fallback applied.
    pub fn effective_volume_steps(&self) -> u32 {
        if self.modem_volume_steps == 0 {
            DEFAULT_MODEM_VOLUME_STEPS
        } else {
            self.modem_volume_steps
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            modem_volume_steps: DEFAULT_MODEM_VOLUME_STEPS,
            default_period_size: 1024,
            default_period_count: 4,
        }
    }
}

/// Hardware I/O parameters of one direction, as written in the routing
/// configuration. Zero / `None` means "not specified".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DirectionConfig {
    pub card: u32,
    pub device: u32,
    pub sample_rate: u32,
    pub channels: u16,
    pub format: Option<SampleFormat>,
    pub period_size: u32,
    pub period_count: u32,
}

impl DirectionConfig {
    /// Apply the documented fallbacks. Done at stream-open time, never
    /// while parsing.
    pub fn resolve(&self, direction: Direction, engine: &EngineConfig) -> HardwareParams {
        let default_channels = match direction {
            Direction::Input => 1,
            Direction::Output | Direction::Modem => 2,
        };
        let or = |value: u32, fallback: u32| if value == 0 { fallback } else { value };

        HardwareParams {
            card: self.card,
            device: self.device,
            pcm: PcmFormat::new(
                or(self.sample_rate, DEFAULT_SAMPLE_RATE),
                if self.channels == 0 { default_channels } else { self.channels },
                self.format.unwrap_or(SampleFormat::Pcm16),
            ),
            period_size: or(self.period_size, engine.default_period_size),
            period_count: or(self.period_count, engine.default_period_count),
        }
    }
}

/// Fully resolved hardware endpoint parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareParams {
    pub card: u32,
    pub device: u32,
    pub pcm: PcmFormat,
    pub period_size: u32,
    pub period_count: u32,
}

/// Format requested by a client when opening a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamConfig {
    /// Client sample rate in Hz (0 = direction fallback).
    pub sample_rate: u32,

    /// Client channel count (0 = direction fallback).
    pub channels: u16,

    /// Client sample encoding (`None` = direction fallback).
    pub format: Option<SampleFormat>,
}

impl StreamConfig {
    pub fn new(sample_rate: u32, channels: u16, format: SampleFormat) -> Self {
        Self {
            sample_rate,
            channels,
            format: Some(format),
        }
    }
}
