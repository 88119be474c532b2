use thiserror::Error;

use super::device::{DeviceType, Direction};

/// Failure to load the routing configuration. Fatal to engine start-up.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read config {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid engine configuration: {0}")]
    Invalid(String),
}

/// Failure while applying a mixer control.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("mixer control not found: {0}")]
    Unresolvable(String),

    #[error("mixer rejected write to {name}: {reason}")]
    WriteRejected { name: String, reason: String },

    #[error("unable to open mixer for card {card}: {reason}")]
    MixerUnavailable { card: u32, reason: String },

    #[error("invalid value {value:?} for control {name}")]
    InvalidValue { name: String, value: String },
}

/// PCM open/read/write failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HardwareError {
    #[error("unable to open pcm {card}:{device}: {reason}")]
    Open { card: u32, device: u32, reason: String },

    #[error("pcm read failed: {0}")]
    Read(String),

    #[error("pcm write failed: {0}")]
    Write(String),

    #[error("pcm device is not ready")]
    NotReady,

    #[error("hardware delivered no frames")]
    Underrun,
}

/// Errors surfaced by every public routing and stream operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error(transparent)]
    Hardware(#[from] HardwareError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no {direction} device configured for {device}")]
    DeviceNotFound { direction: Direction, device: DeviceType },

    #[error("{0} direction is disabled")]
    DirectionDisabled(Direction),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("modem link: {0}")]
    ModemLink(String),
}

impl RouteError {
    /// Whether the failure came from the PCM layer.
    pub fn is_hardware(&self) -> bool {
        matches!(self, Self::Hardware(_))
    }
}
