use crate::models::error::HardwareError;
use crate::models::format::PcmFormat;

/// Data direction of a PCM endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmDirection {
    Playback,
    Capture,
}

/// Parameters used to open a PCM endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmConfig {
    pub card: u32,
    pub device: u32,
    pub direction: PcmDirection,
    pub format: PcmFormat,
    pub period_size: u32,
    pub period_count: u32,
}

/// PCM layer of the sound hardware.
pub trait PcmBackend: Send + Sync {
    /// Open an endpoint. The returned handle is closed when dropped.
    fn open(&self, config: &PcmConfig) -> Result<Box<dyn PcmHandle>, HardwareError>;
}

/// An open PCM endpoint. All calls block until the hardware completes.
pub trait PcmHandle: Send {
    /// Fill `buffer` completely with captured bytes.
    fn read(&mut self, buffer: &mut [u8]) -> Result<(), HardwareError>;

    /// Queue all of `buffer` for playback.
    fn write(&mut self, buffer: &[u8]) -> Result<(), HardwareError>;
}
