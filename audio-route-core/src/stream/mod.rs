pub mod input;
pub mod output;

pub use input::InputStream;
pub use output::OutputStream;

use std::sync::{Arc, Weak};

use crate::models::config::{HardwareParams, StreamConfig};
use crate::models::error::RouteError;
use crate::models::format::PcmFormat;
use crate::session::coordinator::DeviceShared;
use crate::traits::pcm::{PcmConfig, PcmDirection};

/// Client-side format of a stream. Unset request fields take the
/// hardware value.
pub(crate) fn client_format(config: &StreamConfig, hw: &PcmFormat) -> PcmFormat {
    PcmFormat::new(
        if config.sample_rate == 0 { hw.sample_rate } else { config.sample_rate },
        if config.channels == 0 { hw.channels } else { config.channels },
        config.format.unwrap_or(hw.format),
    )
}

pub(crate) fn pcm_config(params: &HardwareParams, direction: PcmDirection) -> PcmConfig {
    PcmConfig {
        card: params.card,
        device: params.device,
        direction,
        format: params.pcm,
        period_size: params.period_size,
        period_count: params.period_count,
    }
}

/// Resolve a stream's non-owning link back to its coordinator.
pub(crate) fn upgrade(device: &Weak<DeviceShared>) -> Result<Arc<DeviceShared>, RouteError> {
    device
        .upgrade()
        .ok_or_else(|| RouteError::InvalidState("audio device has been closed".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format::SampleFormat;

    #[test]
    fn unset_fields_take_hardware_values() {
        let hw = PcmFormat::new(44100, 2, SampleFormat::Pcm16);
        assert_eq!(client_format(&StreamConfig::default(), &hw), hw);

        let config = StreamConfig {
            sample_rate: 48000,
            channels: 0,
            format: Some(SampleFormat::Pcm8),
        };
        assert_eq!(
            client_format(&config, &hw),
            PcmFormat::new(48000, 2, SampleFormat::Pcm8)
        );
    }
}
