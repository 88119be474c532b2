use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};

use super::{pcm_config, upgrade};
use crate::models::config::HardwareParams;
use crate::models::device::{DeviceType, Direction, RouteTarget};
use crate::models::error::{HardwareError, RouteError};
use crate::models::format::{PcmFormat, SampleFormat};
use crate::models::state::RouteOutcome;
use crate::processing::pipeline::{buffer_frames, OutputPipeline};
use crate::routing::engine::RoutingEngine;
use crate::session::coordinator::{DeviceShared, DeviceState};
use crate::session::params;
use crate::traits::pcm::{PcmBackend, PcmDirection, PcmHandle};

/// Per-stream state guarded by the stream lock.
pub(crate) struct OutputContext {
    params: HardwareParams,
    pipeline: OutputPipeline,
    device: Option<DeviceType>,
    /// `None` while in standby.
    handle: Option<Box<dyn PcmHandle>>,
}

impl OutputContext {
    pub(crate) fn device(&self) -> Option<DeviceType> {
        self.device
    }

    /// Close the hardware handle if one is open.
    pub(crate) fn standby(&mut self) {
        if self.handle.take().is_some() {
            log::debug!("Output stream entering standby");
        }
    }

    /// Route the stream. A standby target closes the hardware instead
    /// of touching control lists.
    pub(crate) fn route(&mut self, routing: &mut RoutingEngine, target: RouteTarget) -> Result<RouteOutcome, RouteError> {
        match target {
            RouteTarget::Standby => {
                self.device = None;
                self.standby();
                Ok(RouteOutcome::StandbyRequested)
            }
            RouteTarget::Device(device) => {
                if !device.is_output() {
                    return Err(RouteError::InvalidArgument(format!(
                        "{} is not an output device",
                        device
                    )));
                }
                let outcome = routing.route(target)?;
                log::debug!("Output stream routed to {}", device);
                self.device = Some(device);
                Ok(outcome)
            }
        }
    }

    fn open_if_standby(&mut self, pcm: &dyn PcmBackend) -> Result<(), RouteError> {
        if self.handle.is_some() {
            return Ok(());
        }
        let config = pcm_config(&self.params, PcmDirection::Playback);
        let handle = pcm.open(&config).map_err(|e| {
            log::error!("Unable to open output pcm: {}", e);
            e
        })?;
        log::debug!(
            "Output pcm {}:{} opened ({} Hz, {} ch, {})",
            config.card,
            config.device,
            config.format.sample_rate,
            config.format.channels,
            config.format.format
        );
        self.handle = Some(handle);
        Ok(())
    }
}

pub(crate) struct OutputInner {
    context: Mutex<OutputContext>,
    pcm: Arc<dyn PcmBackend>,
    device: Weak<DeviceShared>,
}

impl OutputInner {
    pub(crate) fn new(
        params: HardwareParams,
        client: PcmFormat,
        pcm: Arc<dyn PcmBackend>,
        device: Weak<DeviceShared>,
    ) -> Result<Self, RouteError> {
        let pipeline = OutputPipeline::new(client, params.pcm)?;
        if pipeline.resamples() {
            log::debug!(
                "Output resampling {} Hz -> {} Hz",
                client.sample_rate,
                params.pcm.sample_rate
            );
        }
        Ok(Self {
            context: Mutex::new(OutputContext {
                params,
                pipeline,
                device: None,
                handle: None,
            }),
            pcm,
            device,
        })
    }

    pub(crate) fn device_link(&self) -> &Weak<DeviceShared> {
        &self.device
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, OutputContext> {
        self.context.lock()
    }

    /// Apply a `routing=` request with the device lock already held:
    /// the stream is re-routed when its device differs, and the call
    /// link follows when its device differs.
    pub(crate) fn apply_route(&self, state: &mut DeviceState, target: RouteTarget) -> Result<(), RouteError> {
        {
            let mut ctx = self.lock();
            if ctx.device() != target.device() {
                ctx.route(&mut state.routing, target)?;
            }
        }
        if let (Some(link), Some(device)) = (state.modem.as_mut(), target.device()) {
            if link.current_device() != Some(device) {
                // Call audio keeps flowing on the old path; the error is already logged.
                let _ = link.set_route(device);
            }
        }
        Ok(())
    }
}

/// Playback stream.
///
/// Hardware is opened lazily on the first write after standby. Writes
/// take only the stream lock; control operations take the device lock
/// first, then the stream lock.
pub struct OutputStream {
    inner: Arc<OutputInner>,
}

impl OutputStream {
    pub(crate) fn new(inner: Arc<OutputInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<OutputInner> {
        &self.inner
    }

    /// Convert and play `buffer`. Returns the number of client bytes
    /// consumed.
    ///
    /// A hardware failure closes the handle; the next write reopens it.
    pub fn write(&self, buffer: &[u8]) -> Result<usize, RouteError> {
        if buffer.is_empty() {
            return Ok(0);
        }
        let mut guard = self.inner.lock();
        let ctx = &mut *guard;
        let data = ctx.pipeline.process(buffer)?;
        ctx.open_if_standby(self.inner.pcm.as_ref())?;

        let result = match ctx.handle.as_mut() {
            Some(handle) => handle.write(&data),
            None => Err(HardwareError::NotReady),
        };
        if let Err(e) = result {
            log::error!("Output write of {} bytes failed: {}", data.len(), e);
            ctx.standby();
            return Err(e.into());
        }
        Ok(buffer.len())
    }

    pub fn standby(&self) {
        self.inner.lock().standby();
    }

    pub fn is_standby(&self) -> bool {
        self.inner.lock().handle.is_none()
    }

    /// Route to `target`; [`RouteTarget::Standby`] puts the stream in
    /// standby and leaves the control lists alone.
    pub fn set_route(&self, target: RouteTarget) -> Result<RouteOutcome, RouteError> {
        let shared = upgrade(&self.inner.device)?;
        let mut state = shared.state.lock();
        let mut ctx = self.inner.lock();
        ctx.route(&mut state.routing, target)
    }

    /// Handle a `routing=<device>` parameter string.
    pub fn set_parameters(&self, kv: &str) -> Result<(), RouteError> {
        let target = params::routing_target(kv)?;
        let shared = upgrade(&self.inner.device)?;
        let mut state = shared.state.lock();
        self.inner.apply_route(&mut state, target)
    }

    /// Set the volume of the current device to the mean of both sides.
    pub fn set_volume(&self, left: f32, right: f32) -> Result<(), RouteError> {
        let volume = (left + right) / 2.0;
        let shared = upgrade(&self.inner.device)?;
        let mut state = shared.state.lock();
        let Some(device) = self.inner.lock().device() else {
            log::debug!("Output volume {} ignored: no device", volume);
            return Ok(());
        };

        state.output_volumes.insert(device, volume);
        if let Err(e) = state.routing.set_output_volume(device, volume) {
            log::error!("Unable to set output volume on {}: {}", device, e);
        }
        Ok(())
    }

    /// Change the client sample rate. The hardware is closed so the next
    /// write starts from a fresh resampler.
    pub fn set_sample_rate(&self, rate: u32) -> Result<(), RouteError> {
        if rate == 0 {
            return Err(RouteError::InvalidArgument("sample rate must be positive".into()));
        }
        let mut ctx = self.inner.lock();
        let client = *ctx.pipeline.client();
        if client.sample_rate == rate {
            return Ok(());
        }
        ctx.pipeline = OutputPipeline::new(PcmFormat { sample_rate: rate, ..client }, ctx.params.pcm)?;
        log::debug!("Output client rate {} -> {} Hz", client.sample_rate, rate);
        ctx.standby();
        Ok(())
    }

    pub fn set_format(&self, format: SampleFormat) -> Result<(), RouteError> {
        let mut ctx = self.inner.lock();
        let client = *ctx.pipeline.client();
        if client.format == format {
            return Ok(());
        }
        ctx.pipeline = OutputPipeline::new(PcmFormat { format, ..client }, ctx.params.pcm)?;
        if format != ctx.params.pcm.format {
            ctx.standby();
        }
        Ok(())
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.lock().pipeline.client().sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.inner.lock().pipeline.client().channels
    }

    pub fn format(&self) -> SampleFormat {
        self.inner.lock().pipeline.client().format
    }

    pub fn hardware_format(&self) -> PcmFormat {
        self.inner.lock().params.pcm
    }

    pub fn device(&self) -> Option<DeviceType> {
        self.inner.lock().device()
    }

    /// Client bytes matching one hardware period.
    pub fn buffer_size(&self) -> usize {
        let ctx = self.inner.lock();
        let client = ctx.pipeline.client();
        buffer_frames(ctx.params.period_size, client.sample_rate, ctx.params.pcm.sample_rate) * client.frame_size()
    }

    /// Hardware buffering delay in milliseconds.
    pub fn latency_ms(&self) -> u32 {
        let ctx = self.inner.lock();
        let frames = ctx.params.period_size as u64 * ctx.params.period_count as u64;
        (frames * 1000 / ctx.params.pcm.sample_rate as u64) as u32
    }

    /// Close the stream: leave standby, free the coordinator slot and
    /// disable the output direction.
    pub fn close(self) -> Result<(), RouteError> {
        let Some(shared) = self.inner.device.upgrade() else {
            self.inner.lock().standby();
            return Ok(());
        };
        let mut state = shared.state.lock();
        self.inner.lock().standby();

        let owned = state.output.as_ref().is_some_and(|slot| Arc::ptr_eq(slot, &self.inner));
        if !owned {
            return Ok(());
        }
        state.output = None;
        log::debug!("Output stream closed");
        state.routing.set_enabled(Direction::Output, false)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::MixerWrite;
    use crate::models::config::StreamConfig;
    use crate::models::state::RoutingState;
    use crate::session::fixture::fixture;

    fn stereo(rate: u32) -> StreamConfig {
        StreamConfig::new(rate, 2, SampleFormat::Pcm16)
    }

    #[test]
    fn write_opens_hardware_lazily() {
        let f = fixture();
        let stream = f
            .coordinator
            .open_output_stream(RouteTarget::Device(DeviceType::Speaker), stereo(44100))
            .unwrap();
        assert!(stream.is_standby());
        assert_eq!(f.pcm.open_count(), 0);

        assert_eq!(stream.write(&[0u8; 64]).unwrap(), 64);
        assert!(!stream.is_standby());
        assert_eq!(f.pcm.open_count(), 1);
        assert_eq!(f.pcm.opened()[0].direction, PcmDirection::Playback);

        stream.write(&[0u8; 64]).unwrap();
        assert_eq!(f.pcm.open_count(), 1);
        assert_eq!(f.pcm.played().len(), 128);
    }

    #[test]
    fn resampled_write_rounds_hardware_frames() {
        let f = fixture();
        let stream = f.coordinator.open_output_stream(RouteTarget::Standby, stereo(48000)).unwrap();
        stream.write(&vec![0u8; 1024 * 4]).unwrap();
        assert_eq!(f.pcm.write_sizes(), vec![944 * 4]);
    }

    #[test]
    fn misaligned_write_never_touches_hardware() {
        let f = fixture();
        let stream = f.coordinator.open_output_stream(RouteTarget::Standby, stereo(44100)).unwrap();
        assert!(matches!(stream.write(&[0u8; 6]), Err(RouteError::InvalidArgument(_))));
        assert_eq!(f.pcm.open_count(), 0);
    }

    #[test]
    fn hardware_failure_returns_to_standby() {
        let f = fixture();
        let stream = f.coordinator.open_output_stream(RouteTarget::Standby, stereo(44100)).unwrap();
        stream.write(&[0u8; 4]).unwrap();

        f.pcm.fail_io(Some("broken pipe"));
        assert!(matches!(stream.write(&[0u8; 4]), Err(RouteError::Hardware(HardwareError::Write(_)))));
        assert!(stream.is_standby());
        assert_eq!(f.pcm.close_count(), 1);

        f.pcm.fail_io(None);
        stream.write(&[0u8; 4]).unwrap();
        assert_eq!(f.pcm.open_count(), 2);
    }

    #[test]
    fn open_failure_is_reported() {
        let f = fixture();
        let stream = f.coordinator.open_output_stream(RouteTarget::Standby, stereo(44100)).unwrap();
        f.pcm.fail_open(Some("busy"));
        assert!(matches!(stream.write(&[0u8; 4]), Err(RouteError::Hardware(HardwareError::Open { .. }))));
        assert!(stream.is_standby());
    }

    #[test]
    fn standby_route_closes_hardware_without_control_writes() {
        let f = fixture();
        let stream = f
            .coordinator
            .open_output_stream(RouteTarget::Device(DeviceType::Speaker), stereo(44100))
            .unwrap();
        stream.write(&[0u8; 4]).unwrap();
        f.mixer.clear_writes();

        assert_eq!(stream.set_route(RouteTarget::Standby).unwrap(), RouteOutcome::StandbyRequested);
        assert!(stream.is_standby());
        assert_eq!(stream.device(), None);
        assert!(f.mixer.writes().is_empty());
    }

    #[test]
    fn set_parameters_routes_on_device_change_only() {
        let f = fixture();
        let stream = f
            .coordinator
            .open_output_stream(RouteTarget::Device(DeviceType::Speaker), stereo(44100))
            .unwrap();
        f.mixer.clear_writes();

        stream.set_parameters("routing=2").unwrap();
        assert!(f.mixer.writes().is_empty());

        stream.set_parameters("routing=1").unwrap();
        assert_eq!(stream.device(), Some(DeviceType::Earpiece));
        assert_eq!(
            f.coordinator.routing_state(Direction::Output),
            RoutingState::Enabled {
                current: Some(DeviceType::Earpiece)
            }
        );
        assert!(matches!(stream.set_parameters("volume=1"), Err(RouteError::InvalidArgument(_))));
    }

    #[test]
    fn input_device_is_rejected() {
        let f = fixture();
        let stream = f.coordinator.open_output_stream(RouteTarget::Standby, stereo(44100)).unwrap();
        assert!(matches!(
            stream.set_route(RouteTarget::Device(DeviceType::BuiltinMic)),
            Err(RouteError::InvalidArgument(_))
        ));
    }

    #[test]
    fn volume_scales_output_volume_control() {
        let f = fixture();
        let stream = f
            .coordinator
            .open_output_stream(RouteTarget::Device(DeviceType::Speaker), stereo(44100))
            .unwrap();
        f.mixer.clear_writes();

        stream.set_volume(0.25, 0.75).unwrap();
        assert_eq!(
            f.mixer.writes(),
            vec![MixerWrite::Value {
                name: "SPK Volume".into(),
                index: 0,
                value: 30
            }]
        );
        assert_eq!(f.coordinator.output_volume(DeviceType::Speaker), Some(0.5));
    }

    #[test]
    fn sample_rate_change_forces_standby() {
        let f = fixture();
        let stream = f.coordinator.open_output_stream(RouteTarget::Standby, stereo(44100)).unwrap();
        stream.write(&[0u8; 4]).unwrap();

        stream.set_sample_rate(44100).unwrap();
        assert!(!stream.is_standby());

        stream.set_sample_rate(22050).unwrap();
        assert!(stream.is_standby());
        assert_eq!(stream.sample_rate(), 22050);
        assert!(stream.set_sample_rate(0).is_err());
    }

    #[test]
    fn format_change_forces_standby_when_unlike_hardware() {
        let f = fixture();
        let stream = f.coordinator.open_output_stream(RouteTarget::Standby, stereo(44100)).unwrap();
        stream.write(&[0u8; 4]).unwrap();

        stream.set_format(SampleFormat::Pcm8).unwrap();
        assert!(stream.is_standby());
        assert_eq!(stream.format(), SampleFormat::Pcm8);

        stream.write(&[128u8; 2]).unwrap();
        stream.set_format(SampleFormat::Pcm16).unwrap();
        assert!(!stream.is_standby());
    }

    #[test]
    fn buffer_size_and_latency() {
        let f = fixture();
        let stream = f.coordinator.open_output_stream(RouteTarget::Standby, stereo(88200)).unwrap();
        // 1024-frame periods, 4 periods, 44.1 kHz hardware.
        assert_eq!(stream.buffer_size(), 2048 * 4);
        assert_eq!(stream.latency_ms(), 92);
    }

    #[test]
    fn close_disables_direction_and_frees_slot() {
        let f = fixture();
        let stream = f.coordinator.open_output_stream(RouteTarget::Standby, stereo(44100)).unwrap();
        stream.write(&[0u8; 4]).unwrap();
        stream.close().unwrap();

        assert_eq!(f.coordinator.routing_state(Direction::Output), RoutingState::Disabled);
        assert_eq!(f.pcm.close_count(), 1);
        assert!(f
            .coordinator
            .open_output_stream(RouteTarget::Standby, stereo(44100))
            .is_ok());
    }
}
