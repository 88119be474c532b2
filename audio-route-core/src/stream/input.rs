use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};

use super::{pcm_config, upgrade};
use crate::models::config::HardwareParams;
use crate::models::device::{DeviceType, Direction, RouteTarget};
use crate::models::error::{HardwareError, RouteError};
use crate::models::format::{PcmFormat, SampleFormat};
use crate::models::state::RouteOutcome;
use crate::processing::pipeline::{buffer_frames, InputPipeline};
use crate::routing::engine::RoutingEngine;
use crate::session::coordinator::{DeviceShared, DeviceState};
use crate::session::params;
use crate::traits::pcm::{PcmBackend, PcmDirection, PcmHandle};

pub(crate) struct InputContext {
    params: HardwareParams,
    pipeline: InputPipeline,
    device: Option<DeviceType>,
    handle: Option<Box<dyn PcmHandle>>,
}

impl InputContext {
    pub(crate) fn device(&self) -> Option<DeviceType> {
        self.device
    }

    pub(crate) fn standby(&mut self) {
        if self.handle.take().is_some() {
            log::debug!("Input stream entering standby");
        }
        self.pipeline.reset();
    }

    pub(crate) fn route(&mut self, routing: &mut RoutingEngine, target: RouteTarget) -> Result<RouteOutcome, RouteError> {
        match target {
            RouteTarget::Standby => {
                self.device = None;
                self.standby();
                Ok(RouteOutcome::StandbyRequested)
            }
            RouteTarget::Device(device) => {
                if !device.is_input() {
                    return Err(RouteError::InvalidArgument(format!("{} is not an input device", device)));
                }
                let outcome = routing.route(target)?;
                log::debug!("Input stream routed to {}", device);
                self.device = Some(device);
                Ok(outcome)
            }
        }
    }

    fn open_if_standby(&mut self, pcm: &dyn PcmBackend) -> Result<(), RouteError> {
        if self.handle.is_some() {
            return Ok(());
        }
        let config = pcm_config(&self.params, PcmDirection::Capture);
        let handle = pcm.open(&config).map_err(|e| {
            log::error!("Unable to open input pcm: {}", e);
            e
        })?;
        log::debug!(
            "Input pcm {}:{} opened ({} Hz, {} ch, {})",
            config.card,
            config.device,
            config.format.sample_rate,
            config.format.channels,
            config.format.format
        );
        self.pipeline.reset();
        self.handle = Some(handle);
        Ok(())
    }
}

pub(crate) struct InputInner {
    context: Mutex<InputContext>,
    pcm: Arc<dyn PcmBackend>,
    mic_mute: Arc<AtomicBool>,
    device: Weak<DeviceShared>,
}

impl InputInner {
    pub(crate) fn new(
        params: HardwareParams,
        client: PcmFormat,
        pcm: Arc<dyn PcmBackend>,
        mic_mute: Arc<AtomicBool>,
        device: Weak<DeviceShared>,
    ) -> Result<Self, RouteError> {
        let pipeline = InputPipeline::new(client, params.pcm, params.period_size as usize)?;
        if pipeline.resamples() {
            log::debug!(
                "Input resampling {} Hz -> {} Hz",
                params.pcm.sample_rate,
                client.sample_rate
            );
        }
        Ok(Self {
            context: Mutex::new(InputContext {
                params,
                pipeline,
                device: None,
                handle: None,
            }),
            pcm,
            mic_mute,
            device,
        })
    }

    pub(crate) fn device_link(&self) -> &Weak<DeviceShared> {
        &self.device
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, InputContext> {
        self.context.lock()
    }

    /// Re-route on a `routing=` request when the device differs. Called
    /// with the device lock held.
    pub(crate) fn apply_route(&self, state: &mut DeviceState, target: RouteTarget) -> Result<(), RouteError> {
        let mut ctx = self.lock();
        if ctx.device() != target.device() {
            ctx.route(&mut state.routing, target)?;
        }
        Ok(())
    }
}

/// Capture stream.
///
/// While the microphone is muted reads still pull from the hardware but
/// hand back silence.
pub struct InputStream {
    inner: Arc<InputInner>,
}

impl InputStream {
    pub(crate) fn new(inner: Arc<InputInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<InputInner> {
        &self.inner
    }

    /// Fill `buffer` with client-format audio. Returns the number of
    /// bytes read, always `buffer.len()` on success.
    pub fn read(&self, buffer: &mut [u8]) -> Result<usize, RouteError> {
        if buffer.is_empty() {
            return Ok(0);
        }
        let mut guard = self.inner.lock();
        let ctx = &mut *guard;
        let frame_size = ctx.pipeline.client().frame_size();
        if buffer.len() % frame_size != 0 {
            return Err(RouteError::InvalidArgument(format!(
                "{} bytes is not a whole number of {}-byte frames",
                buffer.len(),
                frame_size
            )));
        }
        ctx.open_if_standby(self.inner.pcm.as_ref())?;

        let result = match ctx.handle.as_mut() {
            Some(handle) => ctx.pipeline.read(handle.as_mut(), buffer.len()),
            None => Err(HardwareError::NotReady.into()),
        };
        let data = match result {
            Ok(data) => data,
            Err(e) => {
                log::error!("Input read of {} bytes failed: {}", buffer.len(), e);
                if e.is_hardware() {
                    ctx.standby();
                }
                return Err(e);
            }
        };

        if self.inner.mic_mute.load(Ordering::SeqCst) {
            buffer.fill(0);
        } else {
            buffer.copy_from_slice(&data);
        }
        Ok(buffer.len())
    }

    pub fn standby(&self) {
        self.inner.lock().standby();
    }

    pub fn is_standby(&self) -> bool {
        self.inner.lock().handle.is_none()
    }

    pub fn set_route(&self, target: RouteTarget) -> Result<RouteOutcome, RouteError> {
        let shared = upgrade(&self.inner.device)?;
        let mut state = shared.state.lock();
        let mut ctx = self.inner.lock();
        ctx.route(&mut state.routing, target)
    }

    pub fn set_parameters(&self, kv: &str) -> Result<(), RouteError> {
        let target = params::routing_target(kv)?;
        let shared = upgrade(&self.inner.device)?;
        let mut state = shared.state.lock();
        self.inner.apply_route(&mut state, target)
    }

    /// Scale the input gain control of the current device.
    pub fn set_gain(&self, gain: f32) -> Result<(), RouteError> {
        let shared = upgrade(&self.inner.device)?;
        let state = shared.state.lock();
        let Some(device) = self.inner.lock().device() else {
            log::debug!("Input gain {} ignored: no device", gain);
            return Ok(());
        };
        if let Err(e) = state.routing.set_input_gain(device, gain) {
            log::error!("Unable to set input gain on {}: {}", device, e);
        }
        Ok(())
    }

    pub fn set_sample_rate(&self, rate: u32) -> Result<(), RouteError> {
        if rate == 0 {
            return Err(RouteError::InvalidArgument("sample rate must be positive".into()));
        }
        let mut ctx = self.inner.lock();
        let client = *ctx.pipeline.client();
        if client.sample_rate == rate {
            return Ok(());
        }
        ctx.pipeline = InputPipeline::new(
            PcmFormat { sample_rate: rate, ..client },
            ctx.params.pcm,
            ctx.params.period_size as usize,
        )?;
        log::debug!("Input client rate {} -> {} Hz", client.sample_rate, rate);
        ctx.standby();
        Ok(())
    }

    pub fn set_format(&self, format: SampleFormat) -> Result<(), RouteError> {
        let mut ctx = self.inner.lock();
        let client = *ctx.pipeline.client();
        if client.format == format {
            return Ok(());
        }
        ctx.pipeline = InputPipeline::new(PcmFormat { format, ..client }, ctx.params.pcm, ctx.params.period_size as usize)?;
        // Frames pulled into the old pipeline are gone; restart capture.
        log::debug!("Input client format {} -> {}", client.format, format);
        ctx.standby();
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

    pub fn buffer_size(&self) -> usize {
        let ctx = self.inner.lock();
        let client = ctx.pipeline.client();
        buffer_frames(ctx.params.period_size, client.sample_rate, ctx.params.pcm.sample_rate) * client.frame_size()
    }

    pub fn close(self) -> Result<(), RouteError> {
        let Some(shared) = self.inner.device.upgrade() else {
            self.inner.lock().standby();
            return Ok(());
        };
        let mut state = shared.state.lock();
        self.inner.lock().standby();

        let owned = state.input.as_ref().is_some_and(|slot| Arc::ptr_eq(slot, &self.inner));
        if !owned {
            return Ok(());
        }
        state.input = None;
        log::debug!("Input stream closed");
        state.routing.set_enabled(Direction::Input, false)?;
        Ok(())
    }
}
