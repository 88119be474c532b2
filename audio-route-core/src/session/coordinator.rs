use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::modem::ModemLinkHandle;
use super::params;
use crate::graph::control_graph::ControlGraph;
use crate::graph::loader;
use crate::models::config::{EngineConfig, StreamConfig};
use crate::models::device::{DeviceType, Direction, RouteTarget};
use crate::models::error::{ConfigError, RouteError};
use crate::models::state::{AudioMode, RoutingState};
use crate::processing::pipeline::buffer_frames;
use crate::routing::engine::RoutingEngine;
use crate::stream::input::{InputInner, InputStream};
use crate::stream::output::{OutputInner, OutputStream};
use crate::stream::{client_format, upgrade};
use crate::traits::mixer::Mixer;
use crate::traits::modem_link::ModemLinkProvider;
use crate::traits::pcm::PcmBackend;

/// Hardware seams handed to the coordinator.
#[derive(Clone)]
pub struct Backends {
    pub mixer: Arc<dyn Mixer>,
    pub pcm: Arc<dyn PcmBackend>,
    /// `None` runs calls without telling the modem about route or volume.
    pub modem: Option<Arc<dyn ModemLinkProvider>>,
}

/// Device-level state guarded by the device lock.
pub(crate) struct DeviceState {
    pub(crate) routing: RoutingEngine,
    pub(crate) mode: AudioMode,
    pub(crate) voice_volume: f32,
    pub(crate) master_volume: f32,
    pub(crate) output_volumes: HashMap<DeviceType, f32>,
    pub(crate) modem: Option<ModemLinkHandle>,
    pub(crate) output: Option<Arc<OutputInner>>,
    pub(crate) input: Option<Arc<InputInner>>,
}

impl DeviceState {
    /// Device the call is routed to: the modem link's device, else the
    /// output stream's device, else the earpiece.
    fn call_device(&self) -> DeviceType {
        self.modem
            .as_ref()
            .and_then(|link| link.current_device())
            .or_else(|| self.output_device())
            .unwrap_or(DeviceType::Earpiece)
    }

    fn output_device(&self) -> Option<DeviceType> {
        self.output.as_ref().and_then(|stream| stream.lock().device())
    }

    fn input_device(&self) -> Option<DeviceType> {
        self.input.as_ref().and_then(|stream| stream.lock().device())
    }
}

/// State shared between the coordinator and its streams. Streams hold
/// it weakly.
pub(crate) struct DeviceShared {
    pub(crate) state: Mutex<DeviceState>,
    pub(crate) mic_mute: Arc<AtomicBool>,
    pub(crate) pcm: Arc<dyn PcmBackend>,
    pub(crate) modem_provider: Option<Arc<dyn ModemLinkProvider>>,
    pub(crate) config: EngineConfig,
}

/// Owner of the routing engine, the call state and the open streams.
///
/// ```text
/// DeviceCoordinator ── device lock ──► DeviceState
///        │                               ├── RoutingEngine (mixer)
///        │                               ├── ModemLinkHandle (in call)
///        │                               └── stream slots ──► stream lock
///        └── OutputStream / InputStream (weak link back)
/// ```
///
/// At most one stream per direction is open. Opening a stream enables
/// its direction and closing it disables the direction again.
pub struct DeviceCoordinator {
    shared: Arc<DeviceShared>,
}

impl DeviceCoordinator {
    /// Load the routing configuration from `config.config_path`.
    pub fn open(config: EngineConfig, backends: Backends) -> Result<Self, RouteError> {
        config.validate().map_err(ConfigError::Invalid)?;
        let graph = loader::load_file(&config.config_path)?;
        Self::with_graph(graph, config, backends)
    }

    pub fn with_graph(graph: ControlGraph, config: EngineConfig, backends: Backends) -> Result<Self, RouteError> {
        config.validate().map_err(ConfigError::Invalid)?;
        let routing = RoutingEngine::new(Arc::new(graph), backends.mixer);
        log::info!("Audio device ready (modem link {})", if backends.modem.is_some() { "available" } else { "absent" });

        Ok(Self {
            shared: Arc::new(DeviceShared {
                state: Mutex::new(DeviceState {
                    routing,
                    mode: AudioMode::Normal,
                    voice_volume: 0.0,
                    master_volume: 1.0,
                    output_volumes: HashMap::new(),
                    modem: None,
                    output: None,
                    input: None,
                }),
                mic_mute: Arc::new(AtomicBool::new(false)),
                pcm: backends.pcm,
                modem_provider: backends.modem,
                config,
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    // --- Streams ---

    /// Open the playback stream, enable the output direction and route
    /// it to `devices`. Hardware stays closed until the first write.
    pub fn open_output_stream(&self, devices: RouteTarget, config: StreamConfig) -> Result<OutputStream, RouteError> {
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        if state.output.is_some() {
            return Err(RouteError::InvalidState("output stream already open".into()));
        }

        let hw = state
            .routing
            .graph()
            .output
            .config
            .resolve(Direction::Output, &self.shared.config);
        if !hw.pcm.format.is_hardware_supported() {
            return Err(RouteError::InvalidArgument(format!("hardware cannot play {}", hw.pcm.format)));
        }
        let client = client_format(&config, &hw.pcm);
        let inner = Arc::new(OutputInner::new(
            hw,
            client,
            Arc::clone(&self.shared.pcm),
            Arc::downgrade(&self.shared),
        )?);

        state.routing.set_enabled(Direction::Output, true)?;
        if let Err(e) = inner.lock().route(&mut state.routing, devices) {
            log::error!("Unable to route new output stream: {}", e);
            if let Err(e) = state.routing.set_enabled(Direction::Output, false) {
                log::error!("Unable to disable output direction: {}", e);
            }
            return Err(e);
        }

        log::debug!(
            "Output stream opened: {} Hz, {} ch, {}",
            client.sample_rate,
            client.channels,
            client.format
        );
        state.output = Some(Arc::clone(&inner));
        Ok(OutputStream::new(inner))
    }

    /// Open the capture stream, enable the input direction and route it
    /// to `devices`.
    pub fn open_input_stream(&self, devices: RouteTarget, config: StreamConfig) -> Result<InputStream, RouteError> {
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        if state.input.is_some() {
            return Err(RouteError::InvalidState("input stream already open".into()));
        }

        let hw = state
            .routing
            .graph()
            .input
            .config
            .resolve(Direction::Input, &self.shared.config);
        if !hw.pcm.format.is_hardware_supported() {
            return Err(RouteError::InvalidArgument(format!("hardware cannot capture {}", hw.pcm.format)));
        }
        let client = client_format(&config, &hw.pcm);
        let inner = Arc::new(InputInner::new(
            hw,
            client,
            Arc::clone(&self.shared.pcm),
            Arc::clone(&self.shared.mic_mute),
            Arc::downgrade(&self.shared),
        )?);

        state.routing.set_enabled(Direction::Input, true)?;
        if let Err(e) = inner.lock().route(&mut state.routing, devices) {
            log::error!("Unable to route new input stream: {}", e);
            if let Err(e) = state.routing.set_enabled(Direction::Input, false) {
                log::error!("Unable to disable input direction: {}", e);
            }
            return Err(e);
        }

        log::debug!(
            "Input stream opened: {} Hz, {} ch, {}",
            client.sample_rate,
            client.channels,
            client.format
        );
        state.input = Some(Arc::clone(&inner));
        Ok(InputStream::new(inner))
    }

    pub fn close_output_stream(&self, stream: OutputStream) -> Result<(), RouteError> {
        if !Arc::ptr_eq(&upgrade(stream.inner().device_link())?, &self.shared) {
            return Err(RouteError::InvalidArgument("stream belongs to another device".into()));
        }
        stream.close()
    }

    pub fn close_input_stream(&self, stream: InputStream) -> Result<(), RouteError> {
        if !Arc::ptr_eq(&upgrade(stream.inner().device_link())?, &self.shared) {
            return Err(RouteError::InvalidArgument("stream belongs to another device".into()));
        }
        stream.close()
    }

    /// Client bytes an input stream with `config` would read per
    /// hardware period.
    pub fn input_buffer_size(&self, config: &StreamConfig) -> usize {
        let state = self.shared.state.lock();
        let hw = state
            .routing
            .graph()
            .input
            .config
            .resolve(Direction::Input, &self.shared.config);
        let client = client_format(config, &hw.pcm);
        buffer_frames(hw.period_size, client.sample_rate, hw.pcm.sample_rate) * client.frame_size()
    }

    // --- Routing ---

    /// Handle a device-level `routing=<device>` parameter string.
    ///
    /// Output devices re-route the output stream and the call link,
    /// input devices re-route the input stream. With no output stream
    /// open, an output device still reaches the modem direction.
    pub fn set_parameters(&self, kv: &str) -> Result<(), RouteError> {
        let target = params::routing_target(kv)?;
        let RouteTarget::Device(device) = target else {
            log::debug!("Ignoring device-level standby route");
            return Ok(());
        };

        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        if device.is_output() {
            match state.output.clone() {
                Some(stream) => stream.apply_route(state, target)?,
                None => {
                    if state.routing.is_enabled(Direction::Modem) {
                        state.routing.set_device(Direction::Modem, device)?;
                    }
                    if let Some(link) = state.modem.as_mut() {
                        if link.current_device() != Some(device) {
                            let _ = link.set_route(device);
                        }
                    }
                }
            }
        } else if let Some(stream) = state.input.clone() {
            stream.apply_route(state, target)?;
        }
        Ok(())
    }

    pub fn routing_state(&self, direction: Direction) -> RoutingState {
        self.shared.state.lock().routing.state(direction)
    }

    // --- Call state ---

    pub fn mode(&self) -> AudioMode {
        self.shared.state.lock().mode
    }

    /// Switch the audio mode.
    ///
    /// Entering a call enables the modem direction, routes it to the
    /// output stream's device (earpiece when there is none), opens the
    /// modem link and forwards the remembered voice volume and mute.
    /// Leaving a call switches two-mic off, releases the link and
    /// disables the modem direction.
    pub fn set_mode(&self, mode: AudioMode) -> Result<(), RouteError> {
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        if state.mode == mode {
            return Ok(());
        }
        log::debug!("Audio mode {:?} -> {:?}", state.mode, mode);

        if mode.is_in_call() {
            state.routing.set_enabled(Direction::Modem, true)?;
            let device = state.output_device().unwrap_or(DeviceType::Earpiece);
            if let Err(e) = state.routing.route(RouteTarget::Device(device)) {
                log::error!("Unable to route call to {}: {}", device, e);
            }

            if let Some(provider) = &self.shared.modem_provider {
                let steps = self.shared.config.effective_volume_steps();
                match ModemLinkHandle::open(provider.as_ref(), Some(device), steps) {
                    Ok(mut link) => {
                        if device == DeviceType::Earpiece {
                            let _ = link.set_two_mic(true);
                        }
                        if state.voice_volume > 0.0 {
                            let _ = link.set_voice_volume(device, state.voice_volume);
                        }
                        if self.shared.mic_mute.load(Ordering::SeqCst) {
                            let _ = link.set_mic_mute(true);
                        }
                        state.modem = Some(link);
                    }
                    Err(e) => log::error!("Call continues without modem link: {}", e),
                }
            }
        } else if state.mode.is_in_call() {
            if let Some(mut link) = state.modem.take() {
                let _ = link.set_two_mic(false);
                link.close();
            }
            if let Err(e) = state.routing.set_enabled(Direction::Modem, false) {
                log::error!("Unable to disable modem direction: {}", e);
            }
        }

        state.mode = mode;
        Ok(())
    }

    pub fn voice_volume(&self) -> f32 {
        self.shared.state.lock().voice_volume
    }

    /// Set the in-call volume (0.0 to 1.0). Outside a call the value is
    /// only remembered for the next call.
    pub fn set_voice_volume(&self, volume: f32) -> Result<(), RouteError> {
        check_unit("voice volume", volume)?;
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        if state.voice_volume == volume {
            return Ok(());
        }

        if state.mode.is_in_call() {
            let device = state.call_device();
            if let Err(e) = state.routing.set_voice_volume(device, volume) {
                log::error!("Unable to set voice volume on {}: {}", device, e);
            }
            if let Some(link) = state.modem.as_mut() {
                let _ = link.set_voice_volume(device, volume);
            }
        }
        state.voice_volume = volume;
        Ok(())
    }

    pub fn master_volume(&self) -> f32 {
        self.shared.state.lock().master_volume
    }

    pub fn set_master_volume(&self, volume: f32) -> Result<(), RouteError> {
        check_unit("master volume", volume)?;
        let mut state = self.shared.state.lock();
        if let Err(e) = state.routing.set_master_volume(volume) {
            log::error!("Unable to set master volume: {}", e);
        }
        state.master_volume = volume;
        Ok(())
    }

    /// Last volume set on `device` through its output stream.
    pub fn output_volume(&self, device: DeviceType) -> Option<f32> {
        self.shared.state.lock().output_volumes.get(&device).copied()
    }

    pub fn mic_mute(&self) -> bool {
        self.shared.mic_mute.load(Ordering::SeqCst)
    }

    /// Mute the microphone. In a call the modem direction's mute control
    /// is used; otherwise the input stream's device control. Open input
    /// streams return silence while muted either way.
    pub fn set_mic_mute(&self, mute: bool) -> Result<(), RouteError> {
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        if self.shared.mic_mute.load(Ordering::SeqCst) == mute {
            return Ok(());
        }

        if state.mode.is_in_call() {
            let device = state.call_device();
            if let Err(e) = state.routing.set_mic_mute(device, mute) {
                log::error!("Unable to set call mic mute on {}: {}", device, e);
            }
            if let Some(link) = state.modem.as_mut() {
                let _ = link.set_mic_mute(mute);
            }
        } else if let Some(device) = state.input_device() {
            if let Err(e) = state.routing.set_mic_mute(device, mute) {
                log::error!("Unable to set mic mute on {}: {}", device, e);
            }
        }

        self.shared.mic_mute.store(mute, Ordering::SeqCst);
        log::debug!("Mic {}", if mute { "muted" } else { "unmuted" });
        Ok(())
    }

    /// Put open streams in standby, release the modem link and disable
    /// every direction.
    pub fn shutdown(&self) {
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        if let Some(stream) = &state.output {
            stream.lock().standby();
        }
        if let Some(stream) = &state.input {
            stream.lock().standby();
        }
        if let Some(link) = state.modem.take() {
            link.close();
        }
        state.routing.shutdown();
        state.mode = AudioMode::Normal;
        log::info!("Audio device shut down");
    }
}

fn check_unit(what: &str, value: f32) -> Result<(), RouteError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(RouteError::InvalidArgument(format!("{} {} outside 0.0..=1.0", what, value)))
    }
}
