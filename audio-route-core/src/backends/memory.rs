//! In-memory hardware doubles.
//!
//! Each backend is a cheap `Clone` over shared state so a test (or the
//! replay tool) can hand one copy to the engine and keep another to
//! inspect what the engine did.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::graph::control_graph::ControlGraph;
use crate::models::error::HardwareError;
use crate::traits::mixer::{ControlInfo, ControlKind, Mixer, MixerSession};
use crate::traits::modem_link::{ModemAudioPath, ModemLink, ModemLinkProvider, SoundType};
use crate::traits::pcm::{PcmBackend, PcmConfig, PcmHandle};

// --- Mixer ---

/// One recorded control write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MixerWrite {
    Value { name: String, index: usize, value: i32 },
    Label { name: String, label: String },
}

#[derive(Debug, Default)]
struct MixerState {
    controls: HashMap<String, ControlInfo>,
    values: HashMap<String, Vec<i32>>,
    labels: HashMap<String, String>,
    writes: Vec<MixerWrite>,
    rejected: HashSet<String>,
    unavailable: bool,
    sessions_opened: usize,
}

/// Control interface with a fixed set of named controls.
#[derive(Debug, Clone, Default)]
pub struct MemoryMixer {
    state: Arc<Mutex<MixerState>>,
}

impl MemoryMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every control named in `graph`.
    ///
    /// Kinds are guessed from the configured values: `on`/`off` is a
    /// switch, numbers and `min-max` ranges are integers, anything else
    /// is an enumeration.
    pub fn from_graph(graph: &ControlGraph) -> Self {
        let mixer = Self::new();
        let settings = [&graph.output, &graph.input, &graph.modem]
            .into_iter()
            .flat_map(|dir| dir.devices.iter())
            .flat_map(|device| device.enable.iter().chain(device.disable.iter()));

        for setting in settings {
            let kind = if setting.value == "on" || setting.value == "off" {
                ControlKind::Boolean
            } else if setting.value.trim().parse::<i32>().is_ok() || setting.value_range().is_some() {
                ControlKind::Integer
            } else {
                ControlKind::Enumerated
            };
            if mixer.control_info(&setting.name).is_none() {
                mixer.add_control(&setting.name, kind, 1);
            }
        }
        mixer
    }

    pub fn add_control(&self, name: &str, kind: ControlKind, value_count: usize) {
        let mut state = self.state.lock();
        state.controls.insert(name.to_string(), ControlInfo { kind, value_count });
        state.values.insert(name.to_string(), vec![0; value_count]);
    }

    pub fn control_info(&self, name: &str) -> Option<ControlInfo> {
        self.state.lock().controls.get(name).copied()
    }

    /// Every write since creation (or the last [`clear_writes`](Self::clear_writes)).
    pub fn writes(&self) -> Vec<MixerWrite> {
        self.state.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().writes.clear();
    }

    /// Current value slots of a numeric control.
    pub fn values(&self, name: &str) -> Option<Vec<i32>> {
        self.state.lock().values.get(name).cloned()
    }

    /// Current label of an enumerated control.
    pub fn label(&self, name: &str) -> Option<String> {
        self.state.lock().labels.get(name).cloned()
    }

    /// Refuse every subsequent write to `name`.
    pub fn reject_writes_to(&self, name: &str) {
        self.state.lock().rejected.insert(name.to_string());
    }

    /// Make [`Mixer::open`] fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.lock().sessions_opened
    }
}

impl Mixer for MemoryMixer {
    fn open(&self, card: u32) -> Result<Box<dyn MixerSession + '_>, String> {
        let mut state = self.state.lock();
        if state.unavailable {
            return Err(format!("card {} has no control device", card));
        }
        state.sessions_opened += 1;
        Ok(Box::new(MemoryMixerSession {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MemoryMixerSession {
    state: Arc<Mutex<MixerState>>,
}

impl MixerSession for MemoryMixerSession {
    fn control(&self, name: &str) -> Option<ControlInfo> {
        self.state.lock().controls.get(name).copied()
    }

    fn set_value(&mut self, name: &str, index: usize, value: i32) -> Result<(), String> {
        let mut state = self.state.lock();
        if state.rejected.contains(name) {
            return Err("write refused".into());
        }
        let slots = state
            .values
            .get_mut(name)
            .ok_or_else(|| format!("no control {}", name))?;
        let slot = slots
            .get_mut(index)
            .ok_or_else(|| format!("index {} out of range", index))?;
        *slot = value;
        state.writes.push(MixerWrite::Value {
            name: name.to_string(),
            index,
            value,
        });
        Ok(())
    }

    fn set_enum_by_label(&mut self, name: &str, label: &str) -> Result<(), String> {
        let mut state = self.state.lock();
        if state.rejected.contains(name) {
            return Err("write refused".into());
        }
        state.labels.insert(name.to_string(), label.to_string());
        state.writes.push(MixerWrite::Label {
            name: name.to_string(),
            label: label.to_string(),
        });
        Ok(())
    }
}

// --- PCM ---

#[derive(Debug, Default)]
struct PcmState {
    opened: Vec<PcmConfig>,
    closed: usize,
    played: Vec<u8>,
    write_sizes: Vec<usize>,
    capture: VecDeque<u8>,
    read_sizes: Vec<usize>,
    open_failure: Option<String>,
    io_failure: Option<String>,
}

/// PCM layer that records playback and serves scripted capture data.
///
/// Capture reads past the end of the script return silence.
#[derive(Debug, Clone, Default)]
pub struct MemoryPcm {
    state: Arc<Mutex<PcmState>>,
}

impl MemoryPcm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw bytes for capture.
    pub fn push_capture(&self, bytes: &[u8]) {
        self.state.lock().capture.extend(bytes.iter().copied());
    }

    /// Queue 16-bit little-endian samples for capture.
    pub fn push_capture_samples(&self, samples: &[i16]) {
        let mut state = self.state.lock();
        for sample in samples {
            state.capture.extend(sample.to_le_bytes());
        }
    }

    /// Configurations of every open, in order.
    pub fn opened(&self) -> Vec<PcmConfig> {
        self.state.lock().opened.clone()
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().opened.len()
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().closed
    }

    /// All bytes written for playback.
    pub fn played(&self) -> Vec<u8> {
        self.state.lock().played.clone()
    }

    /// Played bytes decoded as 16-bit little-endian samples.
    pub fn played_samples(&self) -> Vec<i16> {
        self.state
            .lock()
            .played
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }

    /// Byte length of each write call.
    pub fn write_sizes(&self) -> Vec<usize> {
        self.state.lock().write_sizes.clone()
    }

    /// Byte length of each read call.
    pub fn read_sizes(&self) -> Vec<usize> {
        self.state.lock().read_sizes.clone()
    }

    /// Fail every open with `reason` until cleared with `None`.
    pub fn fail_open(&self, reason: Option<&str>) {
        self.state.lock().open_failure = reason.map(str::to_string);
    }

    /// Fail every read and write with `reason` until cleared with `None`.
    pub fn fail_io(&self, reason: Option<&str>) {
        self.state.lock().io_failure = reason.map(str::to_string);
    }
}

impl PcmBackend for MemoryPcm {
    fn open(&self, config: &PcmConfig) -> Result<Box<dyn PcmHandle>, HardwareError> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.open_failure {
            return Err(HardwareError::Open {
                card: config.card,
                device: config.device,
                reason: reason.clone(),
            });
        }
        state.opened.push(*config);
        Ok(Box::new(MemoryPcmHandle {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MemoryPcmHandle {
    state: Arc<Mutex<PcmState>>,
}

impl PcmHandle for MemoryPcmHandle {
    fn read(&mut self, buffer: &mut [u8]) -> Result<(), HardwareError> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.io_failure {
            return Err(HardwareError::Read(reason.clone()));
        }
        for byte in buffer.iter_mut() {
            *byte = state.capture.pop_front().unwrap_or(0);
        }
        state.read_sizes.push(buffer.len());
        Ok(())
    }

    fn write(&mut self, buffer: &[u8]) -> Result<(), HardwareError> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.io_failure {
            return Err(HardwareError::Write(reason.clone()));
        }
        state.played.extend_from_slice(buffer);
        state.write_sizes.push(buffer.len());
        Ok(())
    }
}

impl Drop for MemoryPcmHandle {
    fn drop(&mut self) {
        self.state.lock().closed += 1;
    }
}

// --- Modem link ---

/// One recorded modem-link call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemCall {
    Connect,
    Disconnect,
    AudioPath(ModemAudioPath),
    CallVolume { sound: SoundType, step: u32 },
    TwoMic(bool),
}

#[derive(Debug, Default)]
struct ModemState {
    connected: bool,
    calls: Vec<ModemCall>,
    links_opened: usize,
    open_failure: Option<String>,
    connect_failure: Option<String>,
    audio_path_failure: Option<String>,
}

/// Modem-link provider recording every call made through its links.
#[derive(Debug, Clone, Default)]
pub struct MemoryModemLink {
    state: Arc<Mutex<ModemState>>,
}

impl MemoryModemLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ModemCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    pub fn links_opened(&self) -> usize {
        self.state.lock().links_opened
    }

    pub fn fail_open(&self, reason: Option<&str>) {
        self.state.lock().open_failure = reason.map(str::to_string);
    }

    pub fn fail_connect(&self, reason: Option<&str>) {
        self.state.lock().connect_failure = reason.map(str::to_string);
    }

    /// Make every audio-path request fail with `reason` (`None` clears it).
    pub fn fail_audio_path(&self, reason: Option<&str>) {
        self.state.lock().audio_path_failure = reason.map(str::to_string);
    }
}

impl ModemLinkProvider for MemoryModemLink {
    fn open(&self) -> Result<Box<dyn ModemLink>, String> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.open_failure {
            return Err(reason.clone());
        }
        state.links_opened += 1;
        Ok(Box::new(MemoryModemConnection {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MemoryModemConnection {
    state: Arc<Mutex<ModemState>>,
}

impl MemoryModemConnection {
    fn record(&mut self, call: ModemCall) -> Result<(), String> {
        self.state.lock().calls.push(call);
        Ok(())
    }
}

impl ModemLink for MemoryModemConnection {
    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn connect(&mut self) -> Result<(), String> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.connect_failure {
            return Err(reason.clone());
        }
        state.connected = true;
        state.calls.push(ModemCall::Connect);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), String> {
        let mut state = self.state.lock();
        state.connected = false;
        state.calls.push(ModemCall::Disconnect);
        Ok(())
    }

    fn set_audio_path(&mut self, path: ModemAudioPath) -> Result<(), String> {
        if let Some(reason) = &self.state.lock().audio_path_failure {
            return Err(reason.clone());
        }
        self.record(ModemCall::AudioPath(path))
    }

    fn set_call_volume(&mut self, sound: SoundType, step: u32) -> Result<(), String> {
        self.record(ModemCall::CallVolume { sound, step })
    }

    fn set_two_mic(&mut self, enabled: bool) -> Result<(), String> {
        self.record(ModemCall::TwoMic(enabled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::load_str;
    use crate::models::format::{PcmFormat, SampleFormat};
    use crate::traits::pcm::PcmDirection;

    #[test]
    fn mixer_guesses_kinds_from_graph() {
        let graph = load_str(
            r#"<tinyalsa-audio><output><device type="speaker"><path type="enable">
                <ctrl name="Switch" value="on"/>
                <ctrl name="Volume" value="0-63"/>
                <ctrl name="Mux" value="SPK"/>
            </path></device></output></tinyalsa-audio>"#,
        )
        .unwrap();
        let mixer = MemoryMixer::from_graph(&graph);

        assert_eq!(mixer.control_info("Switch").unwrap().kind, ControlKind::Boolean);
        assert_eq!(mixer.control_info("Volume").unwrap().kind, ControlKind::Integer);
        assert_eq!(mixer.control_info("Mux").unwrap().kind, ControlKind::Enumerated);
    }

    #[test]
    fn unavailable_mixer_refuses_sessions() {
        let mixer = MemoryMixer::new();
        mixer.set_unavailable(true);
        assert!(mixer.open(0).is_err());
        assert_eq!(mixer.sessions_opened(), 0);
    }

    #[test]
    fn pcm_records_playback_and_closes_on_drop() {
        let pcm = MemoryPcm::new();
        let config = PcmConfig {
            card: 0,
            device: 0,
            direction: PcmDirection::Playback,
            format: PcmFormat::new(44100, 2, SampleFormat::Pcm16),
            period_size: 1024,
            period_count: 4,
        };
        {
            let mut handle = pcm.open(&config).unwrap();
            handle.write(&[1, 0, 2, 0]).unwrap();
        }
        assert_eq!(pcm.played_samples(), vec![1, 2]);
        assert_eq!(pcm.open_count(), 1);
        assert_eq!(pcm.close_count(), 1);
    }

    #[test]
    fn pcm_capture_pads_with_silence() {
        let pcm = MemoryPcm::new();
        pcm.push_capture(&[7, 8]);
        let config = PcmConfig {
            card: 0,
            device: 0,
            direction: PcmDirection::Capture,
            format: PcmFormat::new(8000, 1, SampleFormat::Pcm16),
            period_size: 2,
            period_count: 2,
        };
        let mut handle = pcm.open(&config).unwrap();
        let mut buffer = [0xffu8; 4];
        handle.read(&mut buffer).unwrap();
        assert_eq!(buffer, [7, 8, 0, 0]);
    }

    #[test]
    fn modem_link_records_calls() {
        let modem = MemoryModemLink::new();
        let mut link = modem.open().unwrap();
        link.connect().unwrap();
        link.set_audio_path(ModemAudioPath::Speaker).unwrap();
        link.set_call_volume(SoundType::Speaker, 3).unwrap();

        assert!(modem.is_connected());
        assert_eq!(
            modem.calls(),
            vec![
                ModemCall::Connect,
                ModemCall::AudioPath(ModemAudioPath::Speaker),
                ModemCall::CallVolume { sound: SoundType::Speaker, step: 3 },
            ]
        );
    }
}
