use std::sync::Arc;

use super::applier;
use crate::graph::control_graph::{
    ControlGraph, ControlSetting, Device, ATTR_INPUT_GAIN, ATTR_MASTER_VOLUME, ATTR_MIC_MUTE,
    ATTR_OUTPUT_VOLUME, ATTR_VOICE_VOLUME,
};
use crate::models::device::{DeviceType, Direction, RouteTarget};
use crate::models::error::{ControlError, RouteError};
use crate::models::state::{RouteOutcome, RoutingState};
use crate::traits::mixer::{Mixer, MixerSession};

/// Per-direction routing state machine driving mixer control lists.
///
/// Every transition opens one mixer session on the direction's card,
/// applies its control lists in order and closes the session again.
/// The engine is not internally synchronized; its owner serializes
/// access (the device coordinator keeps it under the device lock).
pub struct RoutingEngine {
    graph: Arc<ControlGraph>,
    mixer: Arc<dyn Mixer>,
    states: [RoutingState; 3],
}

impl RoutingEngine {
    pub fn new(graph: Arc<ControlGraph>, mixer: Arc<dyn Mixer>) -> Self {
        Self {
            graph,
            mixer,
            states: [RoutingState::Disabled; 3],
        }
    }

    pub fn graph(&self) -> &ControlGraph {
        &self.graph
    }

    pub fn state(&self, direction: Direction) -> RoutingState {
        self.states[direction.index()]
    }

    pub fn is_enabled(&self, direction: Direction) -> bool {
        self.state(direction).is_enabled()
    }

    pub fn current_device(&self, direction: Direction) -> Option<DeviceType> {
        self.state(direction).current_device()
    }

    fn open_session<'m>(mixer: &'m dyn Mixer, card: u32) -> Result<Box<dyn MixerSession + 'm>, ControlError> {
        mixer.open(card).map_err(|reason| {
            log::error!("Unable to open mixer for card {}: {}", card, reason);
            ControlError::MixerUnavailable { card, reason }
        })
    }

    /// Switch a direction on or off.
    ///
    /// Switching on runs the default device's enable list and makes the
    /// default device current. Switching off runs the current device's
    /// disable list and then the default device's disable list. Repeating
    /// the current state writes nothing.
    pub fn set_enabled(&mut self, direction: Direction, enabled: bool) -> Result<RouteOutcome, RouteError> {
        let state = self.state(direction);
        if state.is_enabled() == enabled {
            log::debug!("{} direction already {}", direction, if enabled { "enabled" } else { "disabled" });
            return Ok(RouteOutcome::Unchanged);
        }

        let graph = Arc::clone(&self.graph);
        let mixer = Arc::clone(&self.mixer);
        let dir_graph = graph.direction(direction);
        let default = dir_graph.find_device(direction.default_device());
        if default.is_none() {
            log::debug!("No default device for {} direction", direction);
        }

        let mut session = Self::open_session(mixer.as_ref(), dir_graph.config.card)?;
        let slot = direction.index();

        if enabled {
            if let Some(device) = default {
                applier::apply_list(session.as_mut(), &device.enable)?;
            }
            self.states[slot] = RoutingState::Enabled {
                current: default.map(|d| d.device_type),
            };
            log::debug!("{} direction enabled", direction);
            return Ok(RouteOutcome::Applied);
        }

        if let Some(current) = state.current_device().and_then(|d| dir_graph.find_device(d)) {
            if let Err(e) = applier::apply_list(session.as_mut(), &current.disable) {
                log::error!("Unable to disable current {} device {}", direction, current.device_type);
                self.states[slot] = RoutingState::Enabled { current: None };
                return Err(e.into());
            }
        }
        // The default device's disable list also runs when it was current.
        if let Some(device) = default {
            if let Err(e) = applier::apply_list(session.as_mut(), &device.disable) {
                log::error!("Unable to disable default {} device", direction);
                self.states[slot] = RoutingState::Enabled { current: None };
                return Err(e.into());
            }
        }

        self.states[slot] = RoutingState::Disabled;
        log::debug!("{} direction disabled", direction);
        Ok(RouteOutcome::Applied)
    }

    /// Make `device_type` the current device of an enabled direction.
    ///
    /// Nothing is written while the direction is disabled or when the
    /// device is already current. The new device only becomes current
    /// once its enable list fully succeeds.
    pub fn set_device(&mut self, direction: Direction, device_type: DeviceType) -> Result<RouteOutcome, RouteError> {
        let state = self.state(direction);
        if !state.is_enabled() {
            log::debug!("{} direction disabled, deferring route to {}", direction, device_type);
            return Ok(RouteOutcome::Deferred);
        }

        let graph = Arc::clone(&self.graph);
        let mixer = Arc::clone(&self.mixer);
        let dir_graph = graph.direction(direction);
        let device = dir_graph.find_device(device_type).ok_or_else(|| {
            log::error!("Unable to find a matching {} device: {}", direction, device_type);
            RouteError::DeviceNotFound {
                direction,
                device: device_type,
            }
        })?;

        if state.current_device() == Some(device_type) {
            return Ok(RouteOutcome::Unchanged);
        }

        let mut session = Self::open_session(mixer.as_ref(), dir_graph.config.card)?;
        let slot = direction.index();
        let previous = state.current_device().and_then(|d| dir_graph.find_device(d));
        self.states[slot] = RoutingState::Enabled { current: None };

        if let Some(previous) = previous {
            if let Err(e) = applier::apply_list(session.as_mut(), &previous.disable) {
                log::error!("Unable to disable {} device {}", direction, previous.device_type);
                return Err(e.into());
            }
        }
        if let Err(e) = applier::apply_list(session.as_mut(), &device.enable) {
            log::error!("Unable to enable {} device {}", direction, device_type);
            return Err(e.into());
        }

        self.states[slot] = RoutingState::Enabled {
            current: Some(device_type),
        };
        log::debug!("{} routed to {}", direction, device_type);
        Ok(RouteOutcome::Applied)
    }

    /// Fan a route request out to every direction that carries it.
    ///
    /// Output devices go to the output and modem directions, input
    /// devices to the input direction; disabled directions are skipped.
    /// The first failure stops the fan-out.
    pub fn route(&mut self, target: RouteTarget) -> Result<RouteOutcome, RouteError> {
        let device = match target {
            RouteTarget::Standby => return Ok(RouteOutcome::StandbyRequested),
            RouteTarget::Device(device) => device,
        };

        let directions: &[Direction] = if device.is_output() {
            &[Direction::Output, Direction::Modem]
        } else {
            &[Direction::Input]
        };

        let mut outcome = RouteOutcome::Deferred;
        for &direction in directions {
            if !self.is_enabled(direction) {
                continue;
            }
            match self.set_device(direction, device)? {
                RouteOutcome::Applied => outcome = RouteOutcome::Applied,
                RouteOutcome::Unchanged if outcome == RouteOutcome::Deferred => {
                    outcome = RouteOutcome::Unchanged
                }
                _ => {}
            }
        }
        Ok(outcome)
    }

    fn tagged_device(&self, direction: Direction, device_type: DeviceType) -> Result<&Device, RouteError> {
        if !self.is_enabled(direction) {
            log::error!("Unable to set {} controls: direction disabled", direction);
            return Err(RouteError::DirectionDisabled(direction));
        }
        self.graph
            .find_device(direction, device_type)
            .ok_or(RouteError::DeviceNotFound {
                direction,
                device: device_type,
            })
    }

    /// Scale the `"min-max"` range of the enable-list control tagged
    /// `attr` by `volume` (0.0 to 1.0) and write the result.
    pub fn set_volume_with_attr(
        &self,
        direction: Direction,
        device_type: DeviceType,
        attr: &str,
        volume: f32,
    ) -> Result<(), RouteError> {
        let device = self.tagged_device(direction, device_type)?;
        let control = Device::find_attr(&device.enable, attr).ok_or_else(|| {
            RouteError::InvalidArgument(format!("no control tagged {} on {} {}", attr, direction, device_type))
        })?;
        let (min, max) = control.value_range().ok_or_else(|| ControlError::InvalidValue {
            name: control.name.clone(),
            value: control.value.clone(),
        })?;

        let value = ((max - min) as f32 * volume + min as f32) as i32;
        log::debug!("{} {} {} = {} (volume {})", direction, device_type, attr, value, volume);

        let scaled = ControlSetting {
            value: value.to_string(),
            ..control.clone()
        };
        let mut session = Self::open_session(self.mixer.as_ref(), self.graph.direction(direction).config.card)?;
        applier::apply(session.as_mut(), &scaled).map_err(|e| {
            log::error!("Unable to set {} control: {}", attr, e);
            RouteError::from(e)
        })
    }

    /// Apply the control tagged `attr` from the enable list (`on`) or
    /// the disable list (`!on`).
    pub fn set_state_with_attr(
        &self,
        direction: Direction,
        device_type: DeviceType,
        attr: &str,
        on: bool,
    ) -> Result<(), RouteError> {
        let device = self.tagged_device(direction, device_type)?;
        let list = if on { &device.enable } else { &device.disable };
        let control = Device::find_attr(list, attr).ok_or_else(|| {
            RouteError::InvalidArgument(format!("no control tagged {} on {} {}", attr, direction, device_type))
        })?;

        let mut session = Self::open_session(self.mixer.as_ref(), self.graph.direction(direction).config.card)?;
        applier::apply(session.as_mut(), control).map_err(|e| {
            log::error!("Unable to set {} control: {}", attr, e);
            RouteError::from(e)
        })
    }

    pub fn set_output_volume(&self, device: DeviceType, volume: f32) -> Result<(), RouteError> {
        self.set_volume_with_attr(Direction::Output, device, ATTR_OUTPUT_VOLUME, volume)
    }

    pub fn set_master_volume(&self, volume: f32) -> Result<(), RouteError> {
        self.set_volume_with_attr(Direction::Output, DeviceType::OutDefault, ATTR_MASTER_VOLUME, volume)
    }

    pub fn set_input_gain(&self, device: DeviceType, gain: f32) -> Result<(), RouteError> {
        self.set_volume_with_attr(Direction::Input, device, ATTR_INPUT_GAIN, gain)
    }

    pub fn set_voice_volume(&self, device: DeviceType, volume: f32) -> Result<(), RouteError> {
        self.set_volume_with_attr(Direction::Modem, device, ATTR_VOICE_VOLUME, volume)
    }

    /// Mute through the input direction for input devices and through
    /// the modem direction for output (call) devices.
    pub fn set_mic_mute(&self, device: DeviceType, mute: bool) -> Result<(), RouteError> {
        let direction = if device.is_input() { Direction::Input } else { Direction::Modem };
        self.set_state_with_attr(direction, device, ATTR_MIC_MUTE, mute)
    }

    /// Disable every direction, logging failures.
    pub fn shutdown(&mut self) {
        for direction in Direction::ALL {
            if let Err(e) = self.set_enabled(direction, false) {
                log::error!("Failed to disable {} direction on shutdown: {}", direction, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::{MemoryMixer, MixerWrite};
    use crate::graph::load_str;
    use crate::traits::mixer::ControlKind;

    const CONFIG: &str = r#"
<tinyalsa-audio>
  <output card="0">
    <device type="default">
      <path type="enable">
        <ctrl name="Out Master" value="on"/>
        <ctrl name="Master Volume" value="0-100" attr="master-volume"/>
      </path>
      <path type="disable"><ctrl name="Out Master" value="off"/></path>
    </device>
    <device type="speaker">
      <path type="enable">
        <ctrl name="SPK" value="on"/>
        <ctrl name="SPK Volume" value="10-50" attr="output-volume"/>
      </path>
      <path type="disable"><ctrl name="SPK" value="off"/></path>
    </device>
    <device type="earpiece">
      <path type="enable"><ctrl name="RCV" value="on"/></path>
      <path type="disable"><ctrl name="RCV" value="off"/></path>
    </device>
    <device type="wired-headset">
      <path type="enable">
        <ctrl name="HP" value="on"/>
        <ctrl name="HP Missing" value="on"/>
      </path>
    </device>
  </output>
  <input card="0">
    <device type="builtin-mic">
      <path type="enable">
        <ctrl name="MIC" value="on"/>
        <ctrl name="MIC Mute" value="on" attr="mic-mute"/>
      </path>
      <path type="disable"><ctrl name="MIC Mute" value="off" attr="mic-mute"/></path>
    </device>
  </input>
  <modem card="1">
    <device type="earpiece">
      <path type="enable">
        <ctrl name="Voice RCV" value="on"/>
        <ctrl name="Voice Volume" value="0-5" attr="voice-volume"/>
      </path>
      <path type="disable"><ctrl name="Voice RCV" value="off"/></path>
    </device>
  </modem>
</tinyalsa-audio>"#;

    fn engine() -> (RoutingEngine, MemoryMixer) {
        let graph = Arc::new(load_str(CONFIG).unwrap());
        let mixer = MemoryMixer::from_graph(&graph);
        let engine = RoutingEngine::new(graph, Arc::new(mixer.clone()));
        (engine, mixer)
    }

    fn value(name: &str, value: i32) -> MixerWrite {
        MixerWrite::Value {
            name: name.into(),
            index: 0,
            value,
        }
    }

    #[test]
    fn enable_runs_default_list_and_makes_it_current() {
        let (mut engine, mixer) = engine();
        assert_eq!(engine.set_enabled(Direction::Output, true).unwrap(), RouteOutcome::Applied);
        assert_eq!(
            engine.state(Direction::Output),
            RoutingState::Enabled {
                current: Some(DeviceType::OutDefault)
            }
        );
        assert_eq!(mixer.writes(), vec![value("Out Master", 1), value("Master Volume", 0)]);
    }

    #[test]
    fn enabling_twice_applies_enable_list_once() {
        let (mut engine, mixer) = engine();
        engine.set_enabled(Direction::Output, true).unwrap();
        let writes = mixer.writes().len();
        assert_eq!(engine.set_enabled(Direction::Output, true).unwrap(), RouteOutcome::Unchanged);
        assert_eq!(mixer.writes().len(), writes);
    }

    #[test]
    fn enable_without_default_device_has_no_current() {
        let (mut engine, mixer) = engine();
        engine.set_enabled(Direction::Input, true).unwrap();
        assert_eq!(engine.state(Direction::Input), RoutingState::Enabled { current: None });
        assert!(mixer.writes().is_empty());
    }

    #[test]
    fn disable_runs_current_then_default_disable_lists() {
        let (mut engine, mixer) = engine();
        engine.set_enabled(Direction::Output, true).unwrap();
        engine.set_device(Direction::Output, DeviceType::Speaker).unwrap();
        mixer.clear_writes();

        engine.set_enabled(Direction::Output, false).unwrap();
        assert_eq!(engine.state(Direction::Output), RoutingState::Disabled);
        assert_eq!(mixer.writes(), vec![value("SPK", 0), value("Out Master", 0)]);
    }

    #[test]
    fn disable_then_enable_restores_default() {
        let (mut engine, _mixer) = engine();
        for direction in Direction::ALL {
            engine.set_enabled(direction, true).unwrap();
            engine.set_enabled(direction, false).unwrap();
            assert_eq!(engine.current_device(direction), None);
            engine.set_enabled(direction, true).unwrap();
            let expected = engine
                .graph()
                .find_device(direction, direction.default_device())
                .map(|d| d.device_type);
            assert_eq!(engine.state(direction), RoutingState::Enabled { current: expected });
        }
    }

    #[test]
    fn same_device_issues_no_writes() {
        let (mut engine, mixer) = engine();
        engine.set_enabled(Direction::Output, true).unwrap();
        engine.set_device(Direction::Output, DeviceType::Speaker).unwrap();
        mixer.clear_writes();
        let sessions = mixer.sessions_opened();

        assert_eq!(
            engine.set_device(Direction::Output, DeviceType::Speaker).unwrap(),
            RouteOutcome::Unchanged
        );
        assert!(mixer.writes().is_empty());
        assert_eq!(mixer.sessions_opened(), sessions);
    }

    #[test]
    fn switching_devices_disables_old_then_enables_new() {
        let (mut engine, mixer) = engine();
        engine.set_enabled(Direction::Output, true).unwrap();
        engine.set_device(Direction::Output, DeviceType::Speaker).unwrap();
        mixer.clear_writes();

        engine.set_device(Direction::Output, DeviceType::Earpiece).unwrap();
        assert_eq!(mixer.writes(), vec![value("SPK", 0), value("RCV", 1)]);
        assert_eq!(engine.current_device(Direction::Output), Some(DeviceType::Earpiece));
    }

    #[test]
    fn disabled_direction_defers_routes() {
        let (mut engine, mixer) = engine();
        assert_eq!(
            engine.set_device(Direction::Output, DeviceType::Speaker).unwrap(),
            RouteOutcome::Deferred
        );
        assert_eq!(engine.state(Direction::Output), RoutingState::Disabled);
        assert!(mixer.writes().is_empty());
    }

    #[test]
    fn unknown_device_is_not_found() {
        let (mut engine, _mixer) = engine();
        engine.set_enabled(Direction::Output, true).unwrap();
        let err = engine.set_device(Direction::Output, DeviceType::BtA2dp).unwrap_err();
        assert_eq!(
            err,
            RouteError::DeviceNotFound {
                direction: Direction::Output,
                device: DeviceType::BtA2dp
            }
        );
        assert_eq!(engine.current_device(Direction::Output), Some(DeviceType::OutDefault));
    }

    #[test]
    fn failed_enable_keeps_partial_writes_and_no_current() {
        let graph = Arc::new(load_str(CONFIG).unwrap());
        // "HP Missing" is deliberately absent from this mixer.
        let mixer = MemoryMixer::new();
        for name in ["Out Master", "RCV", "HP"] {
            mixer.add_control(name, ControlKind::Boolean, 1);
        }
        mixer.add_control("Master Volume", ControlKind::Integer, 1);
        let mut engine = RoutingEngine::new(graph, Arc::new(mixer.clone()));

        engine.set_enabled(Direction::Output, true).unwrap();
        engine.set_device(Direction::Output, DeviceType::Earpiece).unwrap();
        mixer.clear_writes();

        let err = engine.set_device(Direction::Output, DeviceType::WiredHeadset).unwrap_err();
        assert_eq!(err, RouteError::Control(ControlError::Unresolvable("HP Missing".into())));
        assert_eq!(mixer.writes(), vec![value("RCV", 0), value("HP", 1)]);
        assert_eq!(engine.state(Direction::Output), RoutingState::Enabled { current: None });
    }

    #[test]
    fn output_route_fans_out_to_modem() {
        let (mut engine, mixer) = engine();
        engine.set_enabled(Direction::Output, true).unwrap();
        engine.set_enabled(Direction::Modem, true).unwrap();
        mixer.clear_writes();

        let outcome = engine.route(RouteTarget::Device(DeviceType::Earpiece)).unwrap();
        assert_eq!(outcome, RouteOutcome::Applied);
        assert_eq!(engine.current_device(Direction::Output), Some(DeviceType::Earpiece));
        assert_eq!(engine.current_device(Direction::Modem), Some(DeviceType::Earpiece));
        // The voice volume control is never part of a route change.
        assert_eq!(
            mixer.writes(),
            vec![value("Out Master", 0), value("RCV", 1), value("Voice RCV", 1)]
        );
    }

    #[test]
    fn standby_target_touches_nothing() {
        let (mut engine, mixer) = engine();
        engine.set_enabled(Direction::Output, true).unwrap();
        mixer.clear_writes();
        assert_eq!(engine.route(RouteTarget::Standby).unwrap(), RouteOutcome::StandbyRequested);
        assert!(mixer.writes().is_empty());
    }

    #[test]
    fn volume_scales_tagged_range() {
        let (mut engine, mixer) = engine();
        engine.set_enabled(Direction::Output, true).unwrap();
        mixer.clear_writes();

        engine.set_output_volume(DeviceType::Speaker, 0.5).unwrap();
        engine.set_master_volume(1.0).unwrap();
        assert_eq!(mixer.writes(), vec![value("SPK Volume", 30), value("Master Volume", 100)]);
    }

    #[test]
    fn volume_requires_enabled_direction() {
        let (engine, _mixer) = engine();
        assert_eq!(
            engine.set_voice_volume(DeviceType::Earpiece, 0.5),
            Err(RouteError::DirectionDisabled(Direction::Modem))
        );
    }

    #[test]
    fn mic_mute_picks_list_by_state() {
        let (mut engine, mixer) = engine();
        engine.set_enabled(Direction::Input, true).unwrap();

        engine.set_mic_mute(DeviceType::BuiltinMic, true).unwrap();
        engine.set_mic_mute(DeviceType::BuiltinMic, false).unwrap();
        assert_eq!(mixer.writes(), vec![value("MIC Mute", 1), value("MIC Mute", 0)]);
    }

    #[test]
    fn shutdown_disables_everything() {
        let (mut engine, _mixer) = engine();
        for direction in Direction::ALL {
            engine.set_enabled(direction, true).unwrap();
        }
        engine.shutdown();
        for direction in Direction::ALL {
            assert_eq!(engine.state(direction), RoutingState::Disabled);
        }
    }
}
