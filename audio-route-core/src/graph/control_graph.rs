use serde::Serialize;

use crate::models::config::DirectionConfig;
use crate::models::device::{DeviceType, Direction};
use crate::models::error::ConfigError;

/// Attribute tag marking the voice-volume control, which is driven by
/// volume calls and never by enable/disable lists.
pub const ATTR_VOICE_VOLUME: &str = "voice-volume";
pub const ATTR_OUTPUT_VOLUME: &str = "output-volume";
pub const ATTR_MASTER_VOLUME: &str = "master-volume";
pub const ATTR_INPUT_GAIN: &str = "input-gain";
pub const ATTR_MIC_MUTE: &str = "mic-mute";

/// One named control with the raw string value to write.
///
/// The value is coerced when applied, according to the kind the live
/// control interface reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlSetting {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,
}

impl ControlSetting {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            attr: None,
        }
    }

    pub fn with_attr(mut self, attr: impl Into<String>) -> Self {
        self.attr = Some(attr.into());
        self
    }

    pub fn has_attr(&self, attr: &str) -> bool {
        self.attr.as_deref() == Some(attr)
    }

    /// Parse a `"min-max"` range value used by volume controls.
    pub fn value_range(&self) -> Option<(i32, i32)> {
        let (min, max) = self.value.split_once('-')?;
        Some((min.trim().parse().ok()?, max.trim().parse().ok()?))
    }
}

/// Ordered control list. Order is significant.
pub type ControlList = Vec<ControlSetting>;

/// A physical path within a direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub device_type: DeviceType,
    pub enable: ControlList,
    pub disable: ControlList,
}

impl Device {
    pub fn new(device_type: DeviceType) -> Self {
        Self {
            device_type,
            enable: Vec::new(),
            disable: Vec::new(),
        }
    }

    /// First control in `list` tagged with `attr`.
    pub fn find_attr<'a>(list: &'a [ControlSetting], attr: &str) -> Option<&'a ControlSetting> {
        list.iter().find(|c| c.has_attr(attr))
    }
}

/// Hardware parameters and device list of one direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectionGraph {
    pub config: DirectionConfig,
    /// In source order. Lookups return the first match, so later
    /// duplicates of a device type are shadowed.
    pub devices: Vec<Device>,
}

impl DirectionGraph {
    pub fn find_device(&self, device_type: DeviceType) -> Option<&Device> {
        self.devices.iter().find(|d| d.device_type == device_type)
    }
}

/// Directions → devices → enable/disable control lists. Built once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ControlGraph {
    pub output: DirectionGraph,
    pub input: DirectionGraph,
    pub modem: DirectionGraph,
}

impl ControlGraph {
    pub fn direction(&self, direction: Direction) -> &DirectionGraph {
        match direction {
            Direction::Output => &self.output,
            Direction::Input => &self.input,
            Direction::Modem => &self.modem,
        }
    }

    pub fn direction_mut(&mut self, direction: Direction) -> &mut DirectionGraph {
        match direction {
            Direction::Output => &mut self.output,
            Direction::Input => &mut self.input,
            Direction::Modem => &mut self.modem,
        }
    }

    pub fn find_device(&self, direction: Direction, device_type: DeviceType) -> Option<&Device> {
        self.direction(direction).find_device(device_type)
    }

    /// Pretty JSON rendering of the whole graph.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Parse(format!("failed to serialize graph: {}", e)))
    }
}
