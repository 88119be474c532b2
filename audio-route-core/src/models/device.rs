use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::RouteError;

/// Bit set on every input device value.
pub const DEVICE_BIT_IN: u32 = 0x8000_0000;
/// Bit marking the "default" pseudo-device of a direction.
pub const DEVICE_BIT_DEFAULT: u32 = 0x4000_0000;

/// Logical audio direction owning a set of devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Output,
    Input,
    Modem,
}

impl Direction {
    pub const ALL: [Direction; 3] = [Direction::Output, Direction::Input, Direction::Modem];

    /// The device whose lists run when the direction is switched on or off.
    pub fn default_device(self) -> DeviceType {
        match self {
            Direction::Output | Direction::Modem => DeviceType::OutDefault,
            Direction::Input => DeviceType::InDefault,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Direction::Output => 0,
            Direction::Input => 1,
            Direction::Modem => 2,
        }
    }

    /// Parse a device `type=` name as it appears under this direction.
    ///
    /// The modem direction shares the output vocabulary.
    pub fn parse_device_name(self, name: &str) -> Option<DeviceType> {
        let candidates: &[DeviceType] = match self {
            Direction::Output | Direction::Modem => &DeviceType::OUTPUTS,
            Direction::Input => &DeviceType::INPUTS,
        };
        candidates.iter().copied().find(|d| d.config_name() == name)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Output => "output",
            Direction::Input => "input",
            Direction::Modem => "modem",
        };
        f.write_str(name)
    }
}

/// Physical audio path identifier.
///
/// Values match the numeric device-type protocol used by the routing
/// parameter (`routing=<n>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceType {
    Earpiece,
    Speaker,
    WiredHeadset,
    WiredHeadphone,
    BtSco,
    BtScoHeadset,
    BtScoCarkit,
    BtA2dp,
    BtA2dpHeadphones,
    BtA2dpSpeaker,
    AuxDigital,
    AnalogDockHeadset,
    DigitalDockHeadset,
    OutDefault,

    Communication,
    Ambient,
    BuiltinMic,
    InBtScoHeadset,
    InWiredHeadset,
    InAuxDigital,
    VoiceCall,
    BackMic,
    InDefault,
}

impl DeviceType {
    pub const OUTPUTS: [DeviceType; 14] = [
        DeviceType::OutDefault,
        DeviceType::Earpiece,
        DeviceType::Speaker,
        DeviceType::WiredHeadset,
        DeviceType::WiredHeadphone,
        DeviceType::BtSco,
        DeviceType::BtScoHeadset,
        DeviceType::BtScoCarkit,
        DeviceType::BtA2dp,
        DeviceType::BtA2dpHeadphones,
        DeviceType::BtA2dpSpeaker,
        DeviceType::AuxDigital,
        DeviceType::AnalogDockHeadset,
        DeviceType::DigitalDockHeadset,
    ];

    pub const INPUTS: [DeviceType; 9] = [
        DeviceType::InDefault,
        DeviceType::Communication,
        DeviceType::Ambient,
        DeviceType::BuiltinMic,
        DeviceType::InBtScoHeadset,
        DeviceType::InWiredHeadset,
        DeviceType::InAuxDigital,
        DeviceType::VoiceCall,
        DeviceType::BackMic,
    ];

    pub fn raw(self) -> u32 {
        match self {
            DeviceType::Earpiece => 0x1,
            DeviceType::Speaker => 0x2,
            DeviceType::WiredHeadset => 0x4,
            DeviceType::WiredHeadphone => 0x8,
            DeviceType::BtSco => 0x10,
            DeviceType::BtScoHeadset => 0x20,
            DeviceType::BtScoCarkit => 0x40,
            DeviceType::BtA2dp => 0x80,
            DeviceType::BtA2dpHeadphones => 0x100,
            DeviceType::BtA2dpSpeaker => 0x200,
            DeviceType::AuxDigital => 0x400,
            DeviceType::AnalogDockHeadset => 0x800,
            DeviceType::DigitalDockHeadset => 0x1000,
            DeviceType::OutDefault => DEVICE_BIT_DEFAULT,

            DeviceType::Communication => DEVICE_BIT_IN | 0x1,
            DeviceType::Ambient => DEVICE_BIT_IN | 0x2,
            DeviceType::BuiltinMic => DEVICE_BIT_IN | 0x4,
            DeviceType::InBtScoHeadset => DEVICE_BIT_IN | 0x8,
            DeviceType::InWiredHeadset => DEVICE_BIT_IN | 0x10,
            DeviceType::InAuxDigital => DEVICE_BIT_IN | 0x20,
            DeviceType::VoiceCall => DEVICE_BIT_IN | 0x40,
            DeviceType::BackMic => DEVICE_BIT_IN | 0x80,
            DeviceType::InDefault => DEVICE_BIT_IN | DEVICE_BIT_DEFAULT,
        }
    }

    /// Exact-value lookup; combined bitmasks are not devices.
    pub fn from_raw(raw: u32) -> Option<DeviceType> {
        Self::OUTPUTS
            .iter()
            .chain(Self::INPUTS.iter())
            .copied()
            .find(|d| d.raw() == raw)
    }

    pub fn is_output(self) -> bool {
        self.raw() & DEVICE_BIT_IN == 0
    }

    pub fn is_input(self) -> bool {
        !self.is_output()
    }

    /// Name used by `<device type="...">` in the routing configuration.
    pub fn config_name(self) -> &'static str {
        match self {
            DeviceType::OutDefault | DeviceType::InDefault => "default",
            DeviceType::Earpiece => "earpiece",
            DeviceType::Speaker => "speaker",
            DeviceType::WiredHeadset | DeviceType::InWiredHeadset => "wired-headset",
            DeviceType::WiredHeadphone => "wired-headphone",
            DeviceType::BtSco => "bt-sco",
            DeviceType::BtScoHeadset | DeviceType::InBtScoHeadset => "bt-sco-headset",
            DeviceType::BtScoCarkit => "bt-sco-carkit",
            DeviceType::BtA2dp => "bt-a2dp",
            DeviceType::BtA2dpHeadphones => "bt-a2dp-headphones",
            DeviceType::BtA2dpSpeaker => "bt-a2dp-speaker",
            DeviceType::AuxDigital | DeviceType::InAuxDigital => "aux-digital",
            DeviceType::AnalogDockHeadset => "analog-dock-headset",
            DeviceType::DigitalDockHeadset => "digital-dock-headset",
            DeviceType::Communication => "communication",
            DeviceType::Ambient => "ambient",
            DeviceType::BuiltinMic => "builtin-mic",
            DeviceType::VoiceCall => "voice-call",
            DeviceType::BackMic => "back-mic",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:x})", self.config_name(), self.raw())
    }
}

/// A route request as received from the parameter protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteTarget {
    /// Device value zero: put the owning stream into standby.
    Standby,
    Device(DeviceType),
}

impl RouteTarget {
    pub fn from_raw(raw: u32) -> Result<Self, RouteError> {
        if raw == 0 {
            return Ok(RouteTarget::Standby);
        }
        DeviceType::from_raw(raw)
            .map(RouteTarget::Device)
            .ok_or_else(|| RouteError::InvalidArgument(format!("unknown device value 0x{raw:x}")))
    }

    pub fn raw(self) -> u32 {
        match self {
            RouteTarget::Standby => 0,
            RouteTarget::Device(device) => device.raw(),
        }
    }

    pub fn device(self) -> Option<DeviceType> {
        match self {
            RouteTarget::Standby => None,
            RouteTarget::Device(device) => Some(device),
        }
    }
}
