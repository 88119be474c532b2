use super::device::DeviceType;

/// Per-direction routing state.
///
/// ```text
/// Disabled ──set_enabled(true)──▶ Enabled(default | none)
///    ▲                                 │ set_device(D)
///    └──────set_enabled(false)──── Enabled(D)
/// ```
///
/// A current device only exists while the direction is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutingState {
    #[default]
    Disabled,
    Enabled { current: Option<DeviceType> },
}

impl RoutingState {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled { .. })
    }

    pub fn current_device(&self) -> Option<DeviceType> {
        match self {
            Self::Enabled { current } => *current,
            Self::Disabled => None,
        }
    }
}

/// What a route request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Control lists ran and the device is now current.
    Applied,
    /// The device was already current; nothing was written.
    Unchanged,
    /// The direction is disabled; nothing was written.
    Deferred,
    /// Device value zero: the owning stream must enter standby.
    StandbyRequested,
}

/// Telephony mode of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioMode {
    #[default]
    Normal,
    Ringtone,
    InCall,
    InCommunication,
}

impl AudioMode {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Normal),
            1 => Some(Self::Ringtone),
            2 => Some(Self::InCall),
            3 => Some(Self::InCommunication),
            _ => None,
        }
    }

    pub fn is_in_call(&self) -> bool {
        matches!(self, Self::InCall)
    }
}
