/// Kind of a mixer control as reported by the control interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Boolean,
    Integer,
    Byte,
    Enumerated,
    /// The interface could not classify the control; written by label.
    Unknown,
}

/// Static description of a resolved control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlInfo {
    pub kind: ControlKind,
    /// Number of value slots (e.g. 2 for a stereo volume).
    pub value_count: usize,
}

/// Audio-control interface of the sound hardware.
///
/// Implemented by:
/// - `MemoryMixer` (in-memory, tests and replay tool)
/// - platform backends bound to the kernel control device
pub trait Mixer: Send + Sync {
    /// Open a control session on `card`. Every control list is applied
    /// within a single session, in order.
    fn open(&self, card: u32) -> Result<Box<dyn MixerSession + '_>, String>;
}

/// One open session on a card's control interface. Closed on drop.
pub trait MixerSession {
    /// Resolve a control by name.
    fn control(&self, name: &str) -> Option<ControlInfo>;

    /// Write an integer value to one value slot.
    fn set_value(&mut self, name: &str, index: usize, value: i32) -> Result<(), String>;

    /// Select an enumerated value by its label.
    fn set_enum_by_label(&mut self, name: &str, label: &str) -> Result<(), String>;
}
