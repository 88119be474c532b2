/// Audio path selector understood by the modem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemAudioPath {
    Handset,
    Headset,
    Speaker,
    Bluetooth,
    BluetoothNoNr,
    Headphone,
}

/// Volume class understood by the modem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundType {
    Voice,
    Speaker,
    Headset,
    BtVoice,
}

/// Connection to the voice modem's audio control channel.
///
/// Calls return the modem client's failure reason on error.
pub trait ModemLink: Send {
    fn is_connected(&self) -> bool;
    fn connect(&mut self) -> Result<(), String>;
    fn disconnect(&mut self) -> Result<(), String>;
    fn set_audio_path(&mut self, path: ModemAudioPath) -> Result<(), String>;
    fn set_call_volume(&mut self, sound: SoundType, step: u32) -> Result<(), String>;
    fn set_two_mic(&mut self, enabled: bool) -> Result<(), String>;
}

/// Source of modem links. Absence of a provider is not fatal: calls
/// simply run without the modem being told about route or volume.
pub trait ModemLinkProvider: Send + Sync {
    fn open(&self) -> Result<Box<dyn ModemLink>, String>;
}
