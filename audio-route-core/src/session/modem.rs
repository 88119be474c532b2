use crate::models::device::DeviceType;
use crate::models::error::RouteError;
use crate::traits::modem_link::{ModemAudioPath, ModemLink, ModemLinkProvider, SoundType};

/// Modem audio path carrying calls on `device`.
pub fn audio_path_for(device: DeviceType) -> ModemAudioPath {
    match device {
        DeviceType::Earpiece => ModemAudioPath::Handset,
        DeviceType::Speaker => ModemAudioPath::Speaker,
        DeviceType::WiredHeadset => ModemAudioPath::Headset,
        DeviceType::WiredHeadphone => ModemAudioPath::Headphone,
        DeviceType::BtSco | DeviceType::BtScoHeadset | DeviceType::BtScoCarkit => ModemAudioPath::Bluetooth,
        DeviceType::BtA2dp | DeviceType::BtA2dpHeadphones | DeviceType::BtA2dpSpeaker => {
            ModemAudioPath::BluetoothNoNr
        }
        _ => ModemAudioPath::Handset,
    }
}

/// Modem volume class for calls on `device`.
pub fn sound_type_for(device: DeviceType) -> SoundType {
    match device {
        DeviceType::Earpiece => SoundType::Voice,
        DeviceType::Speaker => SoundType::Speaker,
        DeviceType::WiredHeadset | DeviceType::WiredHeadphone => SoundType::Headset,
        DeviceType::BtSco
        | DeviceType::BtScoHeadset
        | DeviceType::BtScoCarkit
        | DeviceType::BtA2dp
        | DeviceType::BtA2dpHeadphones
        | DeviceType::BtA2dpSpeaker => SoundType::BtVoice,
        _ => SoundType::Voice,
    }
}

/// An open modem link for the duration of a call.
///
/// Every request connects the link first if it is not connected yet. A
/// failed connect is logged and the request is skipped without an error,
/// so a missing modem never breaks local audio.
pub struct ModemLinkHandle {
    link: Box<dyn ModemLink>,
    volume_steps: u32,
    current: Option<DeviceType>,
}

impl ModemLinkHandle {
    /// Open a link and, when `device` is given, route the call to it.
    /// A failed route is logged; only a failed open is an error.
    pub fn open(
        provider: &dyn ModemLinkProvider,
        device: Option<DeviceType>,
        volume_steps: u32,
    ) -> Result<Self, RouteError> {
        let link = provider.open().map_err(|reason| {
            log::error!("Unable to open modem link: {}", reason);
            RouteError::ModemLink(reason)
        })?;
        log::debug!("Modem link opened ({} volume steps)", volume_steps);

        let mut handle = Self {
            link,
            volume_steps,
            current: None,
        };
        // A refused route still leaves a usable, connected link.
        if let Some(device) = device {
            if let Err(e) = handle.set_route(device) {
                log::warn!("Modem link opened without a route to {}: {}", device, e);
            }
        }
        Ok(handle)
    }

    pub fn current_device(&self) -> Option<DeviceType> {
        self.current
    }

    fn connect_if_required(&mut self) -> bool {
        if self.link.is_connected() {
            return true;
        }
        match self.link.connect() {
            Ok(()) => true,
            Err(reason) => {
                log::error!("Modem link connect failed: {}", reason);
                false
            }
        }
    }

    fn check(result: Result<(), String>, what: &str) -> Result<(), RouteError> {
        result.map_err(|reason| {
            log::error!("Failed to set modem {}: {}", what, reason);
            RouteError::ModemLink(reason)
        })
    }

    pub fn set_route(&mut self, device: DeviceType) -> Result<(), RouteError> {
        log::debug!("Modem route -> {}", device);
        if !self.connect_if_required() {
            return Ok(());
        }
        self.current = Some(device);
        Self::check(self.link.set_audio_path(audio_path_for(device)), "audio path")
    }

    /// Send `volume` (0.0 to 1.0) as a call volume step.
    pub fn set_voice_volume(&mut self, device: DeviceType, volume: f32) -> Result<(), RouteError> {
        log::debug!("Modem voice volume {} on {}", volume, device);
        if !self.connect_if_required() {
            return Ok(());
        }
        let step = (volume * self.volume_steps as f32) as u32;
        Self::check(self.link.set_call_volume(sound_type_for(device), step), "call volume")
    }

    pub fn set_two_mic(&mut self, enabled: bool) -> Result<(), RouteError> {
        log::debug!("Modem two-mic {}", if enabled { "on" } else { "off" });
        if !self.connect_if_required() {
            return Ok(());
        }
        Self::check(self.link.set_two_mic(enabled), "two-mic")
    }

    /// The modem client has no mute request; the local mixer handles it.
    pub fn set_mic_mute(&mut self, mute: bool) -> Result<(), RouteError> {
        log::debug!("Modem mic mute {} ignored", mute);
        Ok(())
    }

    /// Disconnect and release the link.
    pub fn close(mut self) {
        if let Err(reason) = self.link.disconnect() {
            log::error!("Modem link disconnect failed: {}", reason);
        }
        log::debug!("Modem link closed");
    }
}
