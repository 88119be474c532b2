//! Coordinator wired to the in-memory backends, shared by unit tests.

use std::sync::Arc;

use super::coordinator::{Backends, DeviceCoordinator};
use crate::backends::memory::{MemoryMixer, MemoryModemLink, MemoryPcm};
use crate::graph::load_str;
use crate::models::config::EngineConfig;

pub(crate) const CONFIG: &str = r#"
<tinyalsa-audio device="test-board">
  <output card="0" device="0" rate="44100" channels="2" format="PCM_16" period_size="1024" period_count="4">
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
  </output>
  <input card="0" device="0" rate="44100" channels="2" period_size="512" period_count="2">
    <device type="builtin-mic">
      <path type="enable">
        <ctrl name="MIC" value="on"/>
        <ctrl name="MIC Gain" value="0-31" attr="input-gain"/>
        <ctrl name="MIC Mute" value="on" attr="mic-mute"/>
      </path>
      <path type="disable">
        <ctrl name="MIC" value="off"/>
        <ctrl name="MIC Mute" value="off" attr="mic-mute"/>
      </path>
    </device>
  </input>
  <modem card="1" device="1">
    <device type="default">
      <path type="enable"><ctrl name="Voice Main" value="on"/></path>
      <path type="disable"><ctrl name="Voice Main" value="off"/></path>
    </device>
    <device type="earpiece">
      <path type="enable">
        <ctrl name="Voice RCV" value="on"/>
        <ctrl name="Voice Volume" value="0-5" attr="voice-volume"/>
        <ctrl name="Voice Mic Mute" value="on" attr="mic-mute"/>
      </path>
      <path type="disable">
        <ctrl name="Voice RCV" value="off"/>
        <ctrl name="Voice Mic Mute" value="off" attr="mic-mute"/>
      </path>
    </device>
    <device type="speaker">
      <path type="enable"><ctrl name="Voice SPK" value="on"/></path>
      <path type="disable"><ctrl name="Voice SPK" value="off"/></path>
    </device>
  </modem>
</tinyalsa-audio>"#;

pub(crate) struct Fixture {
    pub(crate) coordinator: DeviceCoordinator,
    pub(crate) mixer: MemoryMixer,
    pub(crate) pcm: MemoryPcm,
    pub(crate) modem: MemoryModemLink,
}

pub(crate) fn fixture() -> Fixture {
    let graph = load_str(CONFIG).unwrap();
    let mixer = MemoryMixer::from_graph(&graph);
    let pcm = MemoryPcm::new();
    let modem = MemoryModemLink::new();
    let coordinator = DeviceCoordinator::with_graph(
        graph,
        EngineConfig::default(),
        Backends {
            mixer: Arc::new(mixer.clone()),
            pcm: Arc::new(pcm.clone()),
            modem: Some(Arc::new(modem.clone())),
        },
    )
    .unwrap();
    Fixture {
        coordinator,
        mixer,
        pcm,
        modem,
    }
}
