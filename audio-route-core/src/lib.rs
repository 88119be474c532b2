//! # audio-route-core
//!
//! Hardware-agnostic audio routing core.
//!
//! Drives mixer controls from a declarative routing configuration, tracks
//! per-direction routing state, converts PCM between client and hardware
//! formats, and coordinates playback, capture and voice-call paths.
//! Platform backends implement the `Mixer`, `PcmBackend` and
//! `ModemLinkProvider` traits and plug into the `DeviceCoordinator`.
//!
//! ## Architecture
//!
//! ```text
//! audio-route-core (this crate)
//! ├── traits/       ← Mixer, PcmBackend, ModemLinkProvider, BufferProvider
//! ├── models/       ← RouteError, DeviceType, RoutingState, EngineConfig, PcmFormat
//! ├── graph/        ← ControlGraph, XML configuration loader
//! ├── routing/      ← mixer control applier, RoutingEngine state machine
//! ├── processing/   ← sample codecs, downmix, linear resampler, stream pipelines
//! ├── stream/       ← OutputStream, InputStream
//! ├── session/      ← DeviceCoordinator, parameter strings, modem link
//! └── backends/     ← in-memory mixer, PCM and modem link
//! ```

pub mod backends;
pub mod graph;
pub mod models;
pub mod processing;
pub mod routing;
pub mod session;
pub mod stream;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use graph::{load_file, load_str, ControlGraph, ControlSetting, Device};
pub use models::config::{EngineConfig, HardwareParams, StreamConfig};
pub use models::device::{DeviceType, Direction, RouteTarget};
pub use models::error::{ConfigError, ControlError, HardwareError, RouteError};
pub use models::format::{PcmFormat, SampleFormat};
pub use models::state::{AudioMode, RouteOutcome, RoutingState};
pub use processing::pipeline::{InputPipeline, OutputPipeline};
pub use routing::engine::RoutingEngine;
pub use session::coordinator::{Backends, DeviceCoordinator};
pub use stream::{InputStream, OutputStream};
pub use traits::mixer::{ControlInfo, ControlKind, Mixer, MixerSession};
pub use traits::modem_link::{ModemAudioPath, ModemLink, ModemLinkProvider, SoundType};
pub use traits::pcm::{PcmBackend, PcmConfig, PcmDirection, PcmHandle};
