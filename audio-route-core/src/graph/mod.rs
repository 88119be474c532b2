pub mod control_graph;
pub mod loader;

pub use control_graph::{ControlGraph, ControlList, ControlSetting, Device, DirectionGraph};
pub use loader::{load_file, load_str};
