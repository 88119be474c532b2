pub mod applier;
pub mod engine;

pub use applier::{apply, apply_list, ControlValue};
pub use engine::RoutingEngine;
