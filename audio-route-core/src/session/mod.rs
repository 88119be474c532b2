pub mod coordinator;
pub mod modem;
pub mod params;

#[cfg(test)]
pub(crate) mod fixture;

pub use coordinator::{Backends, DeviceCoordinator};
pub use modem::ModemLinkHandle;
