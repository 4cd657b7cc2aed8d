//! Pure fleet-domain state: no sockets, no locks, no OS dependencies.
//!
//! Concurrency is the server's concern: these containers are wrapped in
//! mutexes there and are only ever touched through their accessors.

pub mod inventory;
pub mod record;
pub mod registry;

pub use inventory::PortInventory;
pub use record::{DeviceParams, SensorRecord};
pub use registry::{EdgeRegistry, EdgeStatus};
