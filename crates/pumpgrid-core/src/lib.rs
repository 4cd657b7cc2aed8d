//! # pumpgrid-core
//!
//! Shared library for PumpGrid containing the JSON wire envelope, the typed
//! protocol payloads, and the pure fleet-domain state shared between
//! connection handlers.
//!
//! This crate is used by the coordination server and by any tooling that
//! speaks the edge or web protocol. It has zero dependencies on sockets,
//! serial ports, databases, or threads.
//!
//! - **`protocol`** – How documents travel over the wire. Every request and
//!   response is a single JSON envelope `{Api, Result, Data}`; the typed
//!   payload structs and the closed request enums live here.
//!
//! - **`domain`** – Pure fleet state with no OS dependencies: the edge
//!   registry (device serial → connected flag), the serial-port inventory
//!   rewritten by the scanner, and the telemetry record / per-device
//!   parameter types with their unit conversions.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `pumpgrid_core::Envelope` instead of `pumpgrid_core::protocol::envelope::Envelope`.
pub use domain::inventory::PortInventory;
pub use domain::record::{DeviceParams, SensorRecord};
pub use domain::registry::{EdgeRegistry, EdgeStatus};
pub use protocol::envelope::{Envelope, ProtocolError};
pub use protocol::messages::{EdgeRequest, WebRequest};
