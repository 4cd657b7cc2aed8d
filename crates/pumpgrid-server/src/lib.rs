//! # pumpgrid-server
//!
//! The PumpGrid fleet-coordination server: accepts edge devices and
//! dashboard clients over TCP, persists telemetry to SQLite, and pushes
//! reconfiguration commands to nearby devices over a serial radio channel.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ AppState           -- config + locked registry/inventory + shutdown flag
//!  └─ background workers (named OS threads)
//!       ├─ radio-scanner -- rewrites the candidate-port inventory
//!       ├─ edge-listener -- accepts devices, feeds the dispatch queue
//!       └─ web-listener  -- accepts dashboards (loopback only), same queue
//!  └─ Orchestrator       -- drains the queue, one session thread per entry,
//!                           drives the cooperative shutdown sequence
//! ```
//!
//! Every loop observes the shared [`application::state::ShutdownFlag`] at its
//! head; no blocking I/O is ever interrupted forcibly.

pub mod application;
pub mod infrastructure;

pub use application::dispatch::{DispatchEntry, DispatchQueue, Role};
pub use application::orchestrator::{Orchestrator, WorkerSet};
pub use application::state::{AppState, ShutdownFlag};
