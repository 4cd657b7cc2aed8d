//! Background discovery of candidate radio ports.
//!
//! The scanner enumerates attached serial devices, keeps those whose
//! hardware ID matches the configured filter, and rewrites the shared
//! inventory wholesale on every pass. It has no failure mode that stops the
//! loop: an enumeration error just reads as an empty port list. Pacing
//! comes from the OS enumeration cost itself, matching how fast devices can
//! actually appear and vanish.

use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;

use serialport::{SerialPortInfo, SerialPortType};
use tracing::info;

use crate::application::state::AppState;

/// Spawns the scan loop on its own named thread.
///
/// # Errors
///
/// Returns the OS error if the thread cannot be spawned.
pub fn spawn_scanner(state: Arc<AppState>) -> io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("radio-scanner".to_string())
        .spawn(move || scan_loop(&state))
}

/// Runs until the shutdown flag is set.
fn scan_loop(state: &AppState) {
    let filter = state.config.radio.hardware_id.clone();
    info!(%filter, "radio scanner started");

    while !state.shutdown.is_set() {
        let candidates = enumerate_candidates(&filter);
        state.ports.lock().replace_all(candidates);
    }

    info!("radio scanner stopped");
}

/// Enumerates attached ports whose hardware ID contains `filter`.
pub fn enumerate_candidates(filter: &str) -> Vec<String> {
    serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .filter(|info| hardware_id(info).contains(filter))
        .map(|info| info.port_name)
        .collect()
}

/// Renders a port's hardware identity the way USB device filters are
/// written, e.g. `USB VID:PID=2341:1002`.
fn hardware_id(info: &SerialPortInfo) -> String {
    match &info.port_type {
        SerialPortType::UsbPort(usb) => {
            format!("USB VID:PID={:04X}:{:04X}", usb.vid, usb.pid)
        }
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::BluetoothPort => "BTH".to_string(),
        SerialPortType::Unknown => "n/a".to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
