//! Per-connection session for one dashboard client.
//!
//! Single-shot: one request is served, then the connection lingers briefly
//! so the reply drains, and closes. Two operations with deliberately
//! different radio fallback policies:
//!
//! - `get_edges` is best-effort: a port that fails to probe is logged and
//!   skipped, never aborting the aggregation;
//! - `reset_wifi` is fail-fast: the first port that fails marks the whole
//!   broadcast failed and the remaining ports are not attempted.

use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use pumpgrid_core::protocol::messages::{
    FleetClientEntry, FleetPayload, ResetCommand, ResetWifiPayload,
};
use pumpgrid_core::{Envelope, ProtocolError, WebRequest};

use crate::application::state::AppState;
use crate::infrastructure::network::{read_envelope, ReadOutcome};
use crate::infrastructure::radio::link::RadioLink;

/// One dashboard connection.
pub struct WebSession {
    stream: TcpStream,
    peer: SocketAddr,
    session_id: Uuid,
    state: Arc<AppState>,
    radio: Arc<dyn RadioLink>,
}

impl WebSession {
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        state: Arc<AppState>,
        radio: Arc<dyn RadioLink>,
    ) -> Self {
        let session_id = Uuid::new_v4();
        info!(%peer, %session_id, "web client connected");
        Self {
            stream,
            peer,
            session_id,
            state,
            radio,
        }
    }

    /// Serves the single request, lingers so the reply flushes, closes.
    pub fn run(mut self) {
        self.serve_once();
        std::thread::sleep(self.state.config.server.web_linger());
        self.close();
    }

    fn serve_once(&mut self) {
        let request = match read_envelope(&mut self.stream, self.state.config.server.max_bufsize) {
            ReadOutcome::Request(envelope) => envelope,
            ReadOutcome::Idle => {
                warn!(
                    peer = %self.peer,
                    session_id = %self.session_id,
                    "web client sent nothing within the receive window"
                );
                return;
            }
            ReadOutcome::Closed(reason) => {
                warn!(
                    peer = %self.peer,
                    session_id = %self.session_id,
                    "web client disconnected unexpectedly: {reason}"
                );
                return;
            }
        };

        let reply = self.dispatch(request);

        if let Err(e) = self.stream.write_all(&reply.to_bytes()) {
            warn!(
                peer = %self.peer,
                session_id = %self.session_id,
                "failed to send reply to web client: {e}"
            );
        }
    }

    fn dispatch(&self, request: Envelope) -> Envelope {
        let classified = match WebRequest::from_envelope(&request) {
            Ok(classified) => classified,
            Err(e) => {
                warn!(session_id = %self.session_id, "unable to handle web client request: {e}");
                return Envelope::failure();
            }
        };

        match classified {
            WebRequest::GetEdges => match self.get_edges() {
                Ok(data) => Envelope::success(data),
                Err(e) => {
                    warn!(session_id = %self.session_id, "unable to handle web client request: {e}");
                    Envelope::failure()
                }
            },
            WebRequest::ResetWifi(payload) => {
                if self.reset_wifi(payload) {
                    Envelope::success(json!({}))
                } else {
                    Envelope::failure()
                }
            }
            WebRequest::Unknown(api) => {
                warn!(session_id = %self.session_id, %api, "received unknown request");
                Envelope::failure()
            }
        }
    }

    /// Aggregates the fleet view: every registry entry plus every
    /// serial-discovered device not already listed, without duplicates.
    fn get_edges(&self) -> Result<Value, ProtocolError> {
        let registry_rows = self.state.registry.lock().snapshot();

        let mut clients: Vec<FleetClientEntry> = registry_rows
            .iter()
            .map(|row| FleetClientEntry {
                device_serial: row.device_serial.clone(),
                status: row.connected,
                registered: false,
            })
            .collect();

        // One probe per candidate port. The inventory lock is held for the
        // whole pass so the scanner cannot rewrite the list mid-iteration;
        // each probe opens and closes its own port handle.
        let discovered: Vec<String> = {
            let ports = self.state.ports.lock();
            let mut found = Vec::new();
            for port in ports.iter() {
                match self.radio.probe_serial(port) {
                    Ok(serial) => found.push(serial),
                    Err(e) => {
                        warn!(port, "failed to probe serial port: {e}");
                    }
                }
            }
            found
        };

        // Merge under the registry lock so it cannot interleave with a
        // session's connect write for the same serial.
        {
            let _guard = self.state.registry.lock();
            for serial in discovered {
                let already_listed = clients.iter().any(|c| c.device_serial == serial);
                if !already_listed {
                    clients.push(FleetClientEntry {
                        device_serial: serial,
                        status: true,
                        registered: false,
                    });
                }
            }
        }

        let payload = FleetPayload {
            clients,
            server_serial: self.state.config.server.device_serial.clone(),
            server_status: true,
        };
        serde_json::to_value(payload).map_err(ProtocolError::from)
    }

    /// Broadcasts the reconfiguration command over every candidate port.
    /// Returns `false` as soon as one port fails; later ports are skipped.
    fn reset_wifi(&self, payload: ResetWifiPayload) -> bool {
        let command = ResetCommand {
            device_serial: payload.device_serial,
            ssid: payload.wifi_ssid,
            password: payload.wifi_password,
            server_ip: self.state.config.server.edge_address.clone(),
            server_port: self.state.config.server.edge_port,
        }
        .into_envelope();

        let ports = self.state.ports.lock();
        for port in ports.iter() {
            if let Err(e) = self.radio.send_command(port, &command) {
                warn!(port, "failed to open serial port: {e}");
                return false;
            }
        }
        true
    }

    fn close(self) {
        let _ = self.stream.shutdown(Shutdown::Both);
        info!(
            peer = %self.peer,
            session_id = %self.session_id,
            "web client session closed"
        );
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
