//! Per-connection session for one edge device.
//!
//! Lifecycle: accepted → (optionally) introduced via `setup_edge` → serving
//! until the peer disconnects, a handler fails, or shutdown. The state
//! machine is soft: nothing forces `setup_edge` to run first. The device
//! serial is simply empty until it does, and close still records the
//! disconnect under whatever serial the session has (including the empty
//! one).
//!
//! Error policy per request, in order of severity:
//! - transport/decoding failure: warn, terminate, no reply;
//! - handler failure on a recognized operation: warn, failure reply, then
//!   terminate; the peer always gets exactly one reply per request it
//!   managed to deliver;
//! - unknown operation: warn, failure reply, session stays open.

use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use pumpgrid_core::protocol::messages::{
    ParamsPayload, SensorUploadPayload, SetupEdgePayload,
};
use pumpgrid_core::{EdgeRequest, Envelope, ProtocolError};

use crate::application::state::AppState;
use crate::infrastructure::network::{read_envelope, ReadOutcome};
use crate::infrastructure::storage::store::{DeviceStore, StoreError};

/// Failures inside a recognized request handler.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("system clock before Unix epoch: {0}")]
    Clock(#[from] std::time::SystemTimeError),
}

/// One edge-device connection and its dedicated store connection.
pub struct EdgeSession {
    stream: TcpStream,
    peer: SocketAddr,
    session_id: Uuid,
    state: Arc<AppState>,
    store: Box<dyn DeviceStore>,
    device_serial: String,
    keep_open: bool,
}

impl EdgeSession {
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        state: Arc<AppState>,
        store: Box<dyn DeviceStore>,
    ) -> Self {
        let session_id = Uuid::new_v4();
        info!(%peer, %session_id, "client device connected");
        Self {
            stream,
            peer,
            session_id,
            state,
            store,
            device_serial: String::new(),
            keep_open: true,
        }
    }

    /// Serves requests until the peer goes away, a handler fails, or the
    /// shutdown flag is set; then closes.
    pub fn run(mut self) {
        while !self.state.shutdown.is_set() && self.keep_open {
            self.serve_one();
        }
        self.close();
    }

    /// One bounded read → dispatch → one reply.
    fn serve_one(&mut self) {
        let request = match read_envelope(&mut self.stream, self.state.config.server.max_bufsize) {
            ReadOutcome::Request(envelope) => envelope,
            ReadOutcome::Idle => return,
            ReadOutcome::Closed(reason) => {
                warn!(
                    peer = %self.peer,
                    session_id = %self.session_id,
                    "client device disconnected unexpectedly: {reason}"
                );
                self.keep_open = false;
                return;
            }
        };

        let reply = self.dispatch(request);

        if let Err(e) = self.stream.write_all(&reply.to_bytes()) {
            warn!(
                peer = %self.peer,
                session_id = %self.session_id,
                "failed to send reply to client device: {e}"
            );
            self.keep_open = false;
        }
    }

    /// Classifies and handles one request, producing exactly one reply.
    fn dispatch(&mut self, request: Envelope) -> Envelope {
        let classified = match EdgeRequest::from_envelope(&request) {
            Ok(classified) => classified,
            Err(e) => {
                warn!(session_id = %self.session_id, "unable to handle client device request: {e}");
                self.keep_open = false;
                return Envelope::failure();
            }
        };

        match classified {
            EdgeRequest::SetupEdge(payload) => self.setup_edge(payload),
            EdgeRequest::SetParams => self.reply_or_terminate(Self::set_params),
            EdgeRequest::UploadSensorRecord(payload) => {
                self.reply_or_terminate(move |session| session.upload_sensor_record(payload))
            }
            EdgeRequest::Unknown(api) => {
                warn!(session_id = %self.session_id, %api, "received unknown request");
                Envelope::failure()
            }
        }
    }

    /// Wraps a fallible handler: failure replies are still sent, but the
    /// session terminates afterwards.
    fn reply_or_terminate<F>(&mut self, handler: F) -> Envelope
    where
        F: FnOnce(&mut Self) -> Result<Value, SessionError>,
    {
        match handler(self) {
            Ok(data) => Envelope::success(data),
            Err(e) => {
                warn!(
                    session_id = %self.session_id,
                    "unable to handle client device request: {e}"
                );
                self.keep_open = false;
                Envelope::failure()
            }
        }
    }

    /// `setup_edge`: record the device serial and mark it connected.
    fn setup_edge(&mut self, payload: SetupEdgePayload) -> Envelope {
        self.device_serial = payload.device_serial;
        self.state
            .registry
            .lock()
            .mark_connected(&self.device_serial);
        Envelope::success(json!({}))
    }

    /// `set_params`: per-device configuration from the store, falling back
    /// to the process-wide defaults when the device has no row. The reply
    /// always carries the server clock for on-device RTC sync.
    fn set_params(&mut self) -> Result<Value, SessionError> {
        let params = self
            .store
            .load_params(&self.device_serial)?
            .unwrap_or_else(|| self.state.config.irrigation.default_params());

        let rtc_time = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs_f64();
        let payload = ParamsPayload::from_params(&params, rtc_time);
        serde_json::to_value(payload)
            .map_err(ProtocolError::from)
            .map_err(SessionError::from)
    }

    /// `upload_sensor_record`: one insert, committed immediately. Any store
    /// failure terminates the session; there is no local fallback on this
    /// path.
    fn upload_sensor_record(&mut self, payload: SensorUploadPayload) -> Result<Value, SessionError> {
        let record = payload.into_record();
        self.store.insert_record(&self.device_serial, &record)?;
        Ok(json!({}))
    }

    /// Releases the store connection, closes the socket both ways, and
    /// unconditionally records the disconnect, under the empty serial when
    /// `setup_edge` never ran.
    fn close(self) {
        drop(self.store);
        let _ = self.stream.shutdown(Shutdown::Both);
        self.state
            .registry
            .lock()
            .mark_disconnected(&self.device_serial);
        info!(
            peer = %self.peer,
            session_id = %self.session_id,
            device_serial = %self.device_serial,
            "client device session closed"
        );
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
