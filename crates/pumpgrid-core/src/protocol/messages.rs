//! Typed payloads and closed request dispatch for every PumpGrid operation.
//!
//! Each accepted connection speaks a small, fixed operation set. Inbound
//! envelopes are classified into [`EdgeRequest`] or [`WebRequest`] so an
//! unrecognized operation is an explicit `Unknown` variant rather than an
//! open-ended string match at the call site.
//!
//! Wire keys follow the device firmware's casing (`DeviceSerial`,
//! `RawValue0`, `RTCTime`, `ServerIP`, ...), so payload structs rename
//! per-field where PascalCase derivation is not enough.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::record::{DeviceParams, SensorRecord};
use crate::protocol::envelope::{Envelope, ProtocolError};

/// Operation names as they appear in the `Api` field.
pub mod api {
    pub const SETUP_EDGE: &str = "setup_edge";
    pub const SET_PARAMS: &str = "set_params";
    pub const UPLOAD_SENSOR_RECORD: &str = "upload_sensor_record";
    pub const GET_EDGES: &str = "get_edges";
    pub const RESET_WIFI: &str = "reset_wifi";
    pub const GET_DEVICE_SN: &str = "get_device_sn";
}

// ── Edge-role payloads ────────────────────────────────────────────────────────

/// `setup_edge` request payload: the device introduces itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupEdgePayload {
    #[serde(rename = "DeviceSerial")]
    pub device_serial: String,
}

/// `set_params` response payload: per-device watering configuration plus the
/// server clock for on-device RTC synchronization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamsPayload {
    /// Sampling interval in minutes.
    #[serde(rename = "DetectInterval")]
    pub detect_interval: i64,
    /// Pump activation duration in milliseconds (stored in seconds server-side).
    #[serde(rename = "PumpStartTime")]
    pub pump_start_time: i64,
    /// Soil-moisture threshold (raw ADC units).
    #[serde(rename = "SoilMoisture")]
    pub soil_moisture: i64,
    /// Server wall clock, seconds since the Unix epoch.
    #[serde(rename = "RTCTime")]
    pub rtc_time: f64,
}

impl ParamsPayload {
    /// Builds the wire payload from stored parameters, converting the pump
    /// duration to the milliseconds the firmware expects.
    pub fn from_params(params: &DeviceParams, rtc_time: f64) -> Self {
        Self {
            detect_interval: params.detect_interval,
            pump_start_time: params.pump_start_ms(),
            soil_moisture: params.soil_moisture,
            rtc_time,
        }
    }
}

/// `upload_sensor_record` request payload: one telemetry sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SensorUploadPayload {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub raw_value0: i64,
    pub raw_value1: i64,
    pub raw_value2: i64,
    pub raw_value3: i64,
    pub voltage0: f64,
    pub voltage1: f64,
    pub voltage2: f64,
    pub voltage3: f64,
    /// Sample timestamp, seconds since the Unix epoch.
    pub detect_time: f64,
    /// Pump activation duration in milliseconds.
    pub pump_start_time: i64,
}

impl SensorUploadPayload {
    /// Converts the wire sample into the stored record form (pump duration
    /// back in seconds).
    pub fn into_record(self) -> SensorRecord {
        SensorRecord {
            temperature: self.temperature,
            humidity: self.humidity,
            pressure: self.pressure,
            raw_values: [
                self.raw_value0,
                self.raw_value1,
                self.raw_value2,
                self.raw_value3,
            ],
            voltages: [self.voltage0, self.voltage1, self.voltage2, self.voltage3],
            detect_time: self.detect_time,
            pump_start_secs: self.pump_start_time as f64 / 1000.0,
        }
    }
}

// ── Web-role payloads ─────────────────────────────────────────────────────────

/// One device row in the `get_edges` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetClientEntry {
    #[serde(rename = "DeviceSerial")]
    pub device_serial: String,
    /// Live-connection flag.
    #[serde(rename = "Status")]
    pub status: bool,
    /// Static marker: account registration is handled outside this server.
    #[serde(rename = "Registered")]
    pub registered: bool,
}

/// `get_edges` response payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetPayload {
    #[serde(rename = "Clients")]
    pub clients: Vec<FleetClientEntry>,
    #[serde(rename = "ServerSerial")]
    pub server_serial: String,
    #[serde(rename = "ServerStatus")]
    pub server_status: bool,
}

/// `reset_wifi` request payload from a dashboard client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetWifiPayload {
    #[serde(rename = "DeviceSerial")]
    pub device_serial: String,
    #[serde(rename = "WiFiSsid")]
    pub wifi_ssid: String,
    #[serde(rename = "WiFiPassword")]
    pub wifi_password: String,
}

// ── Serial-radio side-channel payloads ────────────────────────────────────────

/// `get_device_sn` probe reply payload from a device on the radio channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnPayload {
    #[serde(rename = "DeviceSerial")]
    pub device_serial: String,
}

/// `reset_wifi` command broadcast to devices over every candidate serial
/// port. Fire-and-forget: no reply is awaited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetCommand {
    #[serde(rename = "DeviceSerial")]
    pub device_serial: String,
    #[serde(rename = "Ssid")]
    pub ssid: String,
    #[serde(rename = "Password")]
    pub password: String,
    /// The address edges use to reach this server after reconfiguration.
    #[serde(rename = "ServerIP")]
    pub server_ip: String,
    #[serde(rename = "ServerPort")]
    pub server_port: u16,
}

impl ResetCommand {
    /// Wraps the command in its request envelope.
    pub fn into_envelope(self) -> Envelope {
        let data = serde_json::to_value(&self).unwrap_or_default();
        Envelope::request(api::RESET_WIFI, data)
    }
}

// ── Request classification ────────────────────────────────────────────────────

fn payload<T: DeserializeOwned>(env: &Envelope) -> Result<T, ProtocolError> {
    serde_json::from_value(env.data.clone()).map_err(|source| ProtocolError::InvalidPayload {
        api: env.api.clone(),
        source,
    })
}

/// A classified request on an edge-device connection.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeRequest {
    SetupEdge(SetupEdgePayload),
    SetParams,
    UploadSensorRecord(SensorUploadPayload),
    /// Any operation name outside the edge set; carries the name for logging.
    Unknown(String),
}

impl EdgeRequest {
    /// Classifies an inbound envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidPayload`] when a recognized operation
    /// carries a payload of the wrong shape.
    pub fn from_envelope(env: &Envelope) -> Result<Self, ProtocolError> {
        match env.api.as_str() {
            api::SETUP_EDGE => Ok(Self::SetupEdge(payload(env)?)),
            api::SET_PARAMS => Ok(Self::SetParams),
            api::UPLOAD_SENSOR_RECORD => Ok(Self::UploadSensorRecord(payload(env)?)),
            other => Ok(Self::Unknown(other.to_string())),
        }
    }
}

/// A classified request on a dashboard connection.
#[derive(Debug, Clone, PartialEq)]
pub enum WebRequest {
    GetEdges,
    ResetWifi(ResetWifiPayload),
    Unknown(String),
}

impl WebRequest {
    /// Classifies an inbound envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidPayload`] when `reset_wifi` carries a
    /// payload of the wrong shape.
    pub fn from_envelope(env: &Envelope) -> Result<Self, ProtocolError> {
        match env.api.as_str() {
            api::GET_EDGES => Ok(Self::GetEdges),
            api::RESET_WIFI => Ok(Self::ResetWifi(payload(env)?)),
            other => Ok(Self::Unknown(other.to_string())),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_setup_edge_classifies_with_device_serial() {
        // Arrange
        let env = Envelope::request(api::SETUP_EDGE, json!({"DeviceSerial": "EDGE01"}));

        // Act
        let req = EdgeRequest::from_envelope(&env).expect("classify");

        // Assert
        assert_eq!(
            req,
            EdgeRequest::SetupEdge(SetupEdgePayload {
                device_serial: "EDGE01".to_string()
            })
        );
    }

    #[test]
    fn test_setup_edge_with_missing_serial_is_invalid_payload() {
        let env = Envelope::request(api::SETUP_EDGE, json!({}));
        let result = EdgeRequest::from_envelope(&env);
        assert!(matches!(result, Err(ProtocolError::InvalidPayload { .. })));
    }

    #[test]
    fn test_unrecognized_edge_api_becomes_unknown_variant() {
        let env = Envelope::request("bogus", json!({}));
        let req = EdgeRequest::from_envelope(&env).expect("classify");
        assert_eq!(req, EdgeRequest::Unknown("bogus".to_string()));
    }

    #[test]
    fn test_sensor_upload_converts_pump_time_to_seconds() {
        // Arrange: firmware reports pump time in milliseconds
        let upload = SensorUploadPayload {
            temperature: 21.5,
            humidity: 48.0,
            pressure: 1013.2,
            raw_value0: 26100,
            raw_value1: 0,
            raw_value2: 0,
            raw_value3: 0,
            voltage0: 2.1,
            voltage1: 0.0,
            voltage2: 0.0,
            voltage3: 0.0,
            detect_time: 1_700_000_000.0,
            pump_start_time: 500,
        };

        // Act
        let record = upload.into_record();

        // Assert
        assert!((record.pump_start_secs - 0.5).abs() < f64::EPSILON);
        assert_eq!(record.raw_values[0], 26100);
    }

    #[test]
    fn test_params_payload_converts_pump_time_to_milliseconds() {
        let params = DeviceParams {
            detect_interval: 10,
            pump_start_secs: 0.5,
            soil_moisture: 26000,
        };
        let wire = ParamsPayload::from_params(&params, 1_700_000_000.0);
        assert_eq!(wire.pump_start_time, 500);
        assert_eq!(wire.detect_interval, 10);
    }

    #[test]
    fn test_params_payload_serializes_rtc_time_key_verbatim() {
        let wire = ParamsPayload {
            detect_interval: 10,
            pump_start_time: 500,
            soil_moisture: 26000,
            rtc_time: 1.0,
        };
        let value = serde_json::to_value(&wire).unwrap();
        assert!(value.get("RTCTime").is_some(), "key must be RTCTime, not RtcTime");
    }

    #[test]
    fn test_sensor_upload_accepts_firmware_key_casing() {
        let data = json!({
            "Temperature": 20.0, "Humidity": 50.0, "Pressure": 1000.0,
            "RawValue0": 1, "RawValue1": 2, "RawValue2": 3, "RawValue3": 4,
            "Voltage0": 0.1, "Voltage1": 0.2, "Voltage2": 0.3, "Voltage3": 0.4,
            "DetectTime": 1_700_000_000.5, "PumpStartTime": 750
        });
        let env = Envelope::request(api::UPLOAD_SENSOR_RECORD, data);
        let req = EdgeRequest::from_envelope(&env).expect("classify");
        match req {
            EdgeRequest::UploadSensorRecord(upload) => {
                assert_eq!(upload.raw_value3, 4);
                assert_eq!(upload.pump_start_time, 750);
            }
            other => panic!("expected upload, got {other:?}"),
        }
    }

    #[test]
    fn test_web_reset_wifi_classifies_with_credentials() {
        let env = Envelope::request(
            api::RESET_WIFI,
            json!({"DeviceSerial": "EDGE01", "WiFiSsid": "barn", "WiFiPassword": "hunter2"}),
        );
        let req = WebRequest::from_envelope(&env).expect("classify");
        match req {
            WebRequest::ResetWifi(payload) => {
                assert_eq!(payload.wifi_ssid, "barn");
                assert_eq!(payload.wifi_password, "hunter2");
            }
            other => panic!("expected reset_wifi, got {other:?}"),
        }
    }

    #[test]
    fn test_reset_command_envelope_carries_server_ip_key_verbatim() {
        // Arrange
        let cmd = ResetCommand {
            device_serial: "EDGE01".to_string(),
            ssid: "barn".to_string(),
            password: "hunter2".to_string(),
            server_ip: "192.168.4.10".to_string(),
            server_port: 7878,
        };

        // Act
        let env = cmd.into_envelope();

        // Assert
        assert_eq!(env.api, api::RESET_WIFI);
        assert_eq!(env.data["ServerIP"], "192.168.4.10");
        assert_eq!(env.data["ServerPort"], 7878);
    }

    #[test]
    fn test_fleet_payload_wire_keys() {
        let payload = FleetPayload {
            clients: vec![FleetClientEntry {
                device_serial: "EDGE01".to_string(),
                status: true,
                registered: false,
            }],
            server_serial: "TEST0001".to_string(),
            server_status: true,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["Clients"][0]["DeviceSerial"], "EDGE01");
        assert_eq!(value["Clients"][0]["Status"], true);
        assert_eq!(value["Clients"][0]["Registered"], false);
        assert_eq!(value["ServerSerial"], "TEST0001");
    }
}
