//! TOML-based configuration for the coordination server.
//!
//! The config file is created with defaults on first run and read back on
//! every start. Fields annotated with `#[serde(default = "some_fn")]` fall
//! back to their default when absent, so upgrading from an older file that
//! is missing newer fields keeps working.
//!
//! ```toml
//! [server]
//! device_serial = "TEST0001"
//! edge_address = "0.0.0.0"
//! edge_port = 7878
//!
//! [radio]
//! hardware_id = "VID:PID=2341:1002"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use pumpgrid_core::DeviceParams;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub irrigation: IrrigationConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub radio: RadioConfig,
}

/// Listener addressing, session limits, and timeouts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Serial number of the coordinator's own co-located device.
    #[serde(default = "default_device_serial")]
    pub device_serial: String,
    /// Externally reachable address edges connect to; also advertised in
    /// `reset_wifi` commands. `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_edge_address")]
    pub edge_address: String,
    /// TCP port for edge devices.
    #[serde(default = "default_edge_port")]
    pub edge_port: u16,
    /// TCP port for dashboard clients (bound to loopback only).
    #[serde(default = "default_web_port")]
    pub web_port: u16,
    /// Accept backlog for the edge listener.
    #[serde(default = "default_max_edge_clients")]
    pub max_edge_clients: i32,
    /// Accept backlog for the web listener.
    #[serde(default = "default_max_web_clients")]
    pub max_web_clients: i32,
    /// Bound on every accept wait, socket receive, and dispatch-queue drain.
    #[serde(default = "default_accept_timeout_secs")]
    pub accept_timeout_secs: f64,
    /// Largest request document a single read accepts, in bytes.
    #[serde(default = "default_max_bufsize")]
    pub max_bufsize: usize,
    /// Grace delay before a web session closes, letting the reply drain.
    #[serde(default = "default_web_linger_secs")]
    pub web_linger_secs: f64,
    /// Per-worker join deadline during shutdown.
    #[serde(default = "default_worker_join_timeout_secs")]
    pub worker_join_timeout_secs: f64,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ServerConfig {
    pub fn accept_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.accept_timeout_secs)
    }

    pub fn web_linger(&self) -> Duration {
        Duration::from_secs_f64(self.web_linger_secs)
    }

    pub fn worker_join_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.worker_join_timeout_secs)
    }
}

/// Process-wide watering defaults used when a device has no stored row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IrrigationConfig {
    /// Sampling interval in minutes.
    #[serde(default = "default_detect_interval_min")]
    pub detect_interval_min: i64,
    /// Pump activation duration in seconds.
    #[serde(default = "default_pump_start_secs")]
    pub pump_start_secs: f64,
    /// Soil-moisture threshold (raw ADC units).
    #[serde(default = "default_soil_moisture")]
    pub soil_moisture: i64,
}

impl IrrigationConfig {
    /// The fallback parameter set for devices without a stored row.
    pub fn default_params(&self) -> DeviceParams {
        DeviceParams {
            detect_interval: self.detect_interval_min,
            pump_start_secs: self.pump_start_secs,
            soil_moisture: self.soil_moisture,
        }
    }
}

/// Telemetry store location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

/// Serial-radio channel settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RadioConfig {
    /// Substring of the hardware ID that marks a candidate radio port.
    #[serde(default = "default_hardware_id")]
    pub hardware_id: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// Read/write timeout per serial operation, in milliseconds.
    #[serde(default = "default_radio_io_timeout_ms")]
    pub io_timeout_ms: u64,
    /// Settle delay between a write and the subsequent read, in milliseconds.
    #[serde(default = "default_radio_settle_ms")]
    pub settle_ms: u64,
}

impl RadioConfig {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_device_serial() -> String {
    "TEST0001".to_string()
}
fn default_edge_address() -> String {
    "0.0.0.0".to_string()
}
fn default_edge_port() -> u16 {
    7878
}
fn default_web_port() -> u16 {
    7879
}
fn default_max_edge_clients() -> i32 {
    5
}
fn default_max_web_clients() -> i32 {
    20
}
fn default_accept_timeout_secs() -> f64 {
    5.0
}
fn default_max_bufsize() -> usize {
    2048
}
fn default_web_linger_secs() -> f64 {
    10.0
}
fn default_worker_join_timeout_secs() -> f64 {
    10.0
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_detect_interval_min() -> i64 {
    10
}
fn default_pump_start_secs() -> f64 {
    0.5
}
fn default_soil_moisture() -> i64 {
    26000
}
fn default_database_path() -> PathBuf {
    PathBuf::from("pumpgrid.db")
}
fn default_hardware_id() -> String {
    "VID:PID=2341:1002".to_string()
}
fn default_baud() -> u32 {
    115_200
}
fn default_radio_io_timeout_ms() -> u64 {
    1000
}
fn default_radio_settle_ms() -> u64 {
    100
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            device_serial: default_device_serial(),
            edge_address: default_edge_address(),
            edge_port: default_edge_port(),
            web_port: default_web_port(),
            max_edge_clients: default_max_edge_clients(),
            max_web_clients: default_max_web_clients(),
            accept_timeout_secs: default_accept_timeout_secs(),
            max_bufsize: default_max_bufsize(),
            web_linger_secs: default_web_linger_secs(),
            worker_join_timeout_secs: default_worker_join_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

impl Default for IrrigationConfig {
    fn default() -> Self {
        Self {
            detect_interval_min: default_detect_interval_min(),
            pump_start_secs: default_pump_start_secs(),
            soil_moisture: default_soil_moisture(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            hardware_id: default_hardware_id(),
            baud: default_baud(),
            io_timeout_ms: default_radio_io_timeout_ms(),
            settle_ms: default_radio_settle_ms(),
        }
    }
}

// ── Load / save ───────────────────────────────────────────────────────────────

/// Loads the config from `path`, returning `AppConfig::default()` if the
/// file does not exist yet.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not
/// found", and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_field_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.edge_port, 7878);
        assert_eq!(config.server.web_port, 7879);
        assert_eq!(config.server.max_edge_clients, 5);
        assert_eq!(config.server.max_web_clients, 20);
        assert_eq!(config.server.max_bufsize, 2048);
        assert_eq!(config.server.device_serial, "TEST0001");
    }

    #[test]
    fn test_default_irrigation_parameters() {
        let config = AppConfig::default();
        let params = config.irrigation.default_params();
        assert_eq!(params.detect_interval, 10);
        assert_eq!(params.soil_moisture, 26000);
        assert_eq!(params.pump_start_ms(), 500);
    }

    #[test]
    fn test_default_radio_filter_targets_the_shipped_board() {
        let config = AppConfig::default();
        assert_eq!(config.radio.hardware_id, "VID:PID=2341:1002");
        assert_eq!(config.radio.baud, 115_200);
    }

    #[test]
    fn test_timeout_accessors_convert_units() {
        let config = AppConfig::default();
        assert_eq!(config.server.accept_timeout(), Duration::from_secs(5));
        assert_eq!(config.server.web_linger(), Duration::from_secs(10));
        assert_eq!(config.radio.io_timeout(), Duration::from_millis(1000));
        assert_eq!(config.radio.settle(), Duration::from_millis(100));
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        // Arrange
        let mut config = AppConfig::default();
        config.server.edge_port = 9000;
        config.radio.baud = 9600;

        // Act
        let text = toml::to_string_pretty(&config).expect("serialize");
        let restored: AppConfig = toml::from_str(&text).expect("deserialize");

        // Assert
        assert_eq!(config, restored);
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let config: AppConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_section_overrides_only_named_fields() {
        // Arrange
        let text = r#"
[server]
edge_port = 9999
"#;

        // Act
        let config: AppConfig = toml::from_str(text).expect("deserialize partial");

        // Assert
        assert_eq!(config.server.edge_port, 9999);
        assert_eq!(config.server.web_port, 7879, "unnamed fields keep defaults");
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let result: Result<AppConfig, toml::de::Error> = toml::from_str("[[[ not toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_returns_defaults_when_file_absent() {
        let path = Path::new("/nonexistent/pumpgrid-test/config.toml");
        let config = load_config(path).expect("absent file is not an error");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_save_then_load_round_trips_via_temp_dir() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("pumpgrid_cfg_{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("config.toml");

        let mut config = AppConfig::default();
        config.server.device_serial = "FARM0002".to_string();
        config.server.log_level = "debug".to_string();

        // Act
        save_config(&path, &config).expect("save");
        let loaded = load_config(&path).expect("load");

        // Assert
        assert_eq!(loaded.server.device_serial, "FARM0002");
        assert_eq!(loaded.server.log_level, "debug");

        std::fs::remove_dir_all(&dir).ok();
    }
}
