//! SQLite telemetry store.
//!
//! Each edge session checks one dedicated connection out of the pool for
//! its whole lifetime and releases it on close. Connections are never
//! shared between sessions, and every insert is a single autocommitted
//! statement (no multi-statement transactions anywhere in this store).
//!
//! Device rows (`edge_devices`) are provisioned by the account-management
//! side; this server only reads them and attributes telemetry to them. A
//! record uploaded for a serial without a row fails the NOT NULL device
//! reference, which is exactly the contract the edge session relies on.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tracing::info;

use pumpgrid_core::{DeviceParams, SensorRecord};

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

/// One session's view of the database.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceStore: Send {
    /// Loads the stored watering parameters for `device_serial`, if the
    /// device has a row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] on any database failure.
    fn load_params(&self, device_serial: &str) -> Result<Option<DeviceParams>, StoreError>;

    /// Inserts one telemetry record, resolving the owning device by serial
    /// inside the insert, and commits.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] on any failure, including an unknown
    /// serial (the device reference is NOT NULL).
    fn insert_record(&self, device_serial: &str, record: &SensorRecord) -> Result<(), StoreError>;
}

/// Hands out one dedicated store connection per session.
pub trait StorePool: Send + Sync {
    /// Checks out a connection for the lifetime of one edge session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] when the database cannot be opened.
    fn checkout(&self) -> Result<Box<dyn DeviceStore>, StoreError>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS edge_devices (
    id              INTEGER PRIMARY KEY,
    user_id         INTEGER NOT NULL,
    device_sn       TEXT    NOT NULL UNIQUE,
    detect_interval INTEGER NOT NULL,
    pump_start_time REAL    NOT NULL,
    soil_moisture   INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS sensor_records (
    id              INTEGER PRIMARY KEY,
    user_id         INTEGER NOT NULL,
    device_id       INTEGER NOT NULL,
    temperature     REAL    NOT NULL,
    humidity        REAL    NOT NULL,
    pressure        REAL    NOT NULL,
    raw_value0      INTEGER NOT NULL,
    raw_value1      INTEGER NOT NULL,
    raw_value2      INTEGER NOT NULL,
    raw_value3      INTEGER NOT NULL,
    voltage0        REAL    NOT NULL,
    voltage1        REAL    NOT NULL,
    voltage2        REAL    NOT NULL,
    voltage3        REAL    NOT NULL,
    detect_time     REAL    NOT NULL,
    pump_start_time REAL    NOT NULL
);
";

/// SQLite-backed [`StorePool`]. Construction ensures the schema exists;
/// checkouts open fresh connections against the same file.
pub struct SqlitePool {
    path: PathBuf,
}

impl SqlitePool {
    /// Opens the database, creates missing tables, and returns the pool.
    ///
    /// The pool serves at least one connection per concurrent edge session
    /// plus one for tooling, so `expected_sessions` is recorded for the
    /// startup log only; SQLite connections are opened on demand.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] if the file cannot be opened and
    /// [`StoreError::Query`] if the schema cannot be created.
    pub fn new(path: &Path, expected_sessions: i32) -> Result<Arc<Self>, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        conn.execute_batch(SCHEMA)?;

        info!(
            path = %path.display(),
            expected_sessions = expected_sessions + 1,
            "telemetry store ready"
        );
        Ok(Arc::new(Self {
            path: path.to_path_buf(),
        }))
    }
}

impl StorePool for SqlitePool {
    fn checkout(&self) -> Result<Box<dyn DeviceStore>, StoreError> {
        let conn = Connection::open(&self.path).map_err(|source| StoreError::Open {
            path: self.path.clone(),
            source,
        })?;
        Ok(Box::new(SqliteStore { conn }))
    }
}

/// One checked-out connection.
pub struct SqliteStore {
    conn: Connection,
}

impl DeviceStore for SqliteStore {
    fn load_params(&self, device_serial: &str) -> Result<Option<DeviceParams>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT detect_interval, pump_start_time, soil_moisture \
                 FROM edge_devices WHERE device_sn = ?1",
                params![device_serial],
                |row| {
                    Ok(DeviceParams {
                        detect_interval: row.get(0)?,
                        pump_start_secs: row.get(1)?,
                        soil_moisture: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    fn insert_record(&self, device_serial: &str, record: &SensorRecord) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO sensor_records \
             (user_id, device_id, temperature, humidity, pressure, \
              raw_value0, raw_value1, raw_value2, raw_value3, \
              voltage0, voltage1, voltage2, voltage3, detect_time, pump_start_time) \
             VALUES ((SELECT user_id FROM edge_devices WHERE device_sn = ?1), \
                     (SELECT id FROM edge_devices WHERE device_sn = ?1), \
                     ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                device_serial,
                record.temperature,
                record.humidity,
                record.pressure,
                record.raw_values[0],
                record.raw_values[1],
                record.raw_values[2],
                record.raw_values[3],
                record.voltages[0],
                record.voltages[1],
                record.voltages[2],
                record.voltages[3],
                record.detect_time,
                record.pump_start_secs,
            ],
        )?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
