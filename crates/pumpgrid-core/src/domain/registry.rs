//! The edge registry: device serial number → live-connection flag.
//!
//! The registry is the server's in-memory picture of the fleet. Each edge
//! session marks its device connected after a successful `setup_edge` and
//! unconditionally marks it disconnected when the session closes, including
//! abnormal closes, and including sessions that never completed `setup_edge`
//! (those write the empty-string key; see `mark_disconnected`).
//!
//! The raw map is never exposed. The server shares one registry behind a
//! mutex; readers take [`EdgeRegistry::snapshot`] copies under the lock and
//! iterate outside it.

use std::collections::HashMap;

use tracing::debug;

/// One row of a registry snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeStatus {
    pub device_serial: String,
    pub connected: bool,
}

/// Mapping of device serial numbers to connected flags.
#[derive(Debug, Default)]
pub struct EdgeRegistry {
    edges: HashMap<String, bool>,
}

impl EdgeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `serial` as connected, inserting the entry if absent.
    pub fn mark_connected(&mut self, serial: &str) {
        debug!(device_serial = serial, "edge connected");
        self.edges.insert(serial.to_string(), true);
    }

    /// Marks `serial` as disconnected, inserting the entry if absent.
    ///
    /// Sessions that close before `setup_edge` ran call this with an empty
    /// serial; the empty-string entry is recorded like any other.
    pub fn mark_disconnected(&mut self, serial: &str) {
        debug!(device_serial = serial, "edge disconnected");
        self.edges.insert(serial.to_string(), false);
    }

    /// Returns whether `serial` has an entry, connected or not.
    pub fn contains(&self, serial: &str) -> bool {
        self.edges.contains_key(serial)
    }

    /// Returns the connected flag for `serial`, if registered.
    pub fn is_connected(&self, serial: &str) -> Option<bool> {
        self.edges.get(serial).copied()
    }

    /// Returns a copy of every entry, ordered by serial for stable output.
    pub fn snapshot(&self) -> Vec<EdgeStatus> {
        let mut rows: Vec<EdgeStatus> = self
            .edges
            .iter()
            .map(|(serial, connected)| EdgeStatus {
                device_serial: serial.clone(),
                connected: *connected,
            })
            .collect();
        rows.sort_by(|a, b| a.device_serial.cmp(&b.device_serial));
        rows
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_starts_empty() {
        let registry = EdgeRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_mark_connected_registers_serial_as_connected() {
        // Arrange
        let mut registry = EdgeRegistry::new();

        // Act
        registry.mark_connected("EDGE01");

        // Assert
        assert_eq!(registry.is_connected("EDGE01"), Some(true));
    }

    #[test]
    fn test_mark_disconnected_flips_existing_entry() {
        let mut registry = EdgeRegistry::new();
        registry.mark_connected("EDGE01");

        registry.mark_disconnected("EDGE01");

        assert_eq!(registry.is_connected("EDGE01"), Some(false));
        assert_eq!(registry.len(), 1, "disconnect must not drop the entry");
    }

    #[test]
    fn test_mark_disconnected_inserts_unknown_serial() {
        // A session that dies before setup_edge still writes its close.
        let mut registry = EdgeRegistry::new();
        registry.mark_disconnected("EDGE99");
        assert_eq!(registry.is_connected("EDGE99"), Some(false));
    }

    #[test]
    fn test_mark_disconnected_records_empty_serial() {
        let mut registry = EdgeRegistry::new();
        registry.mark_disconnected("");
        assert!(registry.contains(""));
        assert_eq!(registry.is_connected(""), Some(false));
    }

    #[test]
    fn test_reconnect_after_disconnect_shows_connected() {
        let mut registry = EdgeRegistry::new();
        registry.mark_connected("EDGE01");
        registry.mark_disconnected("EDGE01");
        registry.mark_connected("EDGE01");
        assert_eq!(registry.is_connected("EDGE01"), Some(true));
    }

    #[test]
    fn test_snapshot_is_ordered_and_detached() {
        // Arrange
        let mut registry = EdgeRegistry::new();
        registry.mark_connected("EDGE02");
        registry.mark_connected("EDGE01");

        // Act
        let snapshot = registry.snapshot();
        registry.mark_disconnected("EDGE01");

        // Assert: ordering is stable and the copy is unaffected by later writes
        assert_eq!(snapshot[0].device_serial, "EDGE01");
        assert_eq!(snapshot[1].device_serial, "EDGE02");
        assert!(snapshot[0].connected);
    }

    #[test]
    fn test_is_connected_returns_none_for_unregistered_serial() {
        let registry = EdgeRegistry::new();
        assert_eq!(registry.is_connected("EDGE01"), None);
    }
}
