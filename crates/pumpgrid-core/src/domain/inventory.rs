//! The serial-port candidate inventory.
//!
//! The radio scanner rewrites the whole list on every enumeration pass;
//! readers take a snapshot copy under the server's lock before iterating,
//! since a scan can race any probe pass.

/// Ordered list of candidate radio port identifiers.
#[derive(Debug, Default)]
pub struct PortInventory {
    ports: Vec<String>,
}

impl PortInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole inventory with the latest enumeration result.
    /// An empty scan yields an empty inventory; that is not an error.
    pub fn replace_all(&mut self, ports: Vec<String>) {
        self.ports = ports;
    }

    /// Returns a copy of the current candidate ports, in enumeration order.
    pub fn snapshot(&self) -> Vec<String> {
        self.ports.clone()
    }

    /// Iterates the candidates in place. Callers hold the surrounding lock
    /// for the whole pass when iteration must stay coherent with the scanner.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ports.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
