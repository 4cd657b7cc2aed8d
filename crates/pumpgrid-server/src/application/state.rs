//! Process-wide shared state.
//!
//! Exactly two structures cross the concurrency boundary: the edge registry
//! and the serial-port inventory. Each sits behind its own mutex and the two
//! locks are never held at the same time: no code path needs both at once,
//! so there is no lock ordering to maintain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use pumpgrid_core::{EdgeRegistry, PortInventory};

use crate::infrastructure::storage::config::AppConfig;

/// Cooperative shutdown signal: set exactly once, never cleared, read at the
/// head of every loop. Blocking I/O is bounded by socket timeouts rather
/// than interrupted, so a set flag is observed within one timeout interval.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the flag. Idempotent; the transition is only ever false→true.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Everything the session and infrastructure layers share.
pub struct AppState {
    pub config: AppConfig,
    /// Device serial → connected flag; written by edge sessions, read by web
    /// sessions.
    pub registry: Mutex<EdgeRegistry>,
    /// Candidate radio ports; rewritten wholesale by the scanner.
    pub ports: Mutex<PortInventory>,
    pub shutdown: ShutdownFlag,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            registry: Mutex::new(EdgeRegistry::new()),
            ports: Mutex::new(PortInventory::new()),
            shutdown: ShutdownFlag::new(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_flag_starts_clear() {
        let flag = ShutdownFlag::new();
        assert!(!flag.is_set());
    }

    #[test]
    fn test_shutdown_flag_trigger_is_visible_through_clones() {
        // Arrange
        let flag = ShutdownFlag::new();
        let observer = flag.clone();

        // Act
        flag.trigger();

        // Assert
        assert!(observer.is_set());
    }

    #[test]
    fn test_shutdown_flag_trigger_is_idempotent() {
        let flag = ShutdownFlag::new();
        flag.trigger();
        flag.trigger();
        assert!(flag.is_set());
    }

    #[test]
    fn test_app_state_locks_are_independent() {
        // Holding the registry lock must not block inventory access.
        let state = AppState::new(AppConfig::default());
        let _registry = state.registry.lock();
        let ports = state.ports.try_lock();
        assert!(ports.is_some(), "inventory lock must be acquirable");
    }
}
