//! The orchestrator: drains the dispatch queue, spawns one session worker
//! per accepted connection, and drives the cooperative shutdown sequence.
//!
//! Shutdown is best-effort and non-forced: the shutdown flag is set once,
//! then every tracked worker is given a bounded join deadline. A worker
//! still running after its deadline is logged as a failure to stop and the
//! process moves on; no thread is ever killed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::application::dispatch::{DispatchEntry, DispatchQueue, Role};
use crate::application::state::AppState;
use crate::infrastructure::network::edge_session::EdgeSession;
use crate::infrastructure::network::web_session::WebSession;
use crate::infrastructure::radio::link::RadioLink;
use crate::infrastructure::storage::store::StorePool;

/// How often a joining worker is re-checked against its deadline.
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Pacing between orchestrator iterations, matching the entry point's idle
/// poll cadence.
const LOOP_PACE: Duration = Duration::from_millis(100);

/// Named worker-thread handles tracked for the shutdown join.
#[derive(Default)]
pub struct WorkerSet {
    workers: Vec<(String, JoinHandle<()>)>,
}

impl WorkerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, handle: JoinHandle<()>) {
        self.workers.push((name.to_string(), handle));
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Joins every worker, waiting at most `deadline` for each. Stragglers
    /// are logged and left running.
    pub fn join_all(self, deadline: Duration) {
        for (name, handle) in self.workers {
            let until = Instant::now() + deadline;
            while !handle.is_finished() && Instant::now() < until {
                std::thread::sleep(JOIN_POLL_INTERVAL);
            }
            if handle.is_finished() {
                if handle.join().is_err() {
                    error!(worker = %name, "worker panicked before shutdown");
                }
            } else {
                error!(worker = %name, "failed to stop worker within {deadline:?}");
            }
        }
    }
}

/// Top-level connection coordinator.
pub struct Orchestrator {
    state: Arc<AppState>,
    queue: Arc<DispatchQueue>,
    pool: Arc<dyn StorePool>,
    radio: Arc<dyn RadioLink>,
    workers: WorkerSet,
}

impl Orchestrator {
    /// `workers` carries the already-running background services (scanner,
    /// listeners) so the shutdown sequence joins them alongside sessions.
    pub fn new(
        state: Arc<AppState>,
        queue: Arc<DispatchQueue>,
        pool: Arc<dyn StorePool>,
        radio: Arc<dyn RadioLink>,
        workers: WorkerSet,
    ) -> Self {
        Self {
            state,
            queue,
            pool,
            radio,
            workers,
        }
    }

    /// Main loop: runs until the external keep-running signal clears.
    ///
    /// Each iteration re-reads `keep_running`, drains the dispatch queue
    /// under a bounded lock wait, and spawns a session worker per drained
    /// entry. A timed-out drain is only a warning; entries stay queued.
    pub async fn run(&mut self, keep_running: &AtomicBool) {
        let drain_timeout = self.state.config.server.accept_timeout();

        while keep_running.load(Ordering::Relaxed) {
            match self.queue.drain(drain_timeout) {
                Some(batch) => {
                    for entry in batch {
                        self.spawn_session(entry);
                    }
                }
                None => {
                    warn!(
                        "dispatch queue lock not acquired within {drain_timeout:?}; \
                         entries retained for next pass"
                    );
                }
            }

            tokio::time::sleep(LOOP_PACE).await;
        }

        info!("keep-running signal cleared; leaving orchestrator loop");
    }

    /// Spawns the session worker for one accepted connection and tracks its
    /// handle for the shutdown join.
    fn spawn_session(&mut self, entry: DispatchEntry) {
        let DispatchEntry { stream, peer, role } = entry;
        let worker_name = match role {
            Role::Edge => "edge-session",
            Role::Web => "web-session",
        };

        let spawned = match role {
            Role::Edge => {
                // Each edge session owns one store connection for its whole
                // lifetime; a failed checkout drops the connection unserved.
                let store = match self.pool.checkout() {
                    Ok(store) => store,
                    Err(e) => {
                        error!(%peer, "no store connection for edge session: {e}");
                        return;
                    }
                };
                let session = EdgeSession::new(stream, peer, Arc::clone(&self.state), store);
                std::thread::Builder::new()
                    .name(worker_name.to_string())
                    .spawn(move || session.run())
            }
            Role::Web => {
                let session =
                    WebSession::new(stream, peer, Arc::clone(&self.state), Arc::clone(&self.radio));
                std::thread::Builder::new()
                    .name(worker_name.to_string())
                    .spawn(move || session.run())
            }
        };

        match spawned {
            Ok(handle) => self.workers.push(worker_name, handle),
            Err(e) => error!(%peer, "failed to spawn {} session: {e}", role.peer_label()),
        }
    }

    /// Shutdown sequence: set the shutdown flag, then join every tracked
    /// worker (listeners, scanner, and sessions) with a bounded deadline.
    pub fn shutdown(self) {
        info!("shutting down: signalling workers");
        self.state.shutdown.trigger();
        self.workers
            .join_all(self.state.config.server.worker_join_timeout());
        info!("shutdown sequence complete");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
