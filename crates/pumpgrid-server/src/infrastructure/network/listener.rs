//! Role listeners: bind, accept with a bounded wait, hand off to the
//! dispatch queue.
//!
//! Two instances run concurrently on their own named threads: the edge
//! listener on the externally reachable address, the web listener on
//! loopback only. Accept timeouts are the expected steady-state outcome and
//! log at debug level; the loop ends only when the shutdown flag is set, at
//! which point dropping the listener closes the socket.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info};

use crate::application::dispatch::{DispatchEntry, DispatchQueue, Role};
use crate::application::state::ShutdownFlag;

/// How often a pending accept re-polls the socket and the shutdown flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One role's accepting socket.
pub struct Listener {
    socket: TcpListener,
    role: Role,
    accept_timeout: Duration,
}

impl Listener {
    /// Binds and starts listening with an explicit per-role backlog.
    ///
    /// The socket is non-blocking: accepts are bounded polls rather than
    /// indefinite blocks, so the shutdown flag is observed within one
    /// timeout interval.
    ///
    /// # Errors
    ///
    /// Any socket setup failure; an unbindable listener is fatal to startup
    /// and handled by the entry point.
    pub fn bind(
        address: &str,
        port: u16,
        backlog: i32,
        role: Role,
        accept_timeout: Duration,
    ) -> io::Result<Listener> {
        let addr: SocketAddr = format!("{address}:{port}")
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(backlog)?;
        socket.set_nonblocking(true)?;

        let socket: TcpListener = socket.into();
        info!(
            role = role.peer_label(),
            %addr,
            backlog,
            "listening"
        );

        Ok(Self {
            socket,
            role,
            accept_timeout,
        })
    }

    /// The bound address (useful when binding port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Accept loop: runs until the shutdown flag is set.
    pub fn run(self, queue: &DispatchQueue, shutdown: &ShutdownFlag) {
        while !shutdown.is_set() {
            match self.accept_bounded(shutdown) {
                Ok(Some((stream, peer))) => self.hand_off(queue, stream, peer),
                Ok(None) => {
                    // Steady state: nobody connected within the window.
                    debug!(role = self.role.peer_label(), "accept timed out");
                }
                Err(e) => {
                    debug!(
                        "failed to accept {}: {e}",
                        self.role.peer_label()
                    );
                }
            }
        }

        info!(role = self.role.peer_label(), "listener stopped");
    }

    /// Waits up to the configured timeout for one connection, re-checking
    /// the shutdown flag at every poll.
    fn accept_bounded(
        &self,
        shutdown: &ShutdownFlag,
    ) -> io::Result<Option<(TcpStream, SocketAddr)>> {
        let deadline = Instant::now() + self.accept_timeout;
        loop {
            if shutdown.is_set() {
                return Ok(None);
            }
            match self.socket.accept() {
                Ok(pair) => return Ok(Some(pair)),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Ok(None);
                    }
                    std::thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Configures the accepted stream and pushes it onto the dispatch queue.
    fn hand_off(&self, queue: &DispatchQueue, stream: TcpStream, peer: SocketAddr) {
        // The listener socket is non-blocking; the accepted stream must not
        // be. Sessions use bounded reads instead, so a silent peer cannot
        // stall shutdown.
        let configured = stream
            .set_nonblocking(false)
            .and_then(|_| stream.set_read_timeout(Some(self.accept_timeout)))
            .and_then(|_| stream.set_write_timeout(Some(self.accept_timeout)));
        if let Err(e) = configured {
            debug!(%peer, "failed to configure accepted stream: {e}");
            return;
        }

        debug!(role = self.role.peer_label(), %peer, "accepted");
        queue.push(DispatchEntry {
            stream,
            peer,
            role: self.role,
        });
    }
}

/// Spawns the accept loop on its own named thread.
///
/// # Errors
///
/// Returns the OS error if the thread cannot be spawned.
pub fn spawn_listener(
    listener: Listener,
    queue: Arc<DispatchQueue>,
    shutdown: ShutdownFlag,
) -> io::Result<JoinHandle<()>> {
    let name = match listener.role {
        Role::Edge => "edge-listener",
        Role::Web => "web-listener",
    };
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || listener.run(&queue, &shutdown))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
